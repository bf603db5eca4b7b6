use crate::round::{Amount, RandomWord, RequestId};
use bytes::{Buf, BufMut};
use commonware_codec::{EncodeSize, Error, Read, ReadExt, ReadRangeExt, Write};
use commonware_cryptography::{
    ed25519::{self, PublicKey},
    Signer, Verifier,
};
use commonware_utils::union;

pub const NAMESPACE: &[u8] = b"_ORACLE_RAFFLE";
pub const TRANSACTION_SUFFIX: &[u8] = b"_TX";
pub const FULFILLMENT_SUFFIX: &[u8] = b"_VRF";

/// Upper bound on random words accepted in a single fulfillment.
pub const MAX_RANDOM_WORDS: usize = 500;

#[inline]
pub fn transaction_namespace(namespace: &[u8]) -> Vec<u8> {
    union(namespace, TRANSACTION_SUFFIX)
}

#[inline]
pub fn fulfillment_namespace(namespace: &[u8]) -> Vec<u8> {
    union(namespace, FULFILLMENT_SUFFIX)
}

/// Commands an operator or entrant can submit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Explicitly (re)open the round. Owner only.
    /// Binary: [0]
    Open,

    /// Buy one ticket, paying `payment` base units.
    /// Binary: [1] [payment:u128 BE]
    Enter { payment: Amount },

    /// Stop accepting entries and request randomness. Owner only.
    /// Binary: [2]
    Close,

    /// Re-attempt a settlement whose payout was rejected. Owner only.
    /// Binary: [3]
    RetryPayout,
}

impl Write for Instruction {
    fn write(&self, writer: &mut impl BufMut) {
        match self {
            Instruction::Open => 0u8.write(writer),
            Instruction::Enter { payment } => {
                1u8.write(writer);
                payment.write(writer);
            }
            Instruction::Close => 2u8.write(writer),
            Instruction::RetryPayout => 3u8.write(writer),
        }
    }
}

impl Read for Instruction {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let kind = u8::read(reader)?;
        match kind {
            0 => Ok(Instruction::Open),
            1 => Ok(Instruction::Enter {
                payment: u128::read(reader)?,
            }),
            2 => Ok(Instruction::Close),
            3 => Ok(Instruction::RetryPayout),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl EncodeSize for Instruction {
    fn encode_size(&self) -> usize {
        1 + match self {
            Instruction::Enter { payment } => payment.encode_size(),
            Instruction::Open | Instruction::Close | Instruction::RetryPayout => 0,
        }
    }
}

/// A signed [Instruction]. The verified `public` key is the caller identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub nonce: u64,
    pub instruction: Instruction,

    pub public: PublicKey,
    pub signature: ed25519::Signature,
}

impl Transaction {
    fn payload(nonce: &u64, instruction: &Instruction) -> Vec<u8> {
        let mut payload = Vec::new();
        nonce.write(&mut payload);
        instruction.write(&mut payload);

        payload
    }

    pub fn sign(private: &ed25519::PrivateKey, nonce: u64, instruction: Instruction) -> Self {
        let signature = private.sign(
            &transaction_namespace(NAMESPACE),
            &Self::payload(&nonce, &instruction),
        );

        Self {
            nonce,
            instruction,
            public: private.public_key(),
            signature,
        }
    }

    pub fn verify(&self) -> bool {
        self.public.verify(
            &transaction_namespace(NAMESPACE),
            &Self::payload(&self.nonce, &self.instruction),
            &self.signature,
        )
    }
}

impl Write for Transaction {
    fn write(&self, writer: &mut impl BufMut) {
        self.nonce.write(writer);
        self.instruction.write(writer);
        self.public.write(writer);
        self.signature.write(writer);
    }
}

impl Read for Transaction {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let nonce = u64::read(reader)?;
        let instruction = Instruction::read(reader)?;
        let public = PublicKey::read(reader)?;
        let signature = ed25519::Signature::read(reader)?;

        Ok(Self {
            nonce,
            instruction,
            public,
            signature,
        })
    }
}

impl EncodeSize for Transaction {
    fn encode_size(&self) -> usize {
        self.nonce.encode_size()
            + self.instruction.encode_size()
            + self.public.encode_size()
            + self.signature.encode_size()
    }
}

/// Callback delivered by the randomness coordinator, signed with its key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fulfillment {
    pub request_id: RequestId,
    pub random_words: Vec<RandomWord>,
    pub signature: ed25519::Signature,
}

impl Fulfillment {
    fn payload(request_id: &RequestId, random_words: &[RandomWord]) -> Vec<u8> {
        let mut payload = Vec::new();
        request_id.write(&mut payload);
        for word in random_words {
            word.write(&mut payload);
        }

        payload
    }

    pub fn sign(
        coordinator: &ed25519::PrivateKey,
        request_id: RequestId,
        random_words: Vec<RandomWord>,
    ) -> Self {
        let signature = coordinator.sign(
            &fulfillment_namespace(NAMESPACE),
            &Self::payload(&request_id, &random_words),
        );

        Self {
            request_id,
            random_words,
            signature,
        }
    }

    /// Check the fulfillment was produced by `coordinator`.
    pub fn verify(&self, coordinator: &PublicKey) -> bool {
        coordinator.verify(
            &fulfillment_namespace(NAMESPACE),
            &Self::payload(&self.request_id, &self.random_words),
            &self.signature,
        )
    }
}

impl Write for Fulfillment {
    fn write(&self, writer: &mut impl BufMut) {
        self.request_id.write(writer);
        self.random_words.write(writer);
        self.signature.write(writer);
    }
}

impl Read for Fulfillment {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let request_id = RequestId::read(reader)?;
        let random_words = Vec::<RandomWord>::read_range(reader, 0..=MAX_RANDOM_WORDS)?;
        let signature = ed25519::Signature::read(reader)?;

        Ok(Self {
            request_id,
            random_words,
            signature,
        })
    }
}

impl EncodeSize for Fulfillment {
    fn encode_size(&self) -> usize {
        self.request_id.encode_size()
            + self.random_words.encode_size()
            + self.signature.encode_size()
    }
}

/// Emitted by every successful round operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    RoundOpened {
        round: u64,
    },
    Entered {
        round: u64,
        player: PublicKey,
        payment: Amount,
        /// Tickets in the round after this entry.
        tickets: u64,
    },
    RandomnessRequested {
        round: u64,
        request_id: RequestId,
        tickets: u64,
        pooled_balance: Amount,
    },
    WinnerPaid {
        round: u64,
        request_id: RequestId,
        winner: PublicKey,
        winner_index: u64,
        amount: Amount,
    },
    /// The winner could not be paid; the round stays closed until a retry succeeds.
    PayoutStalled {
        round: u64,
        request_id: RequestId,
        winner: PublicKey,
        amount: Amount,
    },
}

impl Event {
    pub fn round(&self) -> u64 {
        match self {
            Event::RoundOpened { round }
            | Event::Entered { round, .. }
            | Event::RandomnessRequested { round, .. }
            | Event::WinnerPaid { round, .. }
            | Event::PayoutStalled { round, .. } => *round,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::RoundOpened { .. } => "round_opened",
            Event::Entered { .. } => "entered",
            Event::RandomnessRequested { .. } => "randomness_requested",
            Event::WinnerPaid { .. } => "winner_paid",
            Event::PayoutStalled { .. } => "payout_stalled",
        }
    }
}
