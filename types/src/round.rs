use bytes::{Buf, BufMut};
use commonware_codec::{Error, FixedSize, Read, ReadExt, Write};
use commonware_cryptography::ed25519::PublicKey;
use commonware_utils::hex;
use std::fmt;

/// Native asset amount in base units.
pub type Amount = u128;

/// Confirmations the coordinator waits for before answering a request.
pub const DEFAULT_REQUEST_CONFIRMATIONS: u16 = 3;

/// Gas budget granted to the fulfillment callback.
pub const DEFAULT_CALLBACK_GAS_LIMIT: u32 = 100_000;

/// Random words requested per draw (only the first one is consumed).
pub const DEFAULT_NUM_WORDS: u32 = 1;

/// Lifecycle state of the round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RoundState {
    /// Accepting entries.
    Open = 0,
    /// Closed; a randomness request is outstanding.
    ClosedAwaitingRandomness = 1,
}

impl RoundState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundState::Open => "open",
            RoundState::ClosedAwaitingRandomness => "closed_awaiting_randomness",
        }
    }
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Write for RoundState {
    fn write(&self, writer: &mut impl BufMut) {
        (*self as u8).write(writer);
    }
}

impl Read for RoundState {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        let value = u8::read(reader)?;
        match value {
            0 => Ok(Self::Open),
            1 => Ok(Self::ClosedAwaitingRandomness),
            i => Err(Error::InvalidEnum(i)),
        }
    }
}

impl FixedSize for RoundState {
    const SIZE: usize = 1;
}

/// Identifier the randomness coordinator assigns to a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Write for RequestId {
    fn write(&self, writer: &mut impl BufMut) {
        self.0.write(writer);
    }
}

impl Read for RequestId {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        Ok(Self(u64::read(reader)?))
    }
}

impl FixedSize for RequestId {
    const SIZE: usize = u64::SIZE;
}

/// Idempotency key of a custody transfer.
///
/// The custody service applies a given id at most once, so a transfer whose reply
/// was lost can be retried under the same id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TransferId {
    /// The `entry`-th ticket (from 0) bought by `account` in `round`.
    Entry {
        round: u64,
        account: PublicKey,
        entry: u64,
    },
    /// The payout settling `request_id` in `round`.
    Payout { round: u64, request_id: RequestId },
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferId::Entry {
                round,
                account,
                entry,
            } => write!(f, "entry:{round}:{}:{entry}", hex(account.as_ref())),
            TransferId::Payout { round, request_id } => write!(f, "payout:{round}:{request_id}"),
        }
    }
}

/// A 256-bit random word, big-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct RandomWord(pub [u8; 32]);

impl RandomWord {
    /// Reduce the full word modulo `modulus`.
    ///
    /// Returns `None` when `modulus` is zero.
    pub fn reduce(&self, modulus: u64) -> Option<u64> {
        if modulus == 0 {
            return None;
        }
        let modulus = modulus as u128;
        let mut acc: u128 = 0;
        for byte in self.0 {
            // acc < 2^64, so the shift cannot overflow
            acc = ((acc << 8) | byte as u128) % modulus;
        }
        Some(acc as u64)
    }
}

impl From<u64> for RandomWord {
    fn from(value: u64) -> Self {
        let mut word = [0u8; 32];
        word[24..].copy_from_slice(&value.to_be_bytes());
        Self(word)
    }
}

impl AsRef<[u8]> for RandomWord {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Write for RandomWord {
    fn write(&self, writer: &mut impl BufMut) {
        writer.put_slice(&self.0);
    }
}

impl Read for RandomWord {
    type Cfg = ();

    fn read_cfg(reader: &mut impl Buf, _: &Self::Cfg) -> Result<Self, Error> {
        if reader.remaining() < Self::SIZE {
            return Err(Error::EndOfBuffer);
        }
        let mut word = [0u8; 32];
        reader.copy_to_slice(&mut word);
        Ok(Self(word))
    }
}

impl FixedSize for RandomWord {
    const SIZE: usize = 32;
}

/// Latest answer of the price feed: `price / 10^decimals` reference units per
/// whole unit of the native asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriceReading {
    pub price: i128,
    pub decimals: u8,
}

impl PriceReading {
    pub fn new(price: i128, decimals: u8) -> Self {
        Self { price, decimals }
    }
}

/// Parameters attached to every randomness request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RandomnessParams {
    /// Pre-funded coordinator subscription that pays for requests.
    pub subscription_id: u64,
    /// Key hash selecting the oracle's proving key (gas lane).
    pub key_hash: [u8; 32],
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

impl RandomnessParams {
    pub fn new(subscription_id: u64, key_hash: [u8; 32]) -> Self {
        Self {
            subscription_id,
            key_hash,
            request_confirmations: DEFAULT_REQUEST_CONFIRMATIONS,
            callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
            num_words: DEFAULT_NUM_WORDS,
        }
    }
}

/// Read-only view of the round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundSnapshot {
    /// Number of the current round (starts at 1, bumped by each settlement).
    pub round: u64,
    pub state: RoundState,
    pub players: Vec<PublicKey>,
    pub pooled_balance: Amount,
    pub pending_request: Option<RequestId>,
    pub last_winner: Option<PublicKey>,
    /// Whether a settlement failed to pay out and awaits a retry.
    pub payout_stalled: bool,
}
