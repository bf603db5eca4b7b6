//! Winner selection and payout.

use crate::oracle::Treasury;
use commonware_cryptography::ed25519::PublicKey;
use raffle_types::{Amount, Error, RandomWord, TransferId};
use tracing::warn;

/// Winner chosen for a round and the amount owed to them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payout {
    pub winner_index: u64,
    pub winner: PublicKey,
    pub amount: Amount,
}

/// Result of attempting to pay a winner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The full pool reached the winner.
    Paid(Payout),
    /// The transfer was not confirmed. Retrying under the same id pays at most once.
    Stalled { payout: Payout, reason: String },
}

/// Pick the ticket at `word mod players.len()`.
///
/// The whole 256-bit word takes part in the reduction. Returns `None` for an empty
/// roster.
pub fn select_winner(word: &RandomWord, players: &[PublicKey]) -> Option<(u64, PublicKey)> {
    let index = word.reduce(players.len() as u64)?;
    let winner = players.get(index as usize)?.clone();
    Some((index, winner))
}

/// Select the winner and transfer the whole pool to them under `id`.
pub async fn settle<T: Treasury>(
    treasury: &T,
    id: &TransferId,
    word: &RandomWord,
    players: &[PublicKey],
    pooled_balance: Amount,
) -> Result<Outcome, Error> {
    let (winner_index, winner) = select_winner(word, players).ok_or(Error::NoEntrants)?;
    let payout = Payout {
        winner_index,
        winner,
        amount: pooled_balance,
    };
    match treasury.disburse(id, &payout.winner, payout.amount).await {
        Ok(()) => Ok(Outcome::Paid(payout)),
        Err(err) => {
            warn!(
                %id,
                winner = ?payout.winner,
                amount = payout.amount,
                ?err,
                "payout refused"
            );
            Ok(Outcome::Stalled {
                payout,
                reason: err.to_string(),
            })
        }
    }
}
