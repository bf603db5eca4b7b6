//! The raffle actor.
//!
//! One actor owns the [raffle_execution::Lottery] and applies every command to it
//! in mailbox order. Signed transactions and fulfillments are authenticated here
//! before they reach the state machine.

mod actor;
mod ingress;

pub use actor::Actor;
use commonware_cryptography::ed25519::PublicKey;
pub use ingress::{Mailbox, Message};
use thiserror::Error;

pub struct Config<P, C, T> {
    pub lottery: raffle_execution::Config,
    pub price_feed: P,
    pub randomness_coordinator: C,
    pub treasury: T,
    /// Key expected on fulfillments.
    pub coordinator: PublicKey,
    pub mailbox_size: usize,
}

/// Why a command sent to the actor did not apply.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Rejected(#[from] raffle_types::Error),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },
    #[error("raffle mailbox closed")]
    Closed,
}
