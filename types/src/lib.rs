//! Common types shared by the raffle execution core and the node.
//!
//! Everything that crosses a process boundary (signed commands from operators and
//! entrants, signed fulfillments from the randomness coordinator) has a stable
//! `commonware-codec` encoding defined here.

pub mod error;
pub mod execution;
pub mod round;

mod compat;

pub use error::{Error, Operation};
pub use execution::{
    fulfillment_namespace, transaction_namespace, Event, Fulfillment, Instruction, Transaction,
    NAMESPACE,
};
pub use round::{
    Amount, PriceReading, RandomWord, RandomnessParams, RequestId, RoundSnapshot, RoundState,
    TransferId,
};

/// Identity of a participant, the owner, or the randomness coordinator.
pub type Address = commonware_cryptography::ed25519::PublicKey;

/// Number of base units in one whole unit of the native asset (18 decimals).
pub const NATIVE_UNIT: Amount = 1_000_000_000_000_000_000;
