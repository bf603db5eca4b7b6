//! Raffle execution core.
//!
//! This crate contains the round state machine ([`Lottery`]), entrance fee pricing
//! ([`fee`]) and winner settlement ([`settlement`]). External services are reached
//! only through the traits in [`oracle`], so the core can be driven by the node's
//! HTTP adapters or by the in-memory mocks.
//!
//! ## Atomicity
//! Every mutating operation takes `&mut self` and performs all of its checks and
//! external calls before touching round state. A rejected operation therefore
//! leaves the round exactly as it found it, and a single owner of the [`Lottery`]
//! (the node's actor) serializes operations against it.
//!
//! ## Lifecycle
//! ```text
//! Open --close_round--> ClosedAwaitingRandomness --fulfill_randomness--> Open
//! ```
//! Settlement reopens the round; `open_round` is kept as an explicit guard.

pub mod fee;
pub mod lottery;
pub mod oracle;
pub mod settlement;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

pub use fee::entrance_fee;
pub use lottery::{Config, Lottery};
pub use oracle::{PriceFeed, RandomnessCoordinator, Treasury};
pub use settlement::select_winner;
