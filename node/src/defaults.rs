//! Default values for optional node configuration.

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_METRICS_PORT: u16 = 9090;
pub const DEFAULT_WORKER_THREADS: usize = 2;
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_MAILBOX_SIZE: usize = 1024;
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 1024;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Minimum entry value in whole reference-currency units.
pub const DEFAULT_MINIMUM_ENTRY_VALUE: u64 = 50;

pub use raffle_types::round::{
    DEFAULT_CALLBACK_GAS_LIMIT, DEFAULT_NUM_WORDS, DEFAULT_REQUEST_CONFIRMATIONS,
};
