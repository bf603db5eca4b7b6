use crate::round::{Amount, RequestId, RoundState};
use std::fmt;
use thiserror::Error as ThisError;

/// Round operations, used to report which call was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Open,
    Enter,
    Close,
    Fulfill,
    RetryPayout,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Open => "open",
            Operation::Enter => "enter",
            Operation::Close => "close",
            Operation::Fulfill => "fulfill",
            Operation::RetryPayout => "retry_payout",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every way a round operation can be rejected.
///
/// A rejected operation never mutates the round.
#[derive(Clone, Debug, ThisError, PartialEq, Eq)]
pub enum Error {
    #[error("caller is not the owner")]
    Unauthorized,
    #[error("{operation} not allowed while round is {state}")]
    InvalidTransition {
        operation: Operation,
        state: RoundState,
    },
    #[error("payment {payment} below entrance fee {fee}")]
    InsufficientPayment { payment: Amount, fee: Amount },
    #[error("round has no entrants")]
    NoEntrants,
    #[error("price oracle unavailable: {0}")]
    OracleUnavailable(String),
    #[error("payout of {amount} failed: {reason}")]
    PayoutFailed { amount: Amount, reason: String },
    #[error("unknown request {got} (pending={pending:?})")]
    UnknownRequest {
        pending: Option<RequestId>,
        got: RequestId,
    },
    #[error("randomness request failed: {0}")]
    RandomnessUnavailable(String),
    #[error("request {0} was already fulfilled")]
    AlreadyFulfilled(RequestId),
    #[error("fulfillment carried no random words")]
    EmptyRandomness,
    #[error("entry payment rejected: {0}")]
    PaymentRejected(String),
    #[error("entrance fee computation overflowed")]
    FeeOverflow,
    #[error("pooled balance overflowed")]
    PoolOverflow,
}
