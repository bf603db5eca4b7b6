use commonware_cryptography::ed25519::PublicKey;
use raffle_types::{Amount, PriceReading, RandomnessParams, RequestId, TransferId};
use std::future::Future;

/// Source of the native asset's price in reference-currency units.
pub trait PriceFeed: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the latest answer of the feed.
    fn latest_price(&self) -> impl Future<Output = Result<PriceReading, Self::Error>> + Send;
}

/// Verifiable randomness coordinator.
///
/// Requests are answered later, out of band, by a signed fulfillment delivered to
/// the node's callback endpoint.
pub trait RandomnessCoordinator: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Issue a request billed to `params.subscription_id`.
    fn request_randomness(
        &self,
        params: &RandomnessParams,
    ) -> impl Future<Output = Result<RequestId, Self::Error>> + Send;
}

/// Custody of pooled funds.
///
/// Transfers are keyed by a [TransferId]. Repeating a transfer under an id that was
/// already applied must succeed without moving funds again, so a call that failed
/// after reaching the service is safe to retry.
pub trait Treasury: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Move `amount` from `from` into the pool.
    fn collect(
        &self,
        id: &TransferId,
        from: &PublicKey,
        amount: Amount,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Pay `amount` out of the pool to `to`. Either all of it moves or none.
    fn disburse(
        &self,
        id: &TransferId,
        to: &PublicKey,
        amount: Amount,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
