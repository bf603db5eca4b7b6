//! In-memory oracle and custody implementations for tests and local runs.

use crate::oracle::{PriceFeed, RandomnessCoordinator, Treasury};
use crate::{Config, Lottery};
use commonware_cryptography::{
    ed25519::{PrivateKey, PublicKey},
    Signer,
};
use raffle_types::{Amount, PriceReading, RandomnessParams, RequestId, TransferId, NATIVE_UNIT};
use std::{
    collections::{HashMap, HashSet},
    io,
    sync::{Arc, Mutex},
};

/// $50 in reference base units.
pub const MINIMUM_REFERENCE_VALUE: Amount = 50 * NATIVE_UNIT;

/// $2000 on an 8-decimal feed.
pub const PRICE: i128 = 2_000 * 100_000_000;
pub const DECIMALS: u8 = 8;

/// Fee at [`PRICE`] for [`MINIMUM_REFERENCE_VALUE`] (0.025 units).
pub const FEE: Amount = 25_000_000_000_000_000;

/// Creates an account keypair for Ed25519 signatures.
pub fn create_account_keypair(seed: u64) -> (PrivateKey, PublicKey) {
    let private = PrivateKey::from_seed(seed);
    let public = private.public_key();
    (private, public)
}

/// A price feed answering with whatever was last set.
#[derive(Clone)]
pub struct MockPriceFeed {
    pub reading: Arc<Mutex<Option<PriceReading>>>,
}

impl MockPriceFeed {
    pub fn new(price: i128, decimals: u8) -> Self {
        Self {
            reading: Arc::new(Mutex::new(Some(PriceReading::new(price, decimals)))),
        }
    }

    pub fn set(&self, price: i128, decimals: u8) {
        *self.reading.lock().unwrap() = Some(PriceReading::new(price, decimals));
    }

    /// Make subsequent reads fail.
    pub fn fail(&self) {
        *self.reading.lock().unwrap() = None;
    }
}

impl Default for MockPriceFeed {
    fn default() -> Self {
        Self::new(PRICE, DECIMALS)
    }
}

impl PriceFeed for MockPriceFeed {
    type Error = io::Error;

    async fn latest_price(&self) -> Result<PriceReading, Self::Error> {
        self.reading
            .lock()
            .unwrap()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "feed offline"))
    }
}

/// A coordinator handing out sequential request ids starting at 1.
#[derive(Clone, Default)]
pub struct MockCoordinator {
    pub requests: Arc<Mutex<Vec<RandomnessParams>>>,
    pub offline: Arc<Mutex<bool>>,
}

impl MockCoordinator {
    pub fn fail(&self) {
        *self.offline.lock().unwrap() = true;
    }

    pub fn recover(&self) {
        *self.offline.lock().unwrap() = false;
    }

    /// Id of the most recent request.
    pub fn last_request(&self) -> Option<RequestId> {
        let count = self.requests.lock().unwrap().len() as u64;
        (count > 0).then_some(RequestId(count))
    }
}

impl RandomnessCoordinator for MockCoordinator {
    type Error = io::Error;

    async fn request_randomness(&self, params: &RandomnessParams) -> Result<RequestId, Self::Error> {
        if *self.offline.lock().unwrap() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "coordinator offline",
            ));
        }
        let mut requests = self.requests.lock().unwrap();
        requests.push(params.clone());
        Ok(RequestId(requests.len() as u64))
    }
}

/// Custody that records collected and disbursed amounts per account.
///
/// Transfers are deduplicated by [TransferId] the way a real custody service must
/// deduplicate them.
#[derive(Clone, Default)]
pub struct MockTreasury {
    pub collected: Arc<Mutex<HashMap<PublicKey, Amount>>>,
    pub balances: Arc<Mutex<HashMap<PublicKey, Amount>>>,
    pub applied: Arc<Mutex<HashMap<TransferId, Amount>>>,
    pub rejecting: Arc<Mutex<HashSet<PublicKey>>>,
    pub dropping_replies: Arc<Mutex<HashSet<PublicKey>>>,
}

impl MockTreasury {
    /// Refuse every transfer to or from `account`.
    pub fn reject(&self, account: &PublicKey) {
        self.rejecting.lock().unwrap().insert(account.clone());
    }

    pub fn accept(&self, account: &PublicKey) {
        self.rejecting.lock().unwrap().remove(account);
    }

    /// Apply transfers touching `account` but report them as timed out.
    pub fn drop_replies(&self, account: &PublicKey) {
        self.dropping_replies.lock().unwrap().insert(account.clone());
    }

    pub fn deliver_replies(&self, account: &PublicKey) {
        self.dropping_replies.lock().unwrap().remove(account);
    }

    /// Total paid out to `account`.
    pub fn balance(&self, account: &PublicKey) -> Amount {
        self.balances
            .lock()
            .unwrap()
            .get(account)
            .copied()
            .unwrap_or_default()
    }

    /// Total collected from `account`.
    pub fn collected_from(&self, account: &PublicKey) -> Amount {
        self.collected
            .lock()
            .unwrap()
            .get(account)
            .copied()
            .unwrap_or_default()
    }

    /// Number of distinct transfers applied.
    pub fn applied_transfers(&self) -> usize {
        self.applied.lock().unwrap().len()
    }

    fn transfer(
        &self,
        ledger: &Mutex<HashMap<PublicKey, Amount>>,
        id: &TransferId,
        account: &PublicKey,
        amount: Amount,
    ) -> Result<(), io::Error> {
        if self.rejecting.lock().unwrap().contains(account) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "account refuses transfer",
            ));
        }
        {
            let mut applied = self.applied.lock().unwrap();
            match applied.get(id) {
                Some(previous) if *previous == amount => {}
                Some(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "transfer id reused with a different amount",
                    ))
                }
                None => {
                    applied.insert(id.clone(), amount);
                    *ledger.lock().unwrap().entry(account.clone()).or_default() += amount;
                }
            }
        }
        if self.dropping_replies.lock().unwrap().contains(account) {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "reply lost"));
        }
        Ok(())
    }
}

impl Treasury for MockTreasury {
    type Error = io::Error;

    async fn collect(
        &self,
        id: &TransferId,
        from: &PublicKey,
        amount: Amount,
    ) -> Result<(), Self::Error> {
        self.transfer(&self.collected, id, from, amount)
    }

    async fn disburse(
        &self,
        id: &TransferId,
        to: &PublicKey,
        amount: Amount,
    ) -> Result<(), Self::Error> {
        self.transfer(&self.balances, id, to, amount)
    }
}

/// A lottery wired to mocks.
pub type MockLottery = Lottery<MockPriceFeed, MockCoordinator, MockTreasury>;

/// Build a lottery owned by `owner` with default mocks, returning handles to them.
pub fn create_lottery(
    owner: PublicKey,
) -> (MockLottery, MockPriceFeed, MockCoordinator, MockTreasury) {
    let feed = MockPriceFeed::default();
    let coordinator = MockCoordinator::default();
    let treasury = MockTreasury::default();
    let config = Config {
        owner,
        minimum_reference_value: MINIMUM_REFERENCE_VALUE,
        randomness: RandomnessParams::new(1, [7u8; 32]),
        event_log_capacity: 64,
    };
    let lottery = Lottery::new(config, feed.clone(), coordinator.clone(), treasury.clone());
    (lottery, feed, coordinator, treasury)
}
