use crate::fee;
use crate::oracle::{PriceFeed, RandomnessCoordinator, Treasury};
use crate::settlement::{self, Outcome};
use commonware_cryptography::ed25519::PublicKey;
use raffle_types::{
    Amount, Error, Event, Operation, RandomWord, RandomnessParams, RequestId, RoundSnapshot,
    RoundState, TransferId,
};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Static parameters of a raffle.
#[derive(Clone, Debug)]
pub struct Config {
    /// The only account allowed to open, close and retry.
    pub owner: PublicKey,
    /// Minimum entry value in reference-currency base units (18 decimals).
    pub minimum_reference_value: Amount,
    pub randomness: RandomnessParams,
    /// Number of recent events kept for queries (0 disables the log).
    pub event_log_capacity: usize,
}

/// The round state machine.
///
/// All round state lives here and every mutation goes through `&mut self`, so
/// whoever owns the lottery serializes operations against it.
pub struct Lottery<P, C, T> {
    config: Config,
    price_feed: P,
    coordinator: C,
    treasury: T,

    round: u64,
    state: RoundState,
    players: Vec<PublicKey>,
    pooled_balance: Amount,
    pending_request: Option<RequestId>,
    last_winner: Option<PublicKey>,

    // Word consumed by a settlement whose payout was refused.
    stalled: Option<RandomWord>,
    events: VecDeque<Event>,
}

impl<P: PriceFeed, C: RandomnessCoordinator, T: Treasury> Lottery<P, C, T> {
    /// Create a lottery with round 1 open and empty.
    pub fn new(config: Config, price_feed: P, coordinator: C, treasury: T) -> Self {
        let events = VecDeque::with_capacity(config.event_log_capacity);
        Self {
            config,
            price_feed,
            coordinator,
            treasury,
            round: 1,
            state: RoundState::Open,
            players: Vec::new(),
            pooled_balance: 0,
            pending_request: None,
            last_winner: None,
            stalled: None,
            events,
        }
    }

    /// Current fee in native base units, priced from a fresh feed read.
    pub async fn entrance_fee(&self) -> Result<Amount, Error> {
        let reading = self
            .price_feed
            .latest_price()
            .await
            .map_err(|err| Error::OracleUnavailable(err.to_string()))?;
        fee::entrance_fee(self.config.minimum_reference_value, reading)
    }

    /// Confirm the round is open for entries.
    ///
    /// Rounds reopen on settlement, so this only succeeds on an open round with an
    /// empty roster.
    pub fn open_round(&mut self, caller: &PublicKey) -> Result<Event, Error> {
        self.authorize(caller)?;
        if self.state != RoundState::Open || !self.players.is_empty() {
            return Err(self.invalid(Operation::Open));
        }
        info!(round = self.round, "round opened");
        Ok(self.record(Event::RoundOpened { round: self.round }))
    }

    /// Buy one ticket for `caller`, pulling `payment` into the pool.
    ///
    /// The collection is keyed by the caller's ticket count in this round, so
    /// re-entering after a lost custody reply does not charge twice.
    pub async fn enter(&mut self, caller: &PublicKey, payment: Amount) -> Result<Event, Error> {
        if self.state != RoundState::Open {
            return Err(self.invalid(Operation::Enter));
        }
        let fee = self.entrance_fee().await?;
        if payment < fee {
            return Err(Error::InsufficientPayment { payment, fee });
        }
        let pooled_balance = self
            .pooled_balance
            .checked_add(payment)
            .ok_or(Error::PoolOverflow)?;
        let id = TransferId::Entry {
            round: self.round,
            account: caller.clone(),
            entry: self.players.iter().filter(|player| *player == caller).count() as u64,
        };
        self.treasury
            .collect(&id, caller, payment)
            .await
            .map_err(|err| Error::PaymentRejected(err.to_string()))?;

        self.players.push(caller.clone());
        self.pooled_balance = pooled_balance;
        let tickets = self.players.len() as u64;
        debug!(round = self.round, player = ?caller, payment, fee, tickets, "entered");
        Ok(self.record(Event::Entered {
            round: self.round,
            player: caller.clone(),
            payment,
            tickets,
        }))
    }

    /// Stop admissions and request randomness for the draw.
    pub async fn close_round(&mut self, caller: &PublicKey) -> Result<Event, Error> {
        self.authorize(caller)?;
        if self.state != RoundState::Open {
            return Err(self.invalid(Operation::Close));
        }
        if self.players.is_empty() {
            return Err(Error::NoEntrants);
        }
        let request_id = self
            .coordinator
            .request_randomness(&self.config.randomness)
            .await
            .map_err(|err| Error::RandomnessUnavailable(err.to_string()))?;

        self.state = RoundState::ClosedAwaitingRandomness;
        self.pending_request = Some(request_id);
        let tickets = self.players.len() as u64;
        info!(
            round = self.round,
            %request_id,
            tickets,
            pooled_balance = self.pooled_balance,
            "randomness requested"
        );
        Ok(self.record(Event::RandomnessRequested {
            round: self.round,
            request_id,
            tickets,
            pooled_balance: self.pooled_balance,
        }))
    }

    /// Accept the coordinator's answer to the pending request and settle the round.
    ///
    /// Only the first word is used. Authenticating the coordinator is the caller's
    /// job. Once a word has been consumed by a stalled payout the request counts as
    /// fulfilled, and only [Self::retry_payout] can finish the round.
    pub async fn fulfill_randomness(
        &mut self,
        request_id: RequestId,
        words: &[RandomWord],
    ) -> Result<Event, Error> {
        if self.state != RoundState::ClosedAwaitingRandomness {
            return Err(self.invalid(Operation::Fulfill));
        }
        if self.pending_request != Some(request_id) {
            return Err(Error::UnknownRequest {
                pending: self.pending_request,
                got: request_id,
            });
        }
        if self.stalled.is_some() {
            return Err(Error::AlreadyFulfilled(request_id));
        }
        let word = *words.first().ok_or(Error::EmptyRandomness)?;
        self.settle(request_id, word).await
    }

    /// Re-run a settlement whose payout was refused, using the word already received.
    pub async fn retry_payout(&mut self, caller: &PublicKey) -> Result<Event, Error> {
        self.authorize(caller)?;
        let (Some(word), Some(request_id)) = (self.stalled, self.pending_request) else {
            return Err(self.invalid(Operation::RetryPayout));
        };
        self.settle(request_id, word).await
    }

    async fn settle(&mut self, request_id: RequestId, word: RandomWord) -> Result<Event, Error> {
        let id = TransferId::Payout {
            round: self.round,
            request_id,
        };
        let outcome = settlement::settle(
            &self.treasury,
            &id,
            &word,
            &self.players,
            self.pooled_balance,
        )
        .await?;
        match outcome {
            Outcome::Paid(payout) => {
                let settled = self.round;
                self.last_winner = Some(payout.winner.clone());
                self.players.clear();
                self.pooled_balance = 0;
                self.pending_request = None;
                self.stalled = None;
                self.state = RoundState::Open;
                self.round += 1;
                info!(
                    round = settled,
                    %request_id,
                    winner = ?payout.winner,
                    winner_index = payout.winner_index,
                    amount = payout.amount,
                    "winner paid"
                );
                let paid = self.record(Event::WinnerPaid {
                    round: settled,
                    request_id,
                    winner: payout.winner,
                    winner_index: payout.winner_index,
                    amount: payout.amount,
                });
                self.record(Event::RoundOpened { round: self.round });
                Ok(paid)
            }
            Outcome::Stalled { payout, reason } => {
                self.stalled = Some(word);
                warn!(round = self.round, %request_id, %reason, "settlement stalled");
                self.record(Event::PayoutStalled {
                    round: self.round,
                    request_id,
                    winner: payout.winner,
                    amount: payout.amount,
                });
                Err(Error::PayoutFailed {
                    amount: payout.amount,
                    reason,
                })
            }
        }
    }

    fn authorize(&self, caller: &PublicKey) -> Result<(), Error> {
        if caller != &self.config.owner {
            return Err(Error::Unauthorized);
        }
        Ok(())
    }

    fn invalid(&self, operation: Operation) -> Error {
        Error::InvalidTransition {
            operation,
            state: self.state,
        }
    }

    fn record(&mut self, event: Event) -> Event {
        let capacity = self.config.event_log_capacity;
        if capacity > 0 {
            if self.events.len() == capacity {
                self.events.pop_front();
            }
            self.events.push_back(event.clone());
        }
        event
    }
}

impl<P, C, T> Lottery<P, C, T> {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn owner(&self) -> &PublicKey {
        &self.config.owner
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn players(&self) -> &[PublicKey] {
        &self.players
    }

    pub fn pooled_balance(&self) -> Amount {
        self.pooled_balance
    }

    pub fn pending_request(&self) -> Option<RequestId> {
        self.pending_request
    }

    pub fn last_winner(&self) -> Option<&PublicKey> {
        self.last_winner.as_ref()
    }

    pub fn payout_stalled(&self) -> bool {
        self.stalled.is_some()
    }

    /// Recent events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            round: self.round,
            state: self.state,
            players: self.players.clone(),
            pooled_balance: self.pooled_balance,
            pending_request: self.pending_request,
            last_winner: self.last_winner.clone(),
            payout_stalled: self.stalled.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{create_account_keypair, create_lottery, MockLottery, FEE};
    use commonware_runtime::deterministic::Runner;
    use commonware_runtime::Runner as _;
    use futures::executor::block_on;
    use proptest::prelude::*;

    async fn fill(lottery: &mut MockLottery, entrants: &[PublicKey]) {
        for entrant in entrants {
            lottery.enter(entrant, FEE).await.unwrap();
        }
    }

    fn entrants(n: u64) -> Vec<PublicKey> {
        (10..10 + n).map(|seed| create_account_keypair(seed).1).collect()
    }

    #[test]
    fn test_full_round() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, coordinator, treasury) = create_lottery(owner.clone());
            let players = entrants(3);

            lottery.open_round(&owner).unwrap();
            fill(&mut lottery, &players).await;
            assert_eq!(lottery.pooled_balance(), 3 * FEE);

            let event = lottery.close_round(&owner).await.unwrap();
            let request_id = coordinator.last_request().unwrap();
            assert!(matches!(
                event,
                Event::RandomnessRequested { tickets: 3, .. }
            ));
            assert_eq!(lottery.state(), RoundState::ClosedAwaitingRandomness);
            assert_eq!(lottery.pending_request(), Some(request_id));

            let event = lottery
                .fulfill_randomness(request_id, &[RandomWord::from(7)])
                .await
                .unwrap();
            assert_eq!(
                event,
                Event::WinnerPaid {
                    round: 1,
                    request_id,
                    winner: players[1].clone(),
                    winner_index: 1,
                    amount: 3 * FEE,
                }
            );
            assert_eq!(treasury.balance(&players[1]), 3 * FEE);
            assert_eq!(lottery.last_winner(), Some(&players[1]));
            assert!(lottery.players().is_empty());
            assert_eq!(lottery.pooled_balance(), 0);
            assert_eq!(lottery.pending_request(), None);
            assert_eq!(lottery.state(), RoundState::Open);
            assert_eq!(lottery.round(), 2);
        });
    }

    #[test]
    fn test_randomness_params_forwarded() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, coordinator, _) = create_lottery(owner.clone());
            fill(&mut lottery, &entrants(1)).await;
            lottery.close_round(&owner).await.unwrap();

            let requests = coordinator.requests.lock().unwrap().clone();
            assert_eq!(requests, vec![lottery.config().randomness.clone()]);
            assert_eq!(requests[0].request_confirmations, 3);
            assert_eq!(requests[0].callback_gas_limit, 100_000);
            assert_eq!(requests[0].num_words, 1);
        });
    }

    #[test]
    fn test_enter_below_fee() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, _, treasury) = create_lottery(owner);
            let (_, player) = create_account_keypair(2);

            let result = lottery.enter(&player, FEE - 1).await;
            assert_eq!(
                result,
                Err(Error::InsufficientPayment {
                    payment: FEE - 1,
                    fee: FEE
                })
            );
            assert!(lottery.players().is_empty());
            assert_eq!(lottery.pooled_balance(), 0);
            assert_eq!(treasury.collected_from(&player), 0);
        });
    }

    #[test]
    fn test_enter_tracks_price_changes() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, feed, _, _) = create_lottery(owner);
            let (_, player) = create_account_keypair(2);

            // Halving the price doubles the fee.
            feed.set(1_000 * 100_000_000, 8);
            assert_eq!(lottery.entrance_fee().await.unwrap(), 2 * FEE);
            assert!(matches!(
                lottery.enter(&player, FEE).await,
                Err(Error::InsufficientPayment { .. })
            ));
            lottery.enter(&player, 2 * FEE).await.unwrap();
        });
    }

    #[test]
    fn test_overpayment_is_pooled() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, _, treasury) = create_lottery(owner);
            let (_, player) = create_account_keypair(2);

            lottery.enter(&player, FEE + 5).await.unwrap();
            assert_eq!(lottery.pooled_balance(), FEE + 5);
            assert_eq!(treasury.collected_from(&player), FEE + 5);
        });
    }

    #[test]
    fn test_duplicate_entries() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, _, _) = create_lottery(owner);
            let (_, player) = create_account_keypair(2);

            lottery.enter(&player, FEE).await.unwrap();
            let event = lottery.enter(&player, FEE).await.unwrap();
            assert!(matches!(event, Event::Entered { tickets: 2, .. }));
            assert_eq!(lottery.players(), &[player.clone(), player]);
        });
    }

    #[test]
    fn test_oracle_unavailable() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, feed, _, _) = create_lottery(owner);
            let (_, player) = create_account_keypair(2);

            feed.fail();
            assert!(matches!(
                lottery.entrance_fee().await,
                Err(Error::OracleUnavailable(_))
            ));
            assert!(matches!(
                lottery.enter(&player, FEE).await,
                Err(Error::OracleUnavailable(_))
            ));

            // A malformed answer is as good as none.
            feed.set(-1, 8);
            assert!(matches!(
                lottery.enter(&player, FEE).await,
                Err(Error::OracleUnavailable(_))
            ));
            assert!(lottery.players().is_empty());
        });
    }

    #[test]
    fn test_payment_rejected() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, _, treasury) = create_lottery(owner);
            let (_, player) = create_account_keypair(2);

            treasury.reject(&player);
            assert!(matches!(
                lottery.enter(&player, FEE).await,
                Err(Error::PaymentRejected(_))
            ));
            assert!(lottery.players().is_empty());
            assert_eq!(lottery.pooled_balance(), 0);
        });
    }

    #[test]
    fn test_owner_only_operations() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (_, stranger) = create_account_keypair(2);
            let (mut lottery, _, coordinator, _) = create_lottery(owner.clone());

            assert_eq!(lottery.open_round(&stranger), Err(Error::Unauthorized));
            assert_eq!(
                lottery.close_round(&stranger).await,
                Err(Error::Unauthorized)
            );
            fill(&mut lottery, &entrants(2)).await;
            assert_eq!(
                lottery.close_round(&stranger).await,
                Err(Error::Unauthorized)
            );
            assert_eq!(
                lottery.retry_payout(&stranger).await,
                Err(Error::Unauthorized)
            );
            assert_eq!(lottery.state(), RoundState::Open);
            assert!(coordinator.last_request().is_none());

            // Entering is open to anyone, including the owner.
            lottery.enter(&owner, FEE).await.unwrap();
            assert_eq!(lottery.players().len(), 3);
        });
    }

    #[test]
    fn test_close_without_entrants() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, coordinator, _) = create_lottery(owner.clone());

            assert_eq!(lottery.close_round(&owner).await, Err(Error::NoEntrants));
            assert_eq!(lottery.state(), RoundState::Open);
            assert!(coordinator.last_request().is_none());
        });
    }

    #[test]
    fn test_close_when_coordinator_fails() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, coordinator, _) = create_lottery(owner.clone());
            fill(&mut lottery, &entrants(2)).await;

            coordinator.fail();
            assert!(matches!(
                lottery.close_round(&owner).await,
                Err(Error::RandomnessUnavailable(_))
            ));
            assert_eq!(lottery.state(), RoundState::Open);
            assert_eq!(lottery.pending_request(), None);

            coordinator.recover();
            lottery.close_round(&owner).await.unwrap();
            assert_eq!(lottery.state(), RoundState::ClosedAwaitingRandomness);
        });
    }

    #[test]
    fn test_operations_rejected_while_closed() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, _, _) = create_lottery(owner.clone());
            let players = entrants(2);
            fill(&mut lottery, &players).await;
            lottery.close_round(&owner).await.unwrap();
            let before = lottery.snapshot();

            let closed = RoundState::ClosedAwaitingRandomness;
            assert_eq!(
                lottery.enter(&players[0], FEE).await,
                Err(Error::InvalidTransition {
                    operation: Operation::Enter,
                    state: closed
                })
            );
            assert_eq!(
                lottery.close_round(&owner).await,
                Err(Error::InvalidTransition {
                    operation: Operation::Close,
                    state: closed
                })
            );
            assert_eq!(
                lottery.open_round(&owner),
                Err(Error::InvalidTransition {
                    operation: Operation::Open,
                    state: closed
                })
            );
            assert_eq!(
                lottery.retry_payout(&owner).await,
                Err(Error::InvalidTransition {
                    operation: Operation::RetryPayout,
                    state: closed
                })
            );
            assert_eq!(lottery.snapshot(), before);
        });
    }

    #[test]
    fn test_open_round_with_entrants() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, _, _) = create_lottery(owner.clone());

            assert_eq!(
                lottery.open_round(&owner),
                Ok(Event::RoundOpened { round: 1 })
            );
            fill(&mut lottery, &entrants(1)).await;
            assert!(matches!(
                lottery.open_round(&owner),
                Err(Error::InvalidTransition {
                    operation: Operation::Open,
                    ..
                })
            ));
        });
    }

    #[test]
    fn test_fulfill_unknown_request() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, coordinator, treasury) = create_lottery(owner.clone());
            let players = entrants(3);
            fill(&mut lottery, &players).await;
            lottery.close_round(&owner).await.unwrap();
            let request_id = coordinator.last_request().unwrap();
            let before = lottery.snapshot();

            let wrong = RequestId(request_id.0 + 1);
            assert_eq!(
                lottery
                    .fulfill_randomness(wrong, &[RandomWord::from(7)])
                    .await,
                Err(Error::UnknownRequest {
                    pending: Some(request_id),
                    got: wrong
                })
            );
            assert_eq!(lottery.snapshot(), before);
            for player in &players {
                assert_eq!(treasury.balance(player), 0);
            }
        });
    }

    #[test]
    fn test_fulfill_before_close() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, _, _) = create_lottery(owner);
            fill(&mut lottery, &entrants(2)).await;

            assert_eq!(
                lottery
                    .fulfill_randomness(RequestId(1), &[RandomWord::from(1)])
                    .await,
                Err(Error::InvalidTransition {
                    operation: Operation::Fulfill,
                    state: RoundState::Open
                })
            );
        });
    }

    #[test]
    fn test_fulfill_without_words() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, coordinator, _) = create_lottery(owner.clone());
            fill(&mut lottery, &entrants(2)).await;
            lottery.close_round(&owner).await.unwrap();
            let request_id = coordinator.last_request().unwrap();

            assert_eq!(
                lottery.fulfill_randomness(request_id, &[]).await,
                Err(Error::EmptyRandomness)
            );
            assert_eq!(lottery.state(), RoundState::ClosedAwaitingRandomness);
        });
    }

    #[test]
    fn test_duplicate_fulfillment() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, coordinator, treasury) = create_lottery(owner.clone());
            let players = entrants(2);
            fill(&mut lottery, &players).await;
            lottery.close_round(&owner).await.unwrap();
            let request_id = coordinator.last_request().unwrap();

            lottery
                .fulfill_randomness(request_id, &[RandomWord::from(0)])
                .await
                .unwrap();
            assert_eq!(
                lottery
                    .fulfill_randomness(request_id, &[RandomWord::from(0)])
                    .await,
                Err(Error::InvalidTransition {
                    operation: Operation::Fulfill,
                    state: RoundState::Open
                })
            );
            assert_eq!(treasury.balance(&players[0]), 2 * FEE);
        });
    }

    #[test]
    fn test_single_entrant_wins() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, coordinator, treasury) = create_lottery(owner.clone());
            let players = entrants(1);
            fill(&mut lottery, &players).await;
            lottery.close_round(&owner).await.unwrap();
            let request_id = coordinator.last_request().unwrap();

            lottery
                .fulfill_randomness(request_id, &[RandomWord([0xff; 32])])
                .await
                .unwrap();
            assert_eq!(treasury.balance(&players[0]), FEE);
        });
    }

    #[test]
    fn test_payout_failure_and_retry() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, coordinator, treasury) = create_lottery(owner.clone());
            let players = entrants(3);
            fill(&mut lottery, &players).await;
            lottery.close_round(&owner).await.unwrap();
            let request_id = coordinator.last_request().unwrap();

            treasury.reject(&players[1]);
            let result = lottery
                .fulfill_randomness(request_id, &[RandomWord::from(7)])
                .await;
            assert!(matches!(
                result,
                Err(Error::PayoutFailed { amount, .. }) if amount == 3 * FEE
            ));
            assert_eq!(lottery.state(), RoundState::ClosedAwaitingRandomness);
            assert_eq!(lottery.pending_request(), Some(request_id));
            assert_eq!(lottery.players(), players.as_slice());
            assert_eq!(lottery.pooled_balance(), 3 * FEE);
            assert_eq!(lottery.last_winner(), None);
            assert!(lottery.payout_stalled());
            assert!(matches!(
                lottery.events().last(),
                Some(Event::PayoutStalled { .. })
            ));

            // Retrying while the winner still refuses keeps the round stuck.
            assert!(matches!(
                lottery.retry_payout(&owner).await,
                Err(Error::PayoutFailed { .. })
            ));

            treasury.accept(&players[1]);
            let event = lottery.retry_payout(&owner).await.unwrap();
            assert!(matches!(event, Event::WinnerPaid { winner_index: 1, .. }));
            assert_eq!(treasury.balance(&players[1]), 3 * FEE);
            assert_eq!(lottery.state(), RoundState::Open);
            assert!(!lottery.payout_stalled());
        });
    }

    #[test]
    fn test_fulfillment_rejected_after_stall() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, coordinator, treasury) = create_lottery(owner.clone());
            let players = entrants(3);
            fill(&mut lottery, &players).await;
            lottery.close_round(&owner).await.unwrap();
            let request_id = coordinator.last_request().unwrap();

            treasury.reject(&players[1]);
            assert!(lottery
                .fulfill_randomness(request_id, &[RandomWord::from(7)])
                .await
                .is_err());
            let before = lottery.snapshot();

            // A different word would pick players[2]; the drawn winner stands.
            treasury.accept(&players[1]);
            assert_eq!(
                lottery
                    .fulfill_randomness(request_id, &[RandomWord::from(8)])
                    .await,
                Err(Error::AlreadyFulfilled(request_id))
            );
            assert_eq!(lottery.snapshot(), before);
            for player in &players {
                assert_eq!(treasury.balance(player), 0);
            }

            let event = lottery.retry_payout(&owner).await.unwrap();
            assert!(matches!(event, Event::WinnerPaid { winner_index: 1, .. }));
            assert_eq!(treasury.balance(&players[1]), 3 * FEE);
            assert_eq!(treasury.balance(&players[2]), 0);
        });
    }

    #[test]
    fn test_lost_payout_reply_pays_once() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, coordinator, treasury) = create_lottery(owner.clone());
            let players = entrants(3);
            fill(&mut lottery, &players).await;
            lottery.close_round(&owner).await.unwrap();
            let request_id = coordinator.last_request().unwrap();

            // Custody moves the funds but the confirmation never arrives.
            treasury.drop_replies(&players[1]);
            assert!(matches!(
                lottery
                    .fulfill_randomness(request_id, &[RandomWord::from(7)])
                    .await,
                Err(Error::PayoutFailed { .. })
            ));
            assert!(lottery.payout_stalled());
            assert_eq!(treasury.balance(&players[1]), 3 * FEE);

            // Still unconfirmed, still no second transfer.
            assert!(lottery.retry_payout(&owner).await.is_err());
            assert_eq!(treasury.balance(&players[1]), 3 * FEE);

            treasury.deliver_replies(&players[1]);
            let event = lottery.retry_payout(&owner).await.unwrap();
            assert!(matches!(event, Event::WinnerPaid { winner_index: 1, .. }));
            assert_eq!(treasury.balance(&players[1]), 3 * FEE);
            assert_eq!(lottery.state(), RoundState::Open);
        });
    }

    #[test]
    fn test_lost_entry_reply_charges_once() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, _, treasury) = create_lottery(owner);
            let (_, player) = create_account_keypair(2);

            treasury.drop_replies(&player);
            assert!(matches!(
                lottery.enter(&player, FEE).await,
                Err(Error::PaymentRejected(_))
            ));
            assert_eq!(treasury.collected_from(&player), FEE);
            assert!(lottery.players().is_empty());
            assert_eq!(lottery.pooled_balance(), 0);

            treasury.deliver_replies(&player);
            lottery.enter(&player, FEE).await.unwrap();
            assert_eq!(treasury.collected_from(&player), FEE);
            assert_eq!(lottery.pooled_balance(), FEE);

            // The next ticket is a new transfer.
            lottery.enter(&player, FEE).await.unwrap();
            assert_eq!(treasury.collected_from(&player), 2 * FEE);
            assert_eq!(lottery.players().len(), 2);
        });
    }

    #[test]
    fn test_consecutive_rounds() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, coordinator, treasury) = create_lottery(owner.clone());
            let players = entrants(2);

            for round in 1..=3u64 {
                assert_eq!(lottery.round(), round);
                fill(&mut lottery, &players).await;
                lottery.close_round(&owner).await.unwrap();
                let request_id = coordinator.last_request().unwrap();
                assert_eq!(request_id, RequestId(round));
                lottery
                    .fulfill_randomness(request_id, &[RandomWord::from(round)])
                    .await
                    .unwrap();
            }
            // Words 1, 2 and 3 over two tickets pick 1, 0 and 1.
            assert_eq!(treasury.balance(&players[0]), 2 * FEE);
            assert_eq!(treasury.balance(&players[1]), 4 * FEE);
            assert_eq!(lottery.last_winner(), Some(&players[1]));
        });
    }

    #[test]
    fn test_event_log_is_bounded() {
        let executor = Runner::default();
        executor.start(|_| async move {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, _, _) = create_lottery(owner);
            let (_, player) = create_account_keypair(2);

            let capacity = lottery.config().event_log_capacity;
            for _ in 0..capacity + 5 {
                lottery.enter(&player, FEE).await.unwrap();
            }
            assert_eq!(lottery.events().count(), capacity);
            assert!(matches!(
                lottery.events().last(),
                Some(Event::Entered { tickets, .. }) if *tickets == (capacity + 5) as u64
            ));
        });
    }

    proptest! {
        #[test]
        fn prop_pool_is_sum_of_payments(extras in prop::collection::vec(0u128..1_000_000, 1..20)) {
            let (_, owner) = create_account_keypair(1);
            let (mut lottery, _, _, treasury) = create_lottery(owner);
            let players = entrants(extras.len() as u64);

            let mut total = 0;
            for (player, extra) in players.iter().zip(&extras) {
                block_on(lottery.enter(player, FEE + extra)).unwrap();
                total += FEE + extra;
                prop_assert_eq!(lottery.pooled_balance(), total);
            }
            prop_assert_eq!(lottery.players().len(), extras.len());
            let collected: Amount = players.iter().map(|p| treasury.collected_from(p)).sum();
            prop_assert_eq!(collected, total);
        }
    }
}
