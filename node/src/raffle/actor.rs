use super::{ingress::Mailbox, Config, Error, Message};
use commonware_cryptography::ed25519::PublicKey;
use commonware_runtime::{Handle, Metrics, Spawner};
use futures::{channel::mpsc, StreamExt};
use prometheus_client::metrics::{counter::Counter, gauge::Gauge};
use raffle_execution::{Lottery, PriceFeed, RandomnessCoordinator, Treasury};
use raffle_types::{Event, Fulfillment, Instruction, RoundState, Transaction};
use std::{collections::HashMap, sync::atomic::AtomicU64};
use tracing::{debug, info, warn};

pub struct Actor<
    R: Spawner + Metrics + Clone,
    P: PriceFeed,
    C: RandomnessCoordinator,
    T: Treasury,
> {
    context: R,
    lottery: Lottery<P, C, T>,
    coordinator: PublicKey,
    nonces: HashMap<PublicKey, u64>,
    mailbox: mpsc::Receiver<Message>,

    transactions_accepted: Counter<u64, AtomicU64>,
    transactions_rejected: Counter<u64, AtomicU64>,
    fulfillments_accepted: Counter<u64, AtomicU64>,
    fulfillments_rejected: Counter<u64, AtomicU64>,
    payouts: Counter<u64, AtomicU64>,
    payouts_stalled: Counter<u64, AtomicU64>,
    round: Gauge,
    tickets: Gauge,
    awaiting_randomness: Gauge,
    accounts: Gauge,
}

impl<R, P, C, T> Actor<R, P, C, T>
where
    R: Spawner + Metrics + Clone,
    P: PriceFeed,
    C: RandomnessCoordinator,
    T: Treasury,
{
    pub fn new(context: R, config: Config<P, C, T>) -> (Self, Mailbox) {
        // Create mailbox
        let (sender, mailbox) = mpsc::channel(config.mailbox_size);

        // Create metrics
        let transactions_accepted: Counter<u64, AtomicU64> = Counter::default();
        let transactions_rejected: Counter<u64, AtomicU64> = Counter::default();
        let fulfillments_accepted: Counter<u64, AtomicU64> = Counter::default();
        let fulfillments_rejected: Counter<u64, AtomicU64> = Counter::default();
        let payouts: Counter<u64, AtomicU64> = Counter::default();
        let payouts_stalled: Counter<u64, AtomicU64> = Counter::default();
        let round = Gauge::default();
        let tickets = Gauge::default();
        let awaiting_randomness = Gauge::default();
        let accounts = Gauge::default();
        context.register(
            "transactions_accepted",
            "Number of transactions applied to the round",
            transactions_accepted.clone(),
        );
        context.register(
            "transactions_rejected",
            "Number of transactions rejected (signature, nonce or round rules)",
            transactions_rejected.clone(),
        );
        context.register(
            "fulfillments_accepted",
            "Number of randomness fulfillments that settled a round",
            fulfillments_accepted.clone(),
        );
        context.register(
            "fulfillments_rejected",
            "Number of randomness fulfillments rejected",
            fulfillments_rejected.clone(),
        );
        context.register("payouts", "Number of winners paid", payouts.clone());
        context.register(
            "payouts_stalled",
            "Number of settlements whose payout was refused",
            payouts_stalled.clone(),
        );
        context.register("round", "Current round number", round.clone());
        context.register("tickets", "Tickets in the current round", tickets.clone());
        context.register(
            "awaiting_randomness",
            "Whether the round is closed and waiting on randomness",
            awaiting_randomness.clone(),
        );
        context.register(
            "accounts",
            "Accounts with a tracked nonce",
            accounts.clone(),
        );

        // The owner is tracked from the start; everyone else once a transaction applies.
        let nonces = HashMap::from([(config.lottery.owner.clone(), 0)]);
        accounts.set(nonces.len() as i64);

        let lottery = Lottery::new(
            config.lottery,
            config.price_feed,
            config.randomness_coordinator,
            config.treasury,
        );
        round.set(lottery.round() as i64);

        (
            Self {
                context,
                lottery,
                coordinator: config.coordinator,
                nonces,
                mailbox,
                transactions_accepted,
                transactions_rejected,
                fulfillments_accepted,
                fulfillments_rejected,
                payouts,
                payouts_stalled,
                round,
                tickets,
                awaiting_randomness,
                accounts,
            },
            Mailbox::new(sender),
        )
    }

    pub fn start(self) -> Handle<()> {
        let context = self.context.clone();
        context.spawn(move |context| async move {
            let mut actor = self;
            actor.context = context;
            actor.run().await;
        })
    }

    async fn run(mut self) {
        info!(owner = ?self.lottery.owner(), coordinator = ?self.coordinator, "raffle started");
        loop {
            let Some(message) = self.mailbox.next().await else {
                warn!("mailbox closed");
                break;
            };
            match message {
                Message::Submit {
                    transaction,
                    response,
                } => {
                    let result = self.submit(transaction).await;
                    let _ = response.send(result);
                }
                Message::Fulfill {
                    fulfillment,
                    response,
                } => {
                    let result = self.fulfill(fulfillment).await;
                    let _ = response.send(result);
                }
                Message::EntranceFee { response } => {
                    let result = self.lottery.entrance_fee().await.map_err(Error::from);
                    let _ = response.send(result);
                }
                Message::Snapshot { response } => {
                    let _ = response.send(self.lottery.snapshot());
                }
                Message::Events { response } => {
                    let _ = response.send(self.lottery.events().cloned().collect());
                }
                Message::Nonce { account, response } => {
                    let _ = response.send(self.next_nonce(&account));
                }
            }
            self.update_gauges();
        }
    }

    fn next_nonce(&self, account: &PublicKey) -> u64 {
        self.nonces.get(account).copied().unwrap_or_default()
    }

    async fn submit(&mut self, transaction: Transaction) -> Result<Event, Error> {
        if !transaction.verify() {
            self.transactions_rejected.inc();
            warn!(
                public = ?transaction.public,
                nonce = transaction.nonce,
                "invalid transaction signature"
            );
            return Err(Error::InvalidSignature);
        }
        let Transaction {
            nonce,
            instruction,
            public,
            ..
        } = transaction;

        let expected = self.next_nonce(&public);
        if nonce != expected {
            self.transactions_rejected.inc();
            debug!(?public, expected, got = nonce, "unexpected nonce");
            return Err(Error::InvalidNonce {
                expected,
                got: nonce,
            });
        }
        let tracked = self.nonces.contains_key(&public);

        let result = match instruction {
            Instruction::Open => self.lottery.open_round(&public),
            Instruction::Enter { payment } => self.lottery.enter(&public, payment).await,
            Instruction::Close => self.lottery.close_round(&public).await,
            Instruction::RetryPayout => self.lottery.retry_payout(&public).await,
        };

        // Tracked accounts consume a nonce on every authenticated transaction. Other
        // keys only start being tracked once one of their transactions applies.
        if tracked || result.is_ok() {
            self.nonces.insert(public.clone(), expected + 1);
        }
        match &result {
            Ok(event) => {
                self.transactions_accepted.inc();
                self.observe(event);
            }
            Err(err) => {
                self.transactions_rejected.inc();
                if matches!(err, raffle_types::Error::PayoutFailed { .. }) {
                    self.payouts_stalled.inc();
                }
                warn!(?public, nonce, %err, "transaction rejected");
            }
        }
        result.map_err(Error::from)
    }

    async fn fulfill(&mut self, fulfillment: Fulfillment) -> Result<Event, Error> {
        if !fulfillment.verify(&self.coordinator) {
            self.fulfillments_rejected.inc();
            warn!(
                request_id = %fulfillment.request_id,
                "fulfillment not signed by coordinator"
            );
            return Err(Error::InvalidSignature);
        }
        let result = self
            .lottery
            .fulfill_randomness(fulfillment.request_id, &fulfillment.random_words)
            .await;
        match &result {
            Ok(event) => {
                self.fulfillments_accepted.inc();
                self.observe(event);
            }
            Err(err) => {
                self.fulfillments_rejected.inc();
                if matches!(err, raffle_types::Error::PayoutFailed { .. }) {
                    self.payouts_stalled.inc();
                }
                warn!(request_id = %fulfillment.request_id, %err, "fulfillment rejected");
            }
        }
        result.map_err(Error::from)
    }

    fn observe(&self, event: &Event) {
        if let Event::WinnerPaid { .. } = event {
            self.payouts.inc();
        }
    }

    fn update_gauges(&self) {
        self.round.set(self.lottery.round() as i64);
        self.tickets.set(self.lottery.players().len() as i64);
        self.awaiting_randomness.set(
            (self.lottery.state() == RoundState::ClosedAwaitingRandomness) as i64,
        );
        self.accounts.set(self.nonces.len() as i64);
    }
}
