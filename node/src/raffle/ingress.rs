use super::Error;
use commonware_cryptography::ed25519::PublicKey;
use futures::{
    channel::{mpsc, oneshot},
    SinkExt,
};
use raffle_types::{Amount, Event, Fulfillment, RoundSnapshot, Transaction};
use tracing::warn;

pub enum Message {
    Submit {
        transaction: Transaction,
        response: oneshot::Sender<Result<Event, Error>>,
    },
    Fulfill {
        fulfillment: Fulfillment,
        response: oneshot::Sender<Result<Event, Error>>,
    },
    EntranceFee {
        response: oneshot::Sender<Result<Amount, Error>>,
    },
    Snapshot {
        response: oneshot::Sender<RoundSnapshot>,
    },
    Events {
        response: oneshot::Sender<Vec<Event>>,
    },
    Nonce {
        account: PublicKey,
        response: oneshot::Sender<u64>,
    },
}

#[derive(Clone)]
pub struct Mailbox {
    sender: mpsc::Sender<Message>,
}

impl Mailbox {
    pub(super) fn new(sender: mpsc::Sender<Message>) -> Self {
        Self { sender }
    }

    async fn request<R>(
        &mut self,
        message: Message,
        receiver: oneshot::Receiver<R>,
        kind: &'static str,
    ) -> Result<R, Error> {
        if self.sender.send(message).await.is_err() {
            warn!(kind, "raffle mailbox closed; request dropped");
            return Err(Error::Closed);
        }
        receiver.await.map_err(|_| Error::Closed)
    }

    /// Apply a signed transaction.
    pub async fn submit(&mut self, transaction: Transaction) -> Result<Event, Error> {
        let (response, receiver) = oneshot::channel();
        self.request(
            Message::Submit {
                transaction,
                response,
            },
            receiver,
            "submit",
        )
        .await?
    }

    /// Deliver a coordinator fulfillment.
    pub async fn fulfill(&mut self, fulfillment: Fulfillment) -> Result<Event, Error> {
        let (response, receiver) = oneshot::channel();
        self.request(
            Message::Fulfill {
                fulfillment,
                response,
            },
            receiver,
            "fulfill",
        )
        .await?
    }

    pub async fn entrance_fee(&mut self) -> Result<Amount, Error> {
        let (response, receiver) = oneshot::channel();
        self.request(Message::EntranceFee { response }, receiver, "entrance_fee")
            .await?
    }

    pub async fn snapshot(&mut self) -> Result<RoundSnapshot, Error> {
        let (response, receiver) = oneshot::channel();
        self.request(Message::Snapshot { response }, receiver, "snapshot")
            .await
    }

    pub async fn events(&mut self) -> Result<Vec<Event>, Error> {
        let (response, receiver) = oneshot::channel();
        self.request(Message::Events { response }, receiver, "events")
            .await
    }

    /// Next nonce the actor will accept from `account`.
    pub async fn nonce(&mut self, account: PublicKey) -> Result<u64, Error> {
        let (response, receiver) = oneshot::channel();
        self.request(Message::Nonce { account, response }, receiver, "nonce")
            .await
    }
}
