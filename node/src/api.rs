//! HTTP surface of the node.
//!
//! Commands arrive as `commonware-codec` encoded bodies (`/submit` takes a signed
//! [Transaction], `/fulfill` a coordinator-signed [Fulfillment]). Queries answer in
//! JSON, with 128-bit amounts as decimal strings and keys as hex.

use crate::{parse_public_key, raffle};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use commonware_codec::DecodeExt;
use commonware_utils::hex;
use raffle_types::{Error as RoundError, Event, Fulfillment, RoundSnapshot, Transaction};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

#[derive(Serialize)]
struct HealthzResponse {
    ok: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

#[derive(Serialize)]
pub struct RoundResponse {
    pub round: u64,
    pub state: &'static str,
    pub players: Vec<String>,
    pub pooled_balance: String,
    pub pending_request: Option<u64>,
    pub last_winner: Option<String>,
    pub payout_stalled: bool,
}

impl From<&RoundSnapshot> for RoundResponse {
    fn from(snapshot: &RoundSnapshot) -> Self {
        Self {
            round: snapshot.round,
            state: snapshot.state.as_str(),
            players: snapshot
                .players
                .iter()
                .map(|player| hex(player.as_ref()))
                .collect(),
            pooled_balance: snapshot.pooled_balance.to_string(),
            pending_request: snapshot.pending_request.map(|id| id.0),
            last_winner: snapshot.last_winner.as_ref().map(|key| hex(key.as_ref())),
            payout_stalled: snapshot.payout_stalled,
        }
    }
}

/// JSON rendering of an [Event].
pub fn event_json(event: &Event) -> serde_json::Value {
    match event {
        Event::RoundOpened { round } => json!({
            "kind": event.kind(),
            "round": round,
        }),
        Event::Entered {
            round,
            player,
            payment,
            tickets,
        } => json!({
            "kind": event.kind(),
            "round": round,
            "player": hex(player.as_ref()),
            "payment": payment.to_string(),
            "tickets": tickets,
        }),
        Event::RandomnessRequested {
            round,
            request_id,
            tickets,
            pooled_balance,
        } => json!({
            "kind": event.kind(),
            "round": round,
            "request_id": request_id.0,
            "tickets": tickets,
            "pooled_balance": pooled_balance.to_string(),
        }),
        Event::WinnerPaid {
            round,
            request_id,
            winner,
            winner_index,
            amount,
        } => json!({
            "kind": event.kind(),
            "round": round,
            "request_id": request_id.0,
            "winner": hex(winner.as_ref()),
            "winner_index": winner_index,
            "amount": amount.to_string(),
        }),
        Event::PayoutStalled {
            round,
            request_id,
            winner,
            amount,
        } => json!({
            "kind": event.kind(),
            "round": round,
            "request_id": request_id.0,
            "winner": hex(winner.as_ref()),
            "amount": amount.to_string(),
        }),
    }
}

fn classify(err: &raffle::Error) -> (StatusCode, &'static str) {
    match err {
        raffle::Error::InvalidSignature => (StatusCode::UNAUTHORIZED, "invalid_signature"),
        raffle::Error::InvalidNonce { .. } => (StatusCode::CONFLICT, "invalid_nonce"),
        raffle::Error::Closed => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        raffle::Error::Rejected(err) => match err {
            RoundError::Unauthorized => (StatusCode::FORBIDDEN, "unauthorized"),
            RoundError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
            RoundError::InsufficientPayment { .. } => {
                (StatusCode::PAYMENT_REQUIRED, "insufficient_payment")
            }
            RoundError::NoEntrants => (StatusCode::CONFLICT, "no_entrants"),
            RoundError::OracleUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "oracle_unavailable")
            }
            RoundError::PayoutFailed { .. } => (StatusCode::BAD_GATEWAY, "payout_failed"),
            RoundError::UnknownRequest { .. } => (StatusCode::CONFLICT, "unknown_request"),
            RoundError::AlreadyFulfilled(_) => (StatusCode::CONFLICT, "already_fulfilled"),
            RoundError::RandomnessUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "randomness_unavailable")
            }
            RoundError::EmptyRandomness => (StatusCode::BAD_REQUEST, "empty_randomness"),
            RoundError::PaymentRejected(_) => (StatusCode::PAYMENT_REQUIRED, "payment_rejected"),
            RoundError::FeeOverflow => (StatusCode::UNPROCESSABLE_ENTITY, "fee_overflow"),
            RoundError::PoolOverflow => (StatusCode::UNPROCESSABLE_ENTITY, "pool_overflow"),
        },
    }
}

fn error_response(err: raffle::Error) -> Response {
    let (status, error) = classify(&err);
    (
        status,
        Json(ErrorResponse {
            error,
            message: err.to_string(),
        }),
    )
        .into_response()
}

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "bad_request",
            message,
        }),
    )
        .into_response()
}

async fn healthz() -> Response {
    Json(HealthzResponse { ok: true }).into_response()
}

async fn submit(State(mut mailbox): State<raffle::Mailbox>, body: Bytes) -> Response {
    let transaction = match Transaction::decode(body.as_ref()) {
        Ok(transaction) => transaction,
        Err(err) => {
            debug!(?err, len = body.len(), "failed to decode transaction");
            return bad_request(format!("invalid transaction: {err}"));
        }
    };
    match mailbox.submit(transaction).await {
        Ok(event) => Json(event_json(&event)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn fulfill(State(mut mailbox): State<raffle::Mailbox>, body: Bytes) -> Response {
    let fulfillment = match Fulfillment::decode(body.as_ref()) {
        Ok(fulfillment) => fulfillment,
        Err(err) => {
            debug!(?err, len = body.len(), "failed to decode fulfillment");
            return bad_request(format!("invalid fulfillment: {err}"));
        }
    };
    match mailbox.fulfill(fulfillment).await {
        Ok(event) => Json(event_json(&event)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn round(State(mut mailbox): State<raffle::Mailbox>) -> Response {
    match mailbox.snapshot().await {
        Ok(snapshot) => Json(RoundResponse::from(&snapshot)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn winner(State(mut mailbox): State<raffle::Mailbox>) -> Response {
    match mailbox.snapshot().await {
        Ok(snapshot) => Json(json!({
            "last_winner": snapshot.last_winner.as_ref().map(|key| hex(key.as_ref())),
        }))
        .into_response(),
        Err(err) => error_response(err),
    }
}

async fn fee(State(mut mailbox): State<raffle::Mailbox>) -> Response {
    match mailbox.entrance_fee().await {
        Ok(fee) => Json(json!({ "fee": fee.to_string() })).into_response(),
        Err(err) => error_response(err),
    }
}

async fn events(State(mut mailbox): State<raffle::Mailbox>) -> Response {
    match mailbox.events().await {
        Ok(events) => {
            Json(events.iter().map(event_json).collect::<Vec<_>>()).into_response()
        }
        Err(err) => error_response(err),
    }
}

async fn nonce(
    State(mut mailbox): State<raffle::Mailbox>,
    Path(account): Path<String>,
) -> Response {
    let Some(account) = parse_public_key(&account) else {
        return bad_request(format!("invalid account: {account}"));
    };
    match mailbox.nonce(account).await {
        Ok(nonce) => Json(json!({ "nonce": nonce })).into_response(),
        Err(err) => error_response(err),
    }
}

pub struct Api {
    mailbox: raffle::Mailbox,
}

impl Api {
    pub fn new(mailbox: raffle::Mailbox) -> Self {
        Self { mailbox }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/healthz", get(healthz))
            .route("/submit", post(submit))
            .route("/fulfill", post(fulfill))
            .route("/round", get(round))
            .route("/winner", get(winner))
            .route("/fee", get(fee))
            .route("/events", get(events))
            .route("/nonce/:account", get(nonce))
            .with_state(self.mailbox.clone())
    }
}
