//! HTTP adapters for the external price feed, randomness coordinator and custody
//! services.
//!
//! All three speak JSON. 128-bit quantities travel as decimal strings and keys as
//! hex:
//!
//! | call                | request                                   | response                          |
//! |---------------------|-------------------------------------------|-----------------------------------|
//! | `GET  price`        |                                           | `{"price": "...", "decimals": 8}` |
//! | `POST request`      | subscription, key hash, gas, confirmations | `{"request_id": 1}`               |
//! | `POST collect`      | `{"id": "..", "account": "..", "amount": ".."}` | any 2xx                     |
//! | `POST disburse`     | `{"id": "..", "account": "..", "amount": ".."}` | any 2xx                     |
//!
//! The custody service must apply each transfer `id` at most once and answer a
//! repeated id with success, so transfers can be retried after a lost reply.
//!
//! Answers to randomness requests come back separately, as signed fulfillments
//! posted to the node's `/fulfill` endpoint.

use commonware_cryptography::ed25519::PublicKey;
use commonware_utils::hex;
use raffle_execution::{PriceFeed, RandomnessCoordinator, Treasury};
use raffle_types::{Amount, PriceReading, RandomnessParams, RequestId, TransferId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("failed: {0}")]
    Failed(reqwest::StatusCode),
    #[error("failed: {status}: {body}")]
    FailedWithBody {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Serialize, Deserialize)]
pub struct PriceResponse {
    pub price: String,
    pub decimals: u8,
}

#[derive(Serialize, Deserialize)]
pub struct RandomnessRequest {
    pub subscription_id: u64,
    pub key_hash: String,
    pub request_confirmations: u16,
    pub callback_gas_limit: u32,
    pub num_words: u32,
}

#[derive(Serialize, Deserialize)]
pub struct RandomnessResponse {
    pub request_id: u64,
}

#[derive(Serialize, Deserialize)]
pub struct Transfer {
    pub id: String,
    pub account: String,
    pub amount: String,
}

/// Client for one external service.
#[derive(Clone)]
pub struct Client {
    base_url: Url,
    http_client: reqwest::Client,
    auth_token: Option<String>,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidScheme(scheme.to_string())),
        }

        // Keep any path prefix when joining endpoint names.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            http_client,
            auth_token: None,
        })
    }

    /// Send `token` as a bearer credential on every request.
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, endpoint: &str) -> Result<reqwest::RequestBuilder> {
        let url = self.base_url.join(endpoint)?;
        let builder = self.http_client.request(method, url);
        Ok(match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if body.is_empty() {
            return Err(Error::Failed(status));
        }
        Err(Error::FailedWithBody { status, body })
    }

    async fn transfer(
        &self,
        endpoint: &str,
        id: &TransferId,
        account: &PublicKey,
        amount: Amount,
    ) -> Result<()> {
        let body = Transfer {
            id: id.to_string(),
            account: hex(account.as_ref()),
            amount: amount.to_string(),
        };
        let response = self
            .request(reqwest::Method::POST, endpoint)?
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        debug!(endpoint, %id, ?account, amount, "transfer accepted");
        Ok(())
    }
}

impl PriceFeed for Client {
    type Error = Error;

    async fn latest_price(&self) -> Result<PriceReading> {
        let response = self.request(reqwest::Method::GET, "price")?.send().await?;
        let body: PriceResponse = Self::check(response).await?.json().await?;
        let price = body
            .price
            .parse::<i128>()
            .map_err(|err| Error::InvalidResponse(format!("price {:?}: {err}", body.price)))?;
        Ok(PriceReading::new(price, body.decimals))
    }
}

impl RandomnessCoordinator for Client {
    type Error = Error;

    async fn request_randomness(&self, params: &RandomnessParams) -> Result<RequestId> {
        let body = RandomnessRequest {
            subscription_id: params.subscription_id,
            key_hash: hex(&params.key_hash),
            request_confirmations: params.request_confirmations,
            callback_gas_limit: params.callback_gas_limit,
            num_words: params.num_words,
        };
        let response = self
            .request(reqwest::Method::POST, "request")?
            .json(&body)
            .send()
            .await?;
        let body: RandomnessResponse = Self::check(response).await?.json().await?;
        Ok(RequestId(body.request_id))
    }
}

impl Treasury for Client {
    type Error = Error;

    async fn collect(&self, id: &TransferId, from: &PublicKey, amount: Amount) -> Result<()> {
        self.transfer("collect", id, from, amount).await
    }

    async fn disburse(&self, id: &TransferId, to: &PublicKey, amount: Amount) -> Result<()> {
        self.transfer("disburse", id, to, amount).await
    }
}
