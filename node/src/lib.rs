use commonware_codec::DecodeExt;
use commonware_cryptography::ed25519::PublicKey;
use commonware_utils::{from_hex_formatted, hex};
use raffle_types::{Amount, RandomnessParams, NATIVE_UNIT};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};
use thiserror::Error;
use tracing::Level;
use url::Url;

pub mod api;
pub mod client;
pub mod defaults;
pub mod raffle;

#[derive(Clone, PartialEq, Eq)]
pub struct HexBytes(Vec<u8>);

impl HexBytes {
    pub fn from_hex_formatted(value: &str) -> Option<Self> {
        from_hex_formatted(value).map(Self)
    }
}

impl AsRef<[u8]> for HexBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex(&self.0))
    }
}

impl Serialize for HexBytes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex(self.as_ref()))
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        let bytes = from_hex_formatted(&value)
            .ok_or_else(|| serde::de::Error::custom("expected a hex string"))?;
        Ok(Self(bytes))
    }
}

/// Configuration for the raffle node.
#[derive(Deserialize, Serialize)]
pub struct Config {
    /// Account allowed to open, close and retry rounds.
    pub owner: HexBytes,
    /// Key that signs randomness fulfillments.
    pub coordinator: HexBytes,

    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_mailbox_size")]
    pub mailbox_size: usize,
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,

    /// Minimum entry value in whole reference-currency units.
    #[serde(default = "default_minimum_entry_value")]
    pub minimum_entry_value: u64,

    pub price_feed: String,
    pub randomness_coordinator: String,
    pub treasury: String,
    #[serde(default)]
    pub treasury_auth_token: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    pub subscription_id: u64,
    pub key_hash: HexBytes,
    #[serde(default = "default_request_confirmations")]
    pub request_confirmations: u16,
    #[serde(default = "default_callback_gas_limit")]
    pub callback_gas_limit: u32,
    #[serde(default = "default_num_words")]
    pub num_words: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} is invalid: {value}")]
    InvalidDecode {
        field: &'static str,
        value: String,
        #[source]
        source: commonware_codec::Error,
    },
    #[error("{field} must be {expected} bytes (got {got})")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
    #[error("{field} must be a valid URL: {value}")]
    InvalidUrl { field: &'static str, value: String },
    #[error("{field} URL scheme must be http or https: {value}")]
    InvalidUrlScheme { field: &'static str, value: String },
    #[error("port and metrics_port must be different (port={port}, metrics_port={metrics_port})")]
    PortConflict { port: u16, metrics_port: u16 },
}

pub struct ValidatedConfig {
    pub owner: PublicKey,
    pub coordinator: PublicKey,

    pub port: u16,
    pub metrics_port: u16,
    pub worker_threads: usize,
    pub log_level: Level,

    pub mailbox_size: usize,
    pub event_log_capacity: usize,
    pub minimum_reference_value: Amount,

    pub price_feed: String,
    pub randomness_coordinator: String,
    pub treasury: String,
    pub treasury_auth_token: Option<String>,
    pub request_timeout: Duration,

    pub randomness: RandomnessParams,
}

impl ValidatedConfig {
    /// Parameters of the round state machine.
    pub fn lottery(&self) -> raffle_execution::Config {
        raffle_execution::Config {
            owner: self.owner.clone(),
            minimum_reference_value: self.minimum_reference_value,
            randomness: self.randomness.clone(),
            event_log_capacity: self.event_log_capacity,
        }
    }
}

struct RedactedConfig<'a>(&'a Config);

impl fmt::Debug for RedactedConfig<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cfg = self.0;
        f.debug_struct("Config")
            .field("owner", &cfg.owner)
            .field("coordinator", &cfg.coordinator)
            .field("port", &cfg.port)
            .field("metrics_port", &cfg.metrics_port)
            .field("worker_threads", &cfg.worker_threads)
            .field("log_level", &cfg.log_level)
            .field("mailbox_size", &cfg.mailbox_size)
            .field("event_log_capacity", &cfg.event_log_capacity)
            .field("minimum_entry_value", &cfg.minimum_entry_value)
            .field("price_feed", &cfg.price_feed)
            .field("randomness_coordinator", &cfg.randomness_coordinator)
            .field("treasury", &cfg.treasury)
            .field(
                "treasury_auth_token",
                &cfg.treasury_auth_token.as_ref().map(|_| "<redacted>"),
            )
            .field("request_timeout_ms", &cfg.request_timeout_ms)
            .field("subscription_id", &cfg.subscription_id)
            .field("key_hash", &cfg.key_hash)
            .field("request_confirmations", &cfg.request_confirmations)
            .field("callback_gas_limit", &cfg.callback_gas_limit)
            .field("num_words", &cfg.num_words)
            .finish()
    }
}

fn default_port() -> u16 {
    defaults::DEFAULT_PORT
}

fn default_metrics_port() -> u16 {
    defaults::DEFAULT_METRICS_PORT
}

fn default_worker_threads() -> usize {
    defaults::DEFAULT_WORKER_THREADS
}

fn default_log_level() -> String {
    defaults::DEFAULT_LOG_LEVEL.to_string()
}

fn default_mailbox_size() -> usize {
    defaults::DEFAULT_MAILBOX_SIZE
}

fn default_event_log_capacity() -> usize {
    defaults::DEFAULT_EVENT_LOG_CAPACITY
}

fn default_minimum_entry_value() -> u64 {
    defaults::DEFAULT_MINIMUM_ENTRY_VALUE
}

fn default_request_timeout_ms() -> u64 {
    defaults::DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_request_confirmations() -> u16 {
    defaults::DEFAULT_REQUEST_CONFIRMATIONS
}

fn default_callback_gas_limit() -> u32 {
    defaults::DEFAULT_CALLBACK_GAS_LIMIT
}

fn default_num_words() -> u32 {
    defaults::DEFAULT_NUM_WORDS
}

fn decode_bytes<T: DecodeExt<()>>(field: &'static str, value: &HexBytes) -> Result<T, ConfigError> {
    T::decode(value.as_ref()).map_err(|source| ConfigError::InvalidDecode {
        field,
        value: hex(value.as_ref()),
        source,
    })
}

fn ensure_nonzero(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidNonZero { field, value });
    }
    Ok(())
}

fn validate_http_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|_| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => {}
        _ => {
            return Err(ConfigError::InvalidUrlScheme {
                field,
                value: value.to_string(),
            })
        }
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Parse a hex-encoded ed25519 public key.
pub fn parse_public_key(value: &str) -> Option<PublicKey> {
    from_hex_formatted(value).and_then(|key| PublicKey::decode(key.as_ref()).ok())
}

impl Config {
    pub fn redacted_debug(&self) -> impl fmt::Debug + '_ {
        RedactedConfig(self)
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let owner: PublicKey = decode_bytes("owner", &self.owner)?;
        let coordinator: PublicKey = decode_bytes("coordinator", &self.coordinator)?;

        ensure_nonzero("worker_threads", self.worker_threads as u64)?;
        ensure_nonzero("mailbox_size", self.mailbox_size as u64)?;
        ensure_nonzero("minimum_entry_value", self.minimum_entry_value)?;
        ensure_nonzero("request_timeout_ms", self.request_timeout_ms)?;
        ensure_nonzero("num_words", self.num_words as u64)?;
        ensure_nonzero("callback_gas_limit", self.callback_gas_limit as u64)?;

        if self.port == self.metrics_port {
            return Err(ConfigError::PortConflict {
                port: self.port,
                metrics_port: self.metrics_port,
            });
        }

        validate_http_url("price_feed", &self.price_feed)?;
        validate_http_url("randomness_coordinator", &self.randomness_coordinator)?;
        validate_http_url("treasury", &self.treasury)?;

        let key_hash: [u8; 32] =
            self.key_hash
                .as_ref()
                .try_into()
                .map_err(|_| ConfigError::InvalidLength {
                    field: "key_hash",
                    expected: 32,
                    got: self.key_hash.as_ref().len(),
                })?;

        let log_level =
            Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;

        let randomness = RandomnessParams {
            subscription_id: self.subscription_id,
            key_hash,
            request_confirmations: self.request_confirmations,
            callback_gas_limit: self.callback_gas_limit,
            num_words: self.num_words,
        };

        Ok(ValidatedConfig {
            owner,
            coordinator,
            port: self.port,
            metrics_port: self.metrics_port,
            worker_threads: self.worker_threads,
            log_level,
            mailbox_size: self.mailbox_size,
            event_log_capacity: self.event_log_capacity,
            minimum_reference_value: self.minimum_entry_value as Amount * NATIVE_UNIT,
            price_feed: self.price_feed,
            randomness_coordinator: self.randomness_coordinator,
            treasury: self.treasury,
            treasury_auth_token: self.treasury_auth_token,
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            randomness,
        })
    }
}
