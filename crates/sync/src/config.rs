//! Synchronization core configuration.
//!
//! # Environment Variables
//!
//! All optional; defaults match the production collection layout.
//!
//! - `VELVET_CART_COLLECTION` - Cart collection name (default: cart)
//! - `VELVET_WISHLIST_COLLECTION` - Wishlist collection name (default: wishlist)
//! - `VELVET_NOTICE_TTL_SECS` - Notification auto-dismiss delay (default: 3)
//! - `VELVET_CURRENCY` - ISO 4217 display currency (default: USD)

use std::time::Duration;

use thiserror::Error;
use velvet_bean_core::CurrencyCode;

/// Default auto-dismiss delay for status notifications.
const DEFAULT_NOTICE_TTL: Duration = Duration::from_secs(3);

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Synchronization core configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Collection holding cart line documents.
    pub cart_collection: String,
    /// Collection holding wishlist entry documents.
    pub wishlist_collection: String,
    /// How long a status notification stays visible before auto-dismiss.
    pub notice_ttl: Duration,
    /// Currency used when presenting derived totals.
    pub currency: CurrencyCode,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cart_collection: "cart".to_string(),
            wishlist_collection: "wishlist".to_string(),
            notice_ttl: DEFAULT_NOTICE_TTL,
            currency: CurrencyCode::USD,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            cart_collection: env_or("VELVET_CART_COLLECTION", &defaults.cart_collection),
            wishlist_collection: env_or(
                "VELVET_WISHLIST_COLLECTION",
                &defaults.wishlist_collection,
            ),
            notice_ttl: parse_ttl(std::env::var("VELVET_NOTICE_TTL_SECS").ok().as_deref())?,
            currency: parse_currency(std::env::var("VELVET_CURRENCY").ok().as_deref())?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_ttl(raw: Option<&str>) -> Result<Duration, ConfigError> {
    match raw {
        None => Ok(DEFAULT_NOTICE_TTL),
        Some(s) => s.parse::<u64>().map(Duration::from_secs).map_err(|e| {
            ConfigError::InvalidEnvVar("VELVET_NOTICE_TTL_SECS".to_string(), e.to_string())
        }),
    }
}

fn parse_currency(raw: Option<&str>) -> Result<CurrencyCode, ConfigError> {
    match raw {
        None => Ok(CurrencyCode::USD),
        Some("USD") => Ok(CurrencyCode::USD),
        Some("EUR") => Ok(CurrencyCode::EUR),
        Some("GBP") => Ok(CurrencyCode::GBP),
        Some("CAD") => Ok(CurrencyCode::CAD),
        Some("AUD") => Ok(CurrencyCode::AUD),
        Some(other) => Err(ConfigError::InvalidEnvVar(
            "VELVET_CURRENCY".to_string(),
            format!("unsupported currency code: {other}"),
        )),
    }
}
