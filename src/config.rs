//! Runtime configuration, read from environment variables.

use crate::domain::distribution::{Environment, FeePolicy};
use crate::domain::money::Currency;
use crate::error::{PaymentError, Result};
use crate::infrastructure::stripe::{DEFAULT_API_BASE, DEFAULT_API_VERSION};
use std::time::Duration;

pub const WEBHOOK_SECRET_VAR: &str = "STRIPE_WEBHOOK_SECRET";
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct Config {
    pub secret_key: String,
    pub api_base: String,
    pub api_version: String,
    pub environment: Environment,
    pub payout_currency: Currency,
    pub bind: String,
    pub log_json: bool,
    pub webhook_tolerance: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secret_key = get("STRIPE_SECRET_KEY").ok_or_else(|| {
            PaymentError::ConfigError(
                "STRIPE_SECRET_KEY environment variable is required".to_string(),
            )
        })?;

        let environment = match get("SPLITPAY_ENVIRONMENT") {
            Some(value) => value.parse()?,
            None => Environment::default(),
        };

        let payout_currency = match get("SPLITPAY_PAYOUT_CURRENCY") {
            Some(value) => Currency::new(&value)
                .map_err(|e| PaymentError::ConfigError(e.to_string()))?,
            None => Currency::usd(),
        };

        let webhook_tolerance = match get("STRIPE_WEBHOOK_TOLERANCE_SECS") {
            Some(value) => Duration::from_secs(value.parse().map_err(|_| {
                PaymentError::ConfigError(format!(
                    "STRIPE_WEBHOOK_TOLERANCE_SECS must be a number of seconds, got {value}"
                ))
            })?),
            None => crate::infrastructure::stripe::webhook::DEFAULT_TOLERANCE,
        };

        Ok(Self {
            secret_key,
            api_base: get("STRIPE_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_version: get("STRIPE_API_VERSION")
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            environment,
            payout_currency,
            bind: get("SPLITPAY_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            log_json: get("SPLITPAY_LOG_JSON")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            webhook_tolerance,
        })
    }

    pub fn fee_policy(&self) -> FeePolicy {
        FeePolicy::for_environment(self.environment)
    }
}

/// Where the webhook signing secret comes from.
///
/// The environment variable is read on every call, so a rotated secret takes
/// effect without a restart.
#[derive(Debug, Clone)]
pub enum WebhookSecret {
    FromEnv(String),
    Fixed(String),
}

impl Default for WebhookSecret {
    fn default() -> Self {
        WebhookSecret::FromEnv(WEBHOOK_SECRET_VAR.to_string())
    }
}

impl WebhookSecret {
    pub fn resolve(&self) -> Option<String> {
        match self {
            WebhookSecret::FromEnv(var) => std::env::var(var).ok().filter(|v| !v.is_empty()),
            WebhookSecret::Fixed(secret) => Some(secret.clone()).filter(|v| !v.is_empty()),
        }
    }
}
