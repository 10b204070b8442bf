//! Fee and holdback split for project payments.
//!
//! A gross payment is divided into three parts:
//! - the platform fee, a complexity-tiered percentage with a minimum floor
//! - the holdback, a flat percentage retained until the project is signed off
//! - the contractor amount, whatever remains and is paid out immediately
//!
//! All arithmetic is exact decimal arithmetic, so the three parts always sum
//! back to the gross amount.

use crate::error::PaymentError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Project complexity tier, selects the platform fee rate.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    #[default]
    Medium,
    Complex,
}

impl FromStr for Complexity {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Complexity::Simple),
            "medium" => Ok(Complexity::Medium),
            "complex" => Ok(Complexity::Complex),
            other => Err(PaymentError::ValidationError(format!(
                "Unknown project complexity: {other}"
            ))),
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Complexity::Simple => "simple",
            Complexity::Medium => "medium",
            Complexity::Complex => "complex",
        };
        f.write_str(name)
    }
}

/// Deployment environment. Non-production environments charge lower fees.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    #[default]
    Production,
}

impl FromStr for Environment {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(PaymentError::ConfigError(format!(
                "Unknown environment: {other}"
            ))),
        }
    }
}

/// The four-way split of a gross payment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionResult {
    #[serde(with = "rust_decimal::serde::float")]
    pub platform_fee: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub contractor_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub holdback_amount: Decimal,
    /// Portion paid to the contractor immediately. Equal to `contractor_amount`
    /// until further deductions exist.
    #[serde(with = "rust_decimal::serde::float")]
    pub net_contractor_amount: Decimal,
}

/// Fee rates and floors applied to every distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeePolicy {
    pub simple_rate: Decimal,
    pub medium_rate: Decimal,
    pub complex_rate: Decimal,
    pub holdback_rate: Decimal,
    pub minimum_fee: Decimal,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            simple_rate: dec!(0.03),
            medium_rate: dec!(0.05),
            complex_rate: dec!(0.07),
            holdback_rate: dec!(0.10),
            minimum_fee: dec!(5.00),
        }
    }
}

impl FeePolicy {
    /// Fee policy for a deployment environment.
    ///
    /// Development and staging lower the medium rate and the minimum fee; the
    /// simple and complex rates and the holdback rate never change.
    pub fn for_environment(environment: Environment) -> Self {
        let base = Self::default();
        match environment {
            Environment::Development => Self {
                medium_rate: dec!(0.01),
                minimum_fee: dec!(1.00),
                ..base
            },
            Environment::Staging => Self {
                medium_rate: dec!(0.02),
                minimum_fee: dec!(2.00),
                ..base
            },
            Environment::Production => base,
        }
    }

    pub fn fee_rate(&self, complexity: Complexity) -> Decimal {
        match complexity {
            Complexity::Simple => self.simple_rate,
            Complexity::Medium => self.medium_rate,
            Complexity::Complex => self.complex_rate,
        }
    }

    /// Splits `total_amount` into platform fee, holdback and contractor share.
    ///
    /// Performs no validation. When the minimum fee plus holdback exceeds the
    /// total, the contractor amount is negative and is returned as such.
    pub fn calculate(&self, total_amount: Decimal, complexity: Complexity) -> DistributionResult {
        let platform_fee = (total_amount * self.fee_rate(complexity)).max(self.minimum_fee);
        let holdback_amount = total_amount * self.holdback_rate;
        let contractor_amount = total_amount - platform_fee - holdback_amount;

        DistributionResult {
            platform_fee: platform_fee.normalize(),
            contractor_amount: contractor_amount.normalize(),
            holdback_amount: holdback_amount.normalize(),
            net_contractor_amount: contractor_amount.normalize(),
        }
    }
}
