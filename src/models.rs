//! Data models for the Pricing Engine.
//!
//! The `models` module defines the serialisable request and response
//! types that flow through the engine.  They are transient values: a
//! request is built by the caller, a response is produced by one
//! strategy and stamped by the engine, and neither is mutated after
//! that.  The strategy identifiers defined here are the only part of
//! the engine that is visible on the wire.

use crate::context::Fields;
use crate::error::PricingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Currency used when neither the request nor the configuration names
/// one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Identifies one of the four pricing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Base cost plus a percentage or fixed markup, plus optional tax.
    CostPlus,
    /// Base price times a regional multiplier.
    Geographic,
    /// Base price times active time-window multipliers and demand surge.
    TimeBased,
    /// Ordered condition/action rules applied to a running price.
    RuleBased,
}

impl StrategyKind {
    /// Every strategy, in the order they are listed to callers.
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::CostPlus,
        StrategyKind::Geographic,
        StrategyKind::TimeBased,
        StrategyKind::RuleBased,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::CostPlus => "cost_plus",
            StrategyKind::Geographic => "geographic",
            StrategyKind::TimeBased => "time_based",
            StrategyKind::RuleBased => "rule_based",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PricingError::InvalidStrategy(s.to_string()))
    }
}

/// Input to the pricing engine.
///
/// `inputs` carries the request-specific facts (`base_cost`,
/// `base_price`, `location`, `current_demand`, `timestamp`, ...).  Which
/// keys are required depends on the selected strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRequest {
    /// Strategy name as sent by the caller.  Kept as a string so that an
    /// unknown name surfaces as [`PricingError::InvalidStrategy`] from the
    /// engine rather than as a deserialisation failure.
    pub strategy: String,
    pub inputs: Fields,
    /// Stored pricing rule whose configuration should be used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<Uuid>,
    /// Evaluation time.  The engine fills this in when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<DateTime<Utc>>,
}

impl PricingRequest {
    pub fn new(strategy: impl Into<String>, inputs: Fields) -> Self {
        Self {
            strategy: strategy.into(),
            inputs,
            rule_id: None,
            requested_at: None,
        }
    }

    pub fn with_rule_id(mut self, rule_id: Uuid) -> Self {
        self.rule_id = Some(rule_id);
        self
    }

    pub fn requested_at(mut self, at: DateTime<Utc>) -> Self {
        self.requested_at = Some(at);
        self
    }
}

/// A single modification applied to the price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAdjustment {
    /// Adjustment category, e.g. `"markup"`, `"tax"`, `"surge"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable explanation.
    pub description: String,
    /// The configured amount: a percentage, rate, multiplier or fixed
    /// value depending on `kind`.
    pub amount: f64,
    /// The monetary effect the adjustment had on the price.
    pub applied: f64,
}

impl PriceAdjustment {
    pub fn new(kind: impl Into<String>, description: impl Into<String>, amount: f64, applied: f64) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            amount,
            applied,
        }
    }
}

/// Ordered trace of how a price was produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_price: f64,
    pub adjustments: Vec<PriceAdjustment>,
    /// Strategy-specific diagnostics.  The structure is intentionally
    /// free-form; each strategy documents the keys it writes.
    #[serde(default)]
    pub details: Fields,
}

/// The result of a price calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingResponse {
    /// Rounded to two decimals and never negative once it leaves the
    /// engine.
    pub final_price: f64,
    /// The pre-adjustment baseline (base cost or base price).
    pub original_price: f64,
    pub currency: String,
    pub breakdown: PriceBreakdown,
    pub strategy: StrategyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applied_rule_id: Option<Uuid>,
    pub calculated_at: DateTime<Utc>,
}

impl PricingResponse {
    pub fn new(
        strategy: StrategyKind,
        final_price: f64,
        original_price: f64,
        currency: impl Into<String>,
        breakdown: PriceBreakdown,
    ) -> Self {
        Self {
            final_price,
            original_price,
            currency: currency.into(),
            breakdown,
            strategy,
            applied_rule_id: None,
            calculated_at: Utc::now(),
        }
    }
}
