//! Pricing computation engine.
//!
//! The `engine` module turns a [`PricingRequest`] plus a rule
//! configuration into a [`PricingResponse`].  It owns a registry of the
//! four strategies, built once in [`PricingEngine::new`] and read-only
//! afterwards, so a single engine can be shared freely between threads.
//! Batches of independent calculations are spread across CPU cores with
//! [`rayon`].

use crate::context::Fields;
use crate::error::PricingError;
use crate::models::{PricingRequest, PricingResponse, StrategyKind};
use crate::rounding::round_to_two_decimals;
use crate::strategy::{
    CostPlusStrategy, GeographicStrategy, PricingStrategy, RuleBasedStrategy, TimeBasedStrategy,
};
use chrono::Utc;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Dispatches pricing requests to the registered strategies.
pub struct PricingEngine {
    strategies: HashMap<StrategyKind, Arc<dyn PricingStrategy>>,
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingEngine {
    /// Creates an engine with all four strategies registered.
    pub fn new() -> Self {
        let all: [Arc<dyn PricingStrategy>; 4] = [
            Arc::new(CostPlusStrategy),
            Arc::new(GeographicStrategy),
            Arc::new(TimeBasedStrategy),
            Arc::new(RuleBasedStrategy),
        ];
        let strategies = all.into_iter().map(|s| (s.kind(), s)).collect();
        Self { strategies }
    }

    /// Returns the strategy registered for `kind`.
    pub fn strategy(&self, kind: StrategyKind) -> Result<&dyn PricingStrategy, PricingError> {
        self.strategies
            .get(&kind)
            .map(|s| s.as_ref())
            .ok_or_else(|| PricingError::InvalidStrategy(format!("strategy not registered: {kind}")))
    }

    /// Names of every registered strategy, in a stable order.
    pub fn list_strategies(&self) -> Vec<&'static str> {
        StrategyKind::ALL
            .into_iter()
            .filter(|kind| self.strategies.contains_key(kind))
            .map(StrategyKind::as_str)
            .collect()
    }

    /// Checks `config` against the named strategy without calculating.
    pub fn validate_config(&self, strategy: &str, config: &Fields) -> Result<(), PricingError> {
        let kind: StrategyKind = strategy.parse()?;
        self.strategy(kind)?.validate(config)
    }

    /// Calculates a price.
    ///
    /// The configuration is validated before the strategy runs, the
    /// request time defaults to now, and the final price is rounded to
    /// two decimals and rejected if it is negative.
    pub fn calculate(&self, req: &PricingRequest, config: &Fields) -> Result<PricingResponse, PricingError> {
        let kind: StrategyKind = req.strategy.parse()?;
        let strategy = self.strategy(kind)?;
        strategy.validate(config)?;

        let stamped;
        let req = if req.requested_at.is_none() {
            stamped = req.clone().requested_at(Utc::now());
            &stamped
        } else {
            req
        };

        debug!(strategy = %kind, rule_id = ?req.rule_id, "calculating price");
        let mut response = strategy.calculate(req, config)?;

        response.strategy = kind;
        response.calculated_at = Utc::now();
        response.applied_rule_id = req.rule_id;
        response.final_price = round_to_two_decimals(response.final_price);

        // Overflowing inputs surface as inf or NaN; both fail this check.
        if !(response.final_price.is_finite() && response.final_price >= 0.0) {
            warn!(strategy = %kind, final_price = response.final_price, "calculated an invalid price");
            return Err(PricingError::NegativePrice(response.final_price));
        }
        debug!(strategy = %kind, final_price = response.final_price, "price calculated");
        Ok(response)
    }

    /// Calculates many independent requests in parallel.  Results come
    /// back in input order; one failure does not affect the others.
    pub fn calculate_batch(&self, items: Vec<(PricingRequest, Fields)>) -> Vec<Result<PricingResponse, PricingError>> {
        items
            .into_par_iter()
            .map(|(req, config)| self.calculate(&req, &config))
            .collect()
    }
}
