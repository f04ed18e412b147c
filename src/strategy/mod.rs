//! Pricing strategy trait and shared helpers.
//!
//! The `strategy` module defines the [`PricingStrategy`] trait, which
//! each of the four pricing algorithms implements, and a handful of
//! helpers for the input checks they have in common.  Strategies are
//! stateless: everything they need arrives in the request and the rule
//! configuration.

use crate::context::{get_f64, get_str, Fields};
use crate::error::PricingError;
use crate::models::{PricingRequest, PricingResponse, StrategyKind, DEFAULT_CURRENCY};

pub mod cost_plus;
pub mod geographic;
pub mod rule_based;
pub mod time_based;

pub use cost_plus::CostPlusStrategy;
pub use geographic::GeographicStrategy;
pub use rule_based::RuleBasedStrategy;
pub use time_based::TimeBasedStrategy;

/// A pricing strategy maps a request plus a rule configuration to a
/// price and an explanatory breakdown.
///
/// Strategies must be thread-safe (`Send + Sync`) because the engine
/// shares one instance of each across all callers and may invoke them
/// concurrently.
pub trait PricingStrategy: Send + Sync {
    /// The identifier this strategy is registered under.
    fn kind(&self) -> StrategyKind;

    /// Checks the configuration shape before any calculation happens.
    /// Failures are reported as [`PricingError::ConfigurationInvalid`].
    fn validate(&self, config: &Fields) -> Result<(), PricingError>;

    /// Computes the price.  The engine always calls [`validate`] first,
    /// so implementations may assume a well-formed configuration.
    ///
    /// [`validate`]: PricingStrategy::validate
    fn calculate(&self, req: &PricingRequest, config: &Fields) -> Result<PricingResponse, PricingError>;
}

/// Reads a required, non-negative monetary input such as `base_cost`
/// or `base_price`.
pub(crate) fn required_amount(inputs: &Fields, key: &str) -> Result<f64, PricingError> {
    let value = get_f64(inputs, key)
        .ok_or_else(|| PricingError::MissingRequiredField(format!("{key} is required")))?;
    if value < 0.0 {
        return Err(PricingError::InvalidFieldValue(format!("{key} cannot be negative")));
    }
    Ok(value)
}

/// Currency from the request inputs, then the configuration, then USD.
pub(crate) fn request_currency(req: &PricingRequest, config: &Fields) -> String {
    get_str(&req.inputs, "currency")
        .or_else(|| get_str(config, "currency"))
        .unwrap_or(DEFAULT_CURRENCY)
        .to_string()
}

pub(crate) fn invalid_config(msg: impl Into<String>) -> PricingError {
    PricingError::ConfigurationInvalid(msg.into())
}

/// Unwraps a `json!({...})` literal into breakdown details.
pub(crate) fn into_fields(value: serde_json::Value) -> Fields {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Fields::new(),
    }
}

#[cfg(test)]
pub(crate) fn fields(value: serde_json::Value) -> Fields {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_amount_distinguishes_missing_from_negative() {
        let inputs = fields(json!({"base_price": -1, "label": "x"}));
        assert!(matches!(
            required_amount(&inputs, "base_cost"),
            Err(PricingError::MissingRequiredField(_))
        ));
        assert!(matches!(
            required_amount(&inputs, "base_price"),
            Err(PricingError::InvalidFieldValue(_))
        ));
        assert!(matches!(
            required_amount(&inputs, "label"),
            Err(PricingError::MissingRequiredField(_))
        ));
    }

    #[test]
    fn currency_prefers_inputs_then_config() {
        let req = PricingRequest::new("cost_plus", fields(json!({"currency": "EUR"})));
        assert_eq!(request_currency(&req, &fields(json!({"currency": "GBP"}))), "EUR");

        let req = PricingRequest::new("cost_plus", Fields::new());
        assert_eq!(request_currency(&req, &fields(json!({"currency": "GBP"}))), "GBP");
        assert_eq!(request_currency(&req, &Fields::new()), "USD");
    }
}
