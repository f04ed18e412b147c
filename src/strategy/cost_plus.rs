//! Cost-plus pricing: base cost, a markup, and optional tax.

use super::{into_fields, invalid_config, request_currency, required_amount, PricingStrategy};
use crate::context::{get_f64, get_str, Fields};
use crate::error::PricingError;
use crate::models::{PriceAdjustment, PriceBreakdown, PricingRequest, PricingResponse, StrategyKind};
use crate::rounding::{apply_bounds, config_bounds, round_to_two_decimals};
use serde_json::json;

/// How `markup_value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkupType {
    /// `markup_value` is a percentage of the base cost.
    Percentage,
    /// `markup_value` is an absolute amount.
    Fixed,
}

impl MarkupType {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "percentage" => Some(Self::Percentage),
            "fixed" => Some(Self::Fixed),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::Fixed => "fixed",
        }
    }
}

/// Adds a percentage or fixed markup to `base_cost`, then applies
/// `tax_rate` to the subtotal.
///
/// Inputs: `base_cost` (required), `markup_value`, `markup_type`,
/// `tax_rate`.  `markup_value`, `markup_type` and `tax_rate` fall back to
/// the configuration when absent from the inputs.
pub struct CostPlusStrategy;

impl PricingStrategy for CostPlusStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CostPlus
    }

    fn validate(&self, config: &Fields) -> Result<(), PricingError> {
        // Nothing is required here; every value may come from the request.
        if let Some(value) = config.get("markup_value") {
            match value.as_f64() {
                Some(v) if v >= 0.0 => {}
                Some(_) => return Err(invalid_config("markup_value cannot be negative")),
                None => return Err(invalid_config("markup_value must be a number")),
            }
        }
        if let Some(value) = config.get("tax_rate") {
            match value.as_f64() {
                Some(rate) if (0.0..=1.0).contains(&rate) => {}
                _ => return Err(invalid_config("tax_rate must be between 0 and 1")),
            }
        }
        if let Some(value) = config.get("markup_type") {
            if value.as_str().and_then(MarkupType::parse).is_none() {
                return Err(invalid_config("markup_type must be \"percentage\" or \"fixed\""));
            }
        }
        Ok(())
    }

    fn calculate(&self, req: &PricingRequest, config: &Fields) -> Result<PricingResponse, PricingError> {
        let base_cost = required_amount(&req.inputs, "base_cost")?;

        let markup_name = get_str(&req.inputs, "markup_type")
            .filter(|s| !s.is_empty())
            .or_else(|| get_str(config, "markup_type").filter(|s| !s.is_empty()))
            .unwrap_or("percentage");
        let markup_type = MarkupType::parse(markup_name).ok_or_else(|| {
            PricingError::InvalidFieldValue(format!("invalid markup_type: {markup_name}"))
        })?;

        let markup_value = get_f64(&req.inputs, "markup_value")
            .or_else(|| get_f64(config, "markup_value"))
            .ok_or_else(|| PricingError::MissingRequiredField("markup_value is required".into()))?;

        // A zero rate on the request does not override the configured rate.
        let tax_rate = match get_f64(&req.inputs, "tax_rate") {
            Some(rate) if rate != 0.0 => rate,
            _ => get_f64(config, "tax_rate").unwrap_or(0.0),
        };

        let markup_amount = match markup_type {
            MarkupType::Percentage => base_cost * (markup_value / 100.0),
            MarkupType::Fixed => markup_value,
        };
        let subtotal = base_cost + markup_amount;
        let tax_amount = subtotal * tax_rate;

        let (min_price, max_price) = config_bounds(config);
        let final_price = apply_bounds(subtotal + tax_amount, min_price, max_price);

        let mut adjustments = vec![PriceAdjustment::new(
            "markup",
            format!("{} markup", markup_type.as_str()),
            markup_value,
            markup_amount,
        )];
        if tax_amount > 0.0 {
            adjustments.push(PriceAdjustment::new("tax", "sales tax", tax_rate, tax_amount));
        }

        let details = json!({
            "base_cost": base_cost,
            "markup_type": markup_type.as_str(),
            "markup_value": markup_value,
            "markup_amount": round_to_two_decimals(markup_amount),
            "subtotal": round_to_two_decimals(subtotal),
            "tax_rate": tax_rate,
            "tax_amount": round_to_two_decimals(tax_amount),
            "final_price": round_to_two_decimals(final_price),
        });

        Ok(PricingResponse::new(
            StrategyKind::CostPlus,
            final_price,
            base_cost,
            request_currency(req, config),
            PriceBreakdown {
                base_price: base_cost,
                adjustments,
                details: into_fields(details),
            },
        ))
    }
}
