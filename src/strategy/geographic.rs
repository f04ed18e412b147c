//! Location-based pricing with regional multipliers.
//!
//! A location such as `"US-CA"` is resolved against the configured
//! `regional_multipliers` with a strict precedence chain:
//!
//! 1. the full location code (`"US-CA"`),
//! 2. the country prefix before the first hyphen (`"US"`),
//! 3. a literal `"default"` entry,
//! 4. a no-op multiplier of `1.0`, reported as region `"unknown"`.
//!
//! Currency follows the same chain against the optional `currency_map`,
//! then `default_currency`, then USD.

use super::{into_fields, invalid_config, required_amount, PricingStrategy};
use crate::context::{as_f64, get_map, get_str, Fields};
use crate::error::PricingError;
use crate::models::{PriceAdjustment, PriceBreakdown, PricingRequest, PricingResponse, StrategyKind, DEFAULT_CURRENCY};
use crate::rounding::{apply_bounds, config_bounds, round_to_two_decimals};
use serde_json::{json, Value};

const DEFAULT_REGION: &str = "default";
const UNKNOWN_REGION: &str = "unknown";

pub struct GeographicStrategy;

impl PricingStrategy for GeographicStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Geographic
    }

    fn validate(&self, config: &Fields) -> Result<(), PricingError> {
        let multipliers = get_map(config, "regional_multipliers")
            .filter(|m| !m.is_empty())
            .ok_or_else(|| invalid_config("regional_multipliers map is required"))?;

        for (region, value) in multipliers {
            match as_f64(value) {
                Some(m) if m > 0.0 => {}
                Some(_) => return Err(invalid_config(format!("regional_multipliers[{region}] must be positive"))),
                None => return Err(invalid_config(format!("regional_multipliers[{region}] must be a number"))),
            }
        }
        Ok(())
    }

    fn calculate(&self, req: &PricingRequest, config: &Fields) -> Result<PricingResponse, PricingError> {
        let base_price = required_amount(&req.inputs, "base_price")?;
        let location = get_str(&req.inputs, "location")
            .map(|l| l.trim().to_uppercase())
            .filter(|l| !l.is_empty())
            .ok_or_else(|| PricingError::MissingRequiredField("location is required".into()))?;

        let empty = Fields::new();
        let multipliers = get_map(config, "regional_multipliers").unwrap_or(&empty);

        let (multiplier, region_used) = resolve_region(&location, multipliers, as_f64)
            .unwrap_or((1.0, UNKNOWN_REGION.to_string()));
        // Stored rules were validated on write, but `calculate` may be
        // reached without `validate`.
        if multiplier <= 0.0 {
            return Err(invalid_config(format!("regional_multipliers[{region_used}] must be positive")));
        }

        let (min_price, max_price) = config_bounds(config);
        let final_price = round_to_two_decimals(apply_bounds(base_price * multiplier, min_price, max_price));
        let currency = region_currency(&location, config);

        let mut available_regions: Vec<&str> = multipliers.keys().map(String::as_str).collect();
        available_regions.sort_unstable();

        let adjustment = PriceAdjustment::new(
            "regional_multiplier",
            format!("Regional pricing for {region_used}"),
            multiplier,
            final_price - base_price,
        );
        let details = json!({
            "base_price": base_price,
            "location": location,
            "region_used": region_used,
            "multiplier": multiplier,
            "final_price": final_price,
            "currency": currency,
            "available_regions": available_regions,
        });

        Ok(PricingResponse::new(
            StrategyKind::Geographic,
            final_price,
            base_price,
            currency,
            PriceBreakdown {
                base_price,
                adjustments: vec![adjustment],
                details: into_fields(details),
            },
        ))
    }
}

/// Walks the exact → country → default chain, returning the first entry
/// that `extract` accepts together with the key it was found under.
/// `location` must already be trimmed and uppercased.
fn resolve_region<T>(location: &str, table: &Fields, extract: impl Fn(&Value) -> Option<T>) -> Option<(T, String)> {
    let lookup = |key: &str| table.get(key).and_then(&extract).map(|v| (v, key.to_string()));

    lookup(location)
        .or_else(|| {
            location
                .split_once('-')
                .and_then(|(country, _)| lookup(country))
        })
        .or_else(|| lookup(DEFAULT_REGION))
}

fn region_currency(location: &str, config: &Fields) -> String {
    get_map(config, "currency_map")
        .and_then(|map| resolve_region(location, map, |v| v.as_str().map(str::to_string)))
        .map(|(currency, _)| currency)
        .or_else(|| get_str(config, "default_currency").map(str::to_string))
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
}
