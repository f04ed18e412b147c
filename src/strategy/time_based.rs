//! Time-of-day, day-of-week and demand surge pricing.
//!
//! Every configured time window that matches the effective timestamp
//! contributes its multiplier; matching windows compound in declaration
//! order rather than the first or largest one winning.  Times are
//! compared as zero-padded `HH:MM` strings, so a window that wraps past
//! midnight (`22:00`-`02:00`) never matches.

use super::{into_fields, invalid_config, request_currency, required_amount, PricingStrategy};
use crate::context::{get_array, get_bool, get_f64, get_str, Fields};
use crate::error::PricingError;
use crate::models::{PriceAdjustment, PriceBreakdown, PricingRequest, PricingResponse, StrategyKind};
use crate::rounding::{apply_bounds, config_bounds, round_to_two_decimals};
use chrono::{Datelike, DateTime, FixedOffset, NaiveTime, Timelike, Utc, Weekday};
use serde_json::{json, Value};
use tracing::warn;

const DEFAULT_SURGE_THRESHOLD: f64 = 1.0;
const SURGE_SLOPE: f64 = 0.5;
const MAX_SURGE_MULTIPLIER: f64 = 3.0;

/// A single time window parsed from the `time_windows` configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeWindow {
    /// Lowercase weekday names; empty means every day.
    pub days: Vec<String>,
    pub start_time: String,
    pub end_time: String,
    pub multiplier: f64,
}

impl TimeWindow {
    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let days: Vec<String> = get_array(map, "days")
            .map(|days| {
                days.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_lowercase)
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            days,
            start_time: get_str(map, "start_time").unwrap_or_default().to_string(),
            end_time: get_str(map, "end_time").unwrap_or_default().to_string(),
            multiplier: get_f64(map, "multiplier").unwrap_or(1.0),
        })
    }

    /// Whether the window covers `day` (lowercase weekday name) at
    /// `time` (`HH:MM`).  A missing start or end time means all day.
    pub fn applies(&self, day: &str, time: &str) -> bool {
        let day_matches = self.days.is_empty() || self.days.iter().any(|d| d == day);
        if !day_matches {
            return false;
        }
        if self.start_time.is_empty() || self.end_time.is_empty() {
            return true;
        }
        time >= self.start_time.as_str() && time <= self.end_time.as_str()
    }

    fn describe(&self) -> String {
        format!("{} surge ({}-{})", self.days.join("/"), self.start_time, self.end_time)
    }
}

pub struct TimeBasedStrategy;

impl PricingStrategy for TimeBasedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TimeBased
    }

    fn validate(&self, config: &Fields) -> Result<(), PricingError> {
        let windows = match config.get("time_windows") {
            None => return Err(invalid_config("time_windows array is required")),
            Some(Value::Array(windows)) => windows,
            Some(_) => return Err(invalid_config("time_windows must be an array")),
        };
        if windows.is_empty() {
            return Err(invalid_config("time_windows array cannot be empty"));
        }

        for (i, window) in windows.iter().enumerate() {
            let map = window
                .as_object()
                .ok_or_else(|| invalid_config(format!("time_windows[{i}] must be an object")))?;

            if get_f64(map, "multiplier").is_none() {
                return Err(invalid_config(format!(
                    "time_windows[{i}] missing required numeric field: multiplier"
                )));
            }
            for key in ["start_time", "end_time"] {
                if let Some(value) = map.get(key) {
                    if !value.as_str().is_some_and(is_valid_time) {
                        return Err(invalid_config(format!(
                            "time_windows[{i}] has invalid {key} format (use HH:MM)"
                        )));
                    }
                }
            }
            if let Some(days) = map.get("days") {
                let valid = days
                    .as_array()
                    .is_some_and(|days| days.iter().all(|d| d.as_str().and_then(parse_weekday).is_some()));
                if !valid {
                    return Err(invalid_config(format!(
                        "time_windows[{i}] days must be a list of weekday names"
                    )));
                }
            }
        }
        Ok(())
    }

    fn calculate(&self, req: &PricingRequest, config: &Fields) -> Result<PricingResponse, PricingError> {
        let base_price = required_amount(&req.inputs, "base_price")?;
        let timestamp = effective_timestamp(req);

        let windows: Vec<TimeWindow> = get_array(config, "time_windows")
            .map(|ws| ws.iter().filter_map(TimeWindow::from_value).collect())
            .unwrap_or_default();

        let day = weekday_name(timestamp.weekday());
        let time = format!("{:02}:{:02}", timestamp.hour(), timestamp.minute());
        let active: Vec<&TimeWindow> = windows.iter().filter(|w| w.applies(day, &time)).collect();
        let time_multiplier: f64 = active.iter().map(|w| w.multiplier).product();

        let current_demand = get_f64(&req.inputs, "current_demand");
        let surge = match current_demand {
            Some(demand) if get_bool(config, "surge_enabled").unwrap_or(false) => {
                let threshold = get_f64(config, "base_surge_threshold")
                    .filter(|t| *t != 0.0)
                    .unwrap_or(DEFAULT_SURGE_THRESHOLD);
                surge_multiplier(demand, threshold)
            }
            _ => 1.0,
        };

        let combined = time_multiplier * surge;
        let (min_price, max_price) = config_bounds(config);
        let final_price = apply_bounds(base_price * combined, min_price, max_price);

        let mut adjustments: Vec<PriceAdjustment> = active
            .iter()
            .map(|w| PriceAdjustment::new("time_window", w.describe(), w.multiplier, base_price * (w.multiplier - 1.0)))
            .collect();
        if surge > 1.0 {
            adjustments.push(PriceAdjustment::new(
                "surge",
                format!("Demand surge ({surge:.1}x)"),
                surge,
                base_price * time_multiplier * (surge - 1.0),
            ));
        }

        let mut details = into_fields(json!({
            "base_price": base_price,
            "timestamp": timestamp.to_rfc3339(),
            "day_of_week": day,
            "hour": timestamp.hour(),
            "active_windows": active.len(),
            "time_multiplier": time_multiplier,
            "surge_multiplier": surge,
            "combined_multiplier": combined,
            "final_price": round_to_two_decimals(final_price),
        }));
        if let Some(demand) = current_demand {
            details.insert("current_demand".into(), json!(demand));
        }

        Ok(PricingResponse::new(
            StrategyKind::TimeBased,
            final_price,
            base_price,
            request_currency(req, config),
            PriceBreakdown {
                base_price,
                adjustments,
                details,
            },
        ))
    }
}

/// `1 + (demand - threshold) * 0.5`, capped at 3x, or no surge at all
/// when demand does not exceed the threshold.
pub fn surge_multiplier(demand: f64, threshold: f64) -> f64 {
    if demand <= threshold {
        return 1.0;
    }
    (1.0 + (demand - threshold) * SURGE_SLOPE).min(MAX_SURGE_MULTIPLIER)
}

/// The `timestamp` input when it parses as RFC 3339, otherwise the
/// request time.  Calendar fields are read in the timestamp's own
/// offset.
fn effective_timestamp(req: &PricingRequest) -> DateTime<FixedOffset> {
    let fallback = || req.requested_at.unwrap_or_else(Utc::now).fixed_offset();
    match get_str(&req.inputs, "timestamp") {
        Some(raw) => DateTime::parse_from_rfc3339(raw).unwrap_or_else(|err| {
            warn!(timestamp = raw, error = %err, "ignoring unparseable timestamp input");
            fallback()
        }),
        None => fallback(),
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

fn parse_weekday(name: &str) -> Option<Weekday> {
    let lower = name.to_lowercase();
    [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
    .into_iter()
    .find(|d| weekday_name(*d) == lower)
}

/// Zero-padded 24-hour `HH:MM`.  Padding matters because windows are
/// matched by string comparison: an unpadded `"8:00"` would sort after
/// `"17:00"`.  Such values are rejected here even though a plain
/// `%H:%M` parse would accept them, so configurations written with
/// unpadded hours must be rewritten as `"08:00"`.
fn is_valid_time(s: &str) -> bool {
    s.len() == 5 && NaiveTime::parse_from_str(s, "%H:%M").is_ok()
}
