//! Conditional rule pricing.
//!
//! Rules are evaluated in list order against the request inputs.  Each
//! matching rule transforms the running price produced by the rules
//! before it.  A rule's `priority` is carried through to the breakdown
//! but does not reorder evaluation.

use super::{into_fields, invalid_config, request_currency, required_amount, PricingStrategy};
use crate::context::{as_f64, get_array, get_f64, get_str, Fields};
use crate::error::PricingError;
use crate::models::{PriceAdjustment, PriceBreakdown, PricingRequest, PricingResponse, StrategyKind};
use crate::rounding::{apply_bounds, config_bounds, round_to_two_decimals};
use serde_json::{json, Value};

/// What a matching rule does to the running price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    /// Subtract `value` percent of the current price.
    ApplyDiscount,
    /// Add `value` percent of the current price.
    ApplyMarkup,
    /// Multiply the current price by `value`.
    SetMultiplier,
    /// Add `value` (which may be negative).
    AddFixedAmount,
    /// Replace the current price with `value`.
    SetPrice,
}

impl RuleAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "apply_discount" => Some(Self::ApplyDiscount),
            "apply_markup" => Some(Self::ApplyMarkup),
            "set_multiplier" => Some(Self::SetMultiplier),
            "add_fixed_amount" => Some(Self::AddFixedAmount),
            "set_price" => Some(Self::SetPrice),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApplyDiscount => "apply_discount",
            Self::ApplyMarkup => "apply_markup",
            Self::SetMultiplier => "set_multiplier",
            Self::AddFixedAmount => "add_fixed_amount",
            Self::SetPrice => "set_price",
        }
    }

    pub fn apply(self, price: f64, value: f64) -> f64 {
        match self {
            Self::ApplyDiscount => price - price * (value / 100.0),
            Self::ApplyMarkup => price + price * (value / 100.0),
            Self::SetMultiplier => price * value,
            Self::AddFixedAmount => price + value,
            Self::SetPrice => value,
        }
    }
}

/// Comparison operator of a rule condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Ge,
    Le,
    Eq,
    Ne,
    Gt,
    Lt,
}

impl Operator {
    /// Two-character operators come first so `>=` is never split on `>`.
    const PRECEDENCE: [Operator; 6] = [
        Operator::Ge,
        Operator::Le,
        Operator::Eq,
        Operator::Ne,
        Operator::Gt,
        Operator::Lt,
    ];

    fn symbol(self) -> &'static str {
        match self {
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
        }
    }

    fn compare_numbers(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Operator::Ge => lhs >= rhs,
            Operator::Le => lhs <= rhs,
            Operator::Eq => lhs == rhs,
            Operator::Ne => lhs != rhs,
            Operator::Gt => lhs > rhs,
            Operator::Lt => lhs < rhs,
        }
    }
}

/// A parsed rule condition: `true`/`always`, or `<field> <op> <value>`.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Always,
    Compare {
        field: String,
        op: Operator,
        target: String,
    },
    /// Anything that does not parse; never matches.
    Never,
}

impl Condition {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == "true" || raw == "always" {
            return Condition::Always;
        }
        for op in Operator::PRECEDENCE {
            let parts: Vec<&str> = raw.split(op.symbol()).collect();
            if let [field, target] = parts.as_slice() {
                return Condition::Compare {
                    field: field.trim().to_string(),
                    op,
                    target: target.trim().to_string(),
                };
            }
        }
        Condition::Never
    }

    /// Evaluates against the request inputs.  Numeric comparison is
    /// tried first; otherwise only `==` and `!=` fall back to string
    /// comparison and every other operator is false.
    pub fn matches(&self, inputs: &Fields) -> bool {
        let (field, op, target) = match self {
            Condition::Always => return true,
            Condition::Never => return false,
            Condition::Compare { field, op, target } => (field, *op, target),
        };
        let Some(value) = inputs.get(field.as_str()) else {
            return false;
        };

        if let (Some(lhs), Ok(rhs)) = (as_f64(value), target.parse::<f64>()) {
            return op.compare_numbers(lhs, rhs);
        }

        let lhs = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let rhs = target.trim_matches(|c| c == '"' || c == '\'');
        match op {
            Operator::Eq => lhs == rhs,
            Operator::Ne => lhs != rhs,
            _ => false,
        }
    }
}

/// One entry of the `rules` configuration list.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalRule {
    pub condition: String,
    pub action: RuleAction,
    pub value: f64,
    /// Stored for reference only; evaluation follows list order.
    pub priority: Option<i64>,
}

impl ConditionalRule {
    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            condition: get_str(map, "condition")?.to_string(),
            action: RuleAction::parse(get_str(map, "action")?)?,
            value: get_f64(map, "value")?,
            priority: map.get("priority").and_then(Value::as_i64),
        })
    }
}

pub struct RuleBasedStrategy;

impl PricingStrategy for RuleBasedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RuleBased
    }

    fn validate(&self, config: &Fields) -> Result<(), PricingError> {
        let rules = match config.get("rules") {
            None => return Err(invalid_config("rules array is required")),
            Some(Value::Array(rules)) => rules,
            Some(_) => return Err(invalid_config("rules must be an array")),
        };
        if rules.is_empty() {
            return Err(invalid_config("rules array cannot be empty"));
        }

        for (i, rule) in rules.iter().enumerate() {
            let map = rule
                .as_object()
                .ok_or_else(|| invalid_config(format!("rules[{i}] must be an object")))?;
            if get_str(map, "condition").is_none() {
                return Err(invalid_config(format!("rules[{i}] missing required field: condition")));
            }
            let action = get_str(map, "action")
                .ok_or_else(|| invalid_config(format!("rules[{i}] missing required field: action")))?;
            if get_f64(map, "value").is_none() {
                return Err(invalid_config(format!("rules[{i}] missing required field: value")));
            }
            if RuleAction::parse(action).is_none() {
                return Err(invalid_config(format!("rules[{i}] has invalid action: {action}")));
            }
        }
        Ok(())
    }

    fn calculate(&self, req: &PricingRequest, config: &Fields) -> Result<PricingResponse, PricingError> {
        let base_price = required_amount(&req.inputs, "base_price")?;

        let rules: Vec<ConditionalRule> = get_array(config, "rules")
            .map(|rs| rs.iter().filter_map(ConditionalRule::from_value).collect())
            .unwrap_or_default();

        let mut current = base_price;
        let mut adjustments = Vec::new();
        let mut applied = Vec::new();

        for rule in &rules {
            if !Condition::parse(&rule.condition).matches(&req.inputs) {
                continue;
            }
            let before = current;
            current = rule.action.apply(current, rule.value);

            adjustments.push(PriceAdjustment::new(
                rule.action.as_str(),
                format!("Rule: {}", rule.condition),
                rule.value,
                current - before,
            ));
            applied.push(json!({
                "condition": rule.condition,
                "action": rule.action.as_str(),
                "value": rule.value,
                "priority": rule.priority,
                "result": round_to_two_decimals(current),
            }));
        }

        let (min_price, max_price) = config_bounds(config);
        let final_price = apply_bounds(current, min_price, max_price);

        let details = json!({
            "base_price": base_price,
            "rules_evaluated": rules.len(),
            "rules_applied": applied,
            "final_price": round_to_two_decimals(final_price),
        });

        Ok(PricingResponse::new(
            StrategyKind::RuleBased,
            final_price,
            base_price,
            request_currency(req, config),
            PriceBreakdown {
                base_price,
                adjustments,
                details: into_fields(details),
            },
        ))
    }
}
