//! Error types for the pricing engine and its HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Errors produced while validating configuration or calculating a
/// price.  Calculation is deterministic, so none of these are retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PricingError {
    /// The requested strategy name is not one of the known strategies.
    #[error("invalid pricing strategy: {0}")]
    InvalidStrategy(String),
    /// A required input or configuration key is absent.
    #[error("missing required field: {0}")]
    MissingRequiredField(String),
    /// A value is present but semantically invalid.
    #[error("invalid field value: {0}")]
    InvalidFieldValue(String),
    /// The rule configuration failed strategy-specific shape checks.
    #[error("strategy configuration is invalid: {0}")]
    ConfigurationInvalid(String),
    /// The final price came out negative, or not finite after an
    /// arithmetic overflow.  Indicates a bad rule set or an engine bug
    /// rather than bad caller input.
    #[error("price must be finite and non-negative: {0}")]
    NegativePrice(f64),
}

impl PricingError {
    /// `true` for errors caused by the caller's request or rule
    /// configuration (400-class), `false` for engine invariant breaches.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::NegativePrice(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::InvalidStrategy(_) => "invalid_strategy",
            Self::MissingRequiredField(_) => "missing_required_field",
            Self::InvalidFieldValue(_) => "invalid_field_value",
            Self::ConfigurationInvalid(_) => "configuration_invalid",
            Self::NegativePrice(_) => "negative_price",
        }
    }
}

/// Application errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Pricing(#[from] PricingError),
    #[error("pricing rule not found: {0}")]
    RuleNotFound(Uuid),
    #[error("pricing rule is inactive: {0}")]
    RuleInactive(Uuid),
    #[error("rule {rule_id} uses strategy {rule_strategy}, request asked for {requested}")]
    StrategyMismatch {
        rule_id: Uuid,
        rule_strategy: String,
        requested: String,
    },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Pricing(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Pricing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RuleNotFound(_) => StatusCode::NOT_FOUND,
            Self::RuleInactive(_) | Self::StrategyMismatch { .. } | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Pricing(err) => err.type_name(),
            Self::RuleNotFound(_) => "rule_not_found",
            Self::RuleInactive(_) => "rule_inactive",
            Self::StrategyMismatch { .. } => "strategy_mismatch",
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "pricing request failed");
        }
        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": self.type_name(),
            }
        }));
        (status, body).into_response()
    }
}
