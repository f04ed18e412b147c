//! Pricing Engine library crate.
//!
//! This crate exposes the strategy-based price calculation engine and
//! its HTTP API as reusable modules.  External applications may depend
//! on the `pricing_engine` crate and call [`engine::PricingEngine`]
//! directly or embed the API via [`api::build_router`].

pub mod api;
pub mod audit;
pub mod context;
pub mod engine;
pub mod error;
pub mod models;
pub mod rounding;
pub mod rules;
pub mod settings;
pub mod strategy;

pub use engine::PricingEngine;
pub use error::{ApiError, PricingError};
pub use models::{PriceAdjustment, PriceBreakdown, PricingRequest, PricingResponse, StrategyKind};

use settings::LoggingSettings;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging.
///
/// `RUST_LOG` overrides the configured level.  Can only be called once.
pub fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}
