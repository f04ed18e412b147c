//! Entry point for the Pricing Engine binary.
//!
//! Running this binary starts an HTTP server exposing the pricing API.
//! Settings come from built-in defaults, an optional `pricing.toml` in
//! the working directory and `PRICING__*` environment variables
//! (e.g. `PRICING__SERVER__PORT=9090`).

use anyhow::Context;
use pricing_engine::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    pricing_engine::init_tracing(&settings.logging);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %settings.bind_addr(),
        "starting pricing engine"
    );
    pricing_engine::api::serve(&settings).await
}
