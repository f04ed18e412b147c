//! Service settings.
//!
//! Settings are layered with the `config` crate: built-in defaults, then
//! an optional `pricing.toml` in the working directory, then
//! `PRICING__SECTION__KEY` environment variables
//! (e.g. `PRICING__SERVER__PORT=9090`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub audit: AuditSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// `"text"` or `"json"`.
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditSettings {
    /// Maximum number of calculation log entries kept in memory.
    pub capacity: usize,
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_builder(
            default_builder()?
                .add_source(config::File::with_name("pricing").required(false))
                .add_source(config::Environment::with_prefix("PRICING").separator("__")),
        )
    }

    fn from_builder(builder: config::ConfigBuilder<config::builder::DefaultState>) -> anyhow::Result<Self> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.server.host.trim().is_empty() {
            anyhow::bail!("server.host cannot be empty");
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging.format must be \"text\" or \"json\", got {:?}", self.logging.format);
        }
        if self.audit.capacity == 0 {
            anyhow::bail!("audit.capacity must be at least 1");
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".into(),
                port: 8080,
            },
            logging: LoggingSettings {
                level: "info".into(),
                format: "text".into(),
            },
            audit: AuditSettings { capacity: 10_000 },
        }
    }
}

fn default_builder() -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
    let defaults = Settings::default();
    Ok(config::Config::builder()
        .set_default("server.host", defaults.server.host)?
        .set_default("server.port", i64::from(defaults.server.port))?
        .set_default("logging.level", defaults.logging.level)?
        .set_default("logging.format", defaults.logging.format)?
        .set_default("audit.capacity", defaults.audit.capacity as i64)?)
}
