use serde::{Deserialize, Serialize};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub json_output: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json_output: false,
        }
    }
}

impl TelemetryConfig {
    pub fn new(level: impl Into<String>, json_output: bool) -> Self {
        Self {
            level: level.into(),
            json_output,
        }
    }

    /// `RUST_LOG` wins over the configured level.
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Install the global subscriber. Panics if one is already set.
pub fn init_subscriber(config: &TelemetryConfig) {
    if config.json_output {
        tracing_subscriber::registry()
            .with(config.filter())
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(config.filter())
            .with(fmt::layer())
            .init();
    }
}

/// Like [`init_subscriber`] but reports an already-installed subscriber as an error.
pub fn try_init_subscriber(config: &TelemetryConfig) -> Result<(), TryInitError> {
    if config.json_output {
        tracing_subscriber::registry()
            .with(config.filter())
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(config.filter())
            .with(fmt::layer())
            .try_init()
    }
}
