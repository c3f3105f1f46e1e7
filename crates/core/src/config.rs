use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `BULK_RELAY__`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Directory holding the built web UI. Served with SPA fallback when set.
    #[serde(default)]
    pub static_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Rate applied when a send request omits `messagesPerMinute`.
    #[serde(default = "default_rate_per_minute")]
    pub default_rate_per_minute: u32,
    /// Country code applied when a send request omits `countryCode`.
    #[serde(default)]
    pub default_country_code: Option<String>,
    /// Upper bound on normalized recipients per broadcast. Unbounded when unset.
    #[serde(default)]
    pub max_recipients: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    #[default]
    Simulated,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub client: ClientKind,
    /// Simulated client: link the session on its own after this many ms.
    #[serde(default)]
    pub auto_link_after_ms: Option<u64>,
    /// Simulated client: reject recipients whose id starts with this prefix.
    #[serde(default)]
    pub fail_numbers_with_prefix: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    4000
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_rate_per_minute() -> u32 {
    20
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            static_dir: None,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_rate_per_minute: default_rate_per_minute(),
            default_country_code: None,
            max_recipients: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("BULK_RELAY")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
