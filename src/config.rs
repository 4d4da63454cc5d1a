use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub collectors: CollectorsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Directory served under /ui
    #[serde(default = "default_ui_dir")]
    pub ui_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            ui_dir: default_ui_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// JSON file the merged snapshot is persisted to and seeded from
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_seconds: u64,

    /// Run a refresh as soon as the server starts
    #[serde(default = "default_true")]
    pub refresh_on_startup: bool,

    /// Run collectors concurrently instead of one after another
    #[serde(default = "default_true")]
    pub concurrent_collectors: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            refresh_interval_seconds: default_refresh_interval(),
            refresh_on_startup: true,
            concurrent_collectors: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectorsConfig {
    /// Per-collector request timeout; one attempt, no retries
    #[serde(default = "default_collector_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub openai: SourceConfig,
    #[serde(default)]
    pub fal: SourceConfig,
    #[serde(default)]
    pub runway: RunwayConfig,
    #[serde(default)]
    pub hedra: SourceConfig,
    #[serde(default)]
    pub elevenlabs: SourceConfig,
    #[serde(default)]
    pub gemini: SourceConfig,
}

impl Default for CollectorsConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_collector_timeout(),
            user_agent: default_user_agent(),
            openai: SourceConfig::default(),
            fal: SourceConfig::default(),
            runway: RunwayConfig::default(),
            hedra: SourceConfig::default(),
            elevenlabs: SourceConfig::default(),
            gemini: SourceConfig::default(),
        }
    }
}

/// A scraped provider page
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Overrides the provider's public pricing URL
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunwayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
    /// Falls back to the RUNWAY_API_KEY environment variable
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_runway_api_version")]
    pub api_version: String,
}

impl Default for RunwayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            api_key: None,
            api_version: default_runway_api_version(),
        }
    }
}

impl RunwayConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("RUNWAY_API_KEY").ok().filter(|k| !k.is_empty()))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_endpoint")]
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_metrics_endpoint(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_ui_dir() -> PathBuf {
    PathBuf::from("ui")
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data/model_pricing.json")
}

fn default_refresh_interval() -> u64 {
    6 * 60 * 60
}

fn default_collector_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_runway_api_version() -> String {
    "2024-11-06".to_string()
}

fn default_metrics_endpoint() -> String {
    "/metrics".to_string()
}

fn default_true() -> bool {
    true
}

/// Load configuration from defaults, an optional TOML file and the environment
///
/// Environment variables use the `PRICING_SERVICE` prefix and `__` as the
/// nesting separator, e.g. `PRICING_SERVICE__SERVER__PORT=9000`.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix("PRICING_SERVICE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.server.port == 0 {
        anyhow::bail!("Server port must be non-zero");
    }

    if !matches!(cfg.server.log_format.as_str(), "text" | "json") {
        anyhow::bail!(
            "Invalid log_format '{}': expected 'text' or 'json'",
            cfg.server.log_format
        );
    }

    if cfg.cache.refresh_interval_seconds < 60 {
        anyhow::bail!(
            "refresh_interval_seconds must be at least 60 (got {})",
            cfg.cache.refresh_interval_seconds
        );
    }

    if !(1..=300).contains(&cfg.collectors.timeout_seconds) {
        anyhow::bail!(
            "Collector timeout_seconds must be between 1 and 300 (got {})",
            cfg.collectors.timeout_seconds
        );
    }

    let sources = [
        ("openai", cfg.collectors.openai.enabled, &cfg.collectors.openai.url),
        ("fal", cfg.collectors.fal.enabled, &cfg.collectors.fal.url),
        ("runway", cfg.collectors.runway.enabled, &cfg.collectors.runway.url),
        ("hedra", cfg.collectors.hedra.enabled, &cfg.collectors.hedra.url),
        ("elevenlabs", cfg.collectors.elevenlabs.enabled, &cfg.collectors.elevenlabs.url),
        ("gemini", cfg.collectors.gemini.enabled, &cfg.collectors.gemini.url),
    ];
    for (name, enabled, url) in sources {
        if let (true, Some(url)) = (enabled, url) {
            validate_url(name, url)?;
        }
    }

    if cfg.metrics.enabled && !cfg.metrics.endpoint.starts_with('/') {
        anyhow::bail!(
            "Metrics endpoint must start with '/' (got '{}')",
            cfg.metrics.endpoint
        );
    }

    Ok(())
}

fn validate_url(collector: &str, raw: &str) -> anyhow::Result<()> {
    let parsed = url::Url::parse(raw).map_err(|e| {
        anyhow::anyhow!("Collector '{}' has invalid url '{}': {}", collector, raw, e)
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!(
            "Collector '{}' url must be http or https (got '{}')",
            collector,
            raw
        );
    }

    Ok(())
}
