use crate::application::alert_sink::DedupPolicy;
use crate::domain::threshold::LevelBounds;
use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub backend: BackendSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendSettings {
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MonitorConfig {
    #[serde(default)]
    pub alerts: AlertSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlertSettings {
    /// Default number of alerts returned by the history view
    pub page_size: usize,
    pub reading_history_limit: usize,
    pub poll_interval_ms: u64,
    pub level_bounds: LevelBounds,
    pub dedup: DedupSettings,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            page_size: 50,
            reading_history_limit: 1000,
            poll_interval_ms: 2000,
            level_bounds: LevelBounds::default(),
            dedup: DedupSettings::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DedupMode {
    #[default]
    None,
    Cooldown,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DedupSettings {
    pub mode: DedupMode,
    pub cooldown_secs: u64,
}

impl DedupSettings {
    pub fn policy(&self) -> anyhow::Result<DedupPolicy> {
        match self.mode {
            DedupMode::None => Ok(DedupPolicy::None),
            DedupMode::Cooldown => i64::try_from(self.cooldown_secs)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .map(DedupPolicy::Cooldown)
                .ok_or_else(|| {
                    anyhow::anyhow!("alerts.dedup.cooldown_secs {} is out of range", self.cooldown_secs)
                }),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub listen_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Environment overrides, e.g. `TINA_BACKEND__API_KEY`
fn environment() -> config::Environment {
    config::Environment::with_prefix("TINA")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn deserialize<T: DeserializeOwned>(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<T> {
    Ok(builder.build()?.try_deserialize()?)
}

pub fn load_backend_config() -> anyhow::Result<BackendConfig> {
    deserialize(
        config::Config::builder()
            .add_source(config::File::with_name("config/backend"))
            .add_source(environment()),
    )
}

pub fn load_monitor_config() -> anyhow::Result<MonitorConfig> {
    deserialize(
        config::Config::builder()
            .add_source(config::File::with_name("config/alerts").required(false))
            .add_source(environment()),
    )
}
