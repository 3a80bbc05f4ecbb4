use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;

/// Full pipeline configuration, read from a TOML file. Every field has a
/// default so a partial (or absent) file still yields a runnable setup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub crypto: CryptoConfig,
    #[serde(default)]
    pub equities: EquitiesConfig,
    #[serde(default)]
    pub prediction_log: PredictionLogConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl PipelineConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .build()?;
        cfg.try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CryptoConfig {
    #[serde(default = "default_crypto_file")]
    pub data_file: String,
    #[serde(default = "default_min_volume")]
    pub min_trading_volume: f64,
    #[serde(default = "default_min_market_cap")]
    pub min_market_cap: f64,
    #[serde(default = "default_n_clusters")]
    pub n_clusters: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_group_cap")]
    pub group_cap: usize,
    #[serde(default = "default_crypto_export")]
    pub export_file: String,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            data_file: default_crypto_file(),
            min_trading_volume: default_min_volume(),
            min_market_cap: default_min_market_cap(),
            n_clusters: default_n_clusters(),
            seed: default_seed(),
            group_cap: default_group_cap(),
            export_file: default_crypto_export(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexFile {
    pub name: String,
    pub file: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EquitiesConfig {
    #[serde(default = "default_indices")]
    pub indices: Vec<IndexFile>,
    #[serde(default = "default_k_min")]
    pub k_min: usize,
    #[serde(default = "default_k_max")]
    pub k_max: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_group_cap")]
    pub group_cap: usize,
}

impl Default for EquitiesConfig {
    fn default() -> Self {
        Self {
            indices: default_indices(),
            k_min: default_k_min(),
            k_max: default_k_max(),
            seed: default_seed(),
            group_cap: default_group_cap(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionLogConfig {
    #[serde(default = "default_log_file")]
    pub file: String,
    #[serde(default = "default_evaluation_days")]
    pub evaluation_days: i64,
}

impl Default for PredictionLogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            evaluation_days: default_evaluation_days(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_retry_delay")]
    pub delay_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_seconds: default_retry_delay(),
        }
    }
}

fn default_crypto_file() -> String {
    "memecoin.xlsx".to_string()
}

fn default_min_volume() -> f64 {
    50_000.0
}

fn default_min_market_cap() -> f64 {
    1_000_000.0
}

fn default_n_clusters() -> usize {
    3
}

fn default_seed() -> u64 {
    42
}

fn default_group_cap() -> usize {
    20
}

fn default_crypto_export() -> String {
    "final_clustered_coins.csv".to_string()
}

fn default_indices() -> Vec<IndexFile> {
    [
        ("Nifty50", "Nifty50_data.xlsx"),
        ("Nifty Next 50", "Nifty_Next_50.xlsx"),
        ("Sensex", "Sensex_data.xlsx"),
        ("Nifty Midcap 100", "Nifty_Midcap_100.xlsx"),
    ]
    .into_iter()
    .map(|(name, file)| IndexFile {
        name: name.to_string(),
        file: file.to_string(),
    })
    .collect()
}

fn default_k_min() -> usize {
    2
}

fn default_k_max() -> usize {
    10
}

fn default_log_file() -> String {
    "predictions_log.csv".to_string()
}

fn default_evaluation_days() -> i64 {
    3
}

fn default_max_retries() -> usize {
    5
}

fn default_retry_delay() -> u64 {
    60
}
