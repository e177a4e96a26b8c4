//! Configuration for the billing engine.

use chrono::FixedOffset;
use serde::Deserialize;
use service_core::config::Config as CoreConfig;
use service_core::error::AppError;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Scheduler knobs. Batch size and the billing timezone are explicit
/// configuration, never shared statics.
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Fixed delay between scheduler ticks, in seconds.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Page size for the batch scans.
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    /// UTC offset, in hours, of the timezone billing days are computed in.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            batch_size: default_batch_size(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BillingConfig {
    #[serde(default = "default_common")]
    pub common: CoreConfig,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

fn default_common() -> CoreConfig {
    CoreConfig { port: 8080 }
}

fn default_service_name() -> String {
    "billing-engine".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_tick_interval_secs() -> u64 {
    60
}

fn default_batch_size() -> i64 {
    50
}

fn default_utc_offset_hours() -> i32 {
    -3
}

impl BillingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// The fixed timezone billing days are computed in.
    pub fn billing_zone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.scheduler.utc_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"))
    }
}
