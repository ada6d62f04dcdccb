use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

/// Settings shared by every identity admin deployment.
///
/// Read from an optional `configuration` file and `IDENTITY__*` environment
/// variables (`IDENTITY__PROJECT_ID`, `IDENTITY__LOG_LEVEL`).
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("IDENTITY").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load from an explicit file, ignoring the environment.
    pub fn from_file(path: &str) -> Result<Self, AppError> {
        let config = Cfg::builder()
            .add_source(File::with_name(path).required(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
