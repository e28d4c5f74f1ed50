use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::types::ids::AssetId;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    /// Assets enabled at startup, before any checkpoint is restored.
    pub assets: Vec<AssetId>,
}

impl AppConfig {
    /// Layers `config/default`, `config/{env}` and `COLLATERAL_*` variables,
    /// e.g. `COLLATERAL_ENGINE__LOGGING__LEVEL=debug`.
    pub fn load(env: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("COLLATERAL")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("assets")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        config.try_deserialize()
            .map_err(|e| Error::ConfigError(e.to_string()))
    }
}
