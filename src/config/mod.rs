use serde::{Deserialize, Serialize};

pub mod loader;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub logging: LoggingConfig,
    pub checkpoint: CheckpointConfig,
    /// Re-check per-asset conservation after every batch.
    pub verify_conservation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            logging: LoggingConfig::default(),
            checkpoint: CheckpointConfig::default(),
            verify_conservation: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CheckpointConfig {
    pub directory: String,
    pub max_checkpoints: usize,
    /// Restore this height instead of the latest one.
    pub restore_height: Option<u64>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        CheckpointConfig {
            directory: "./checkpoints".to_string(),
            max_checkpoints: 100,
            restore_height: None,
        }
    }
}
