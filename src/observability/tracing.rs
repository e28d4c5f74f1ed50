use tracing::Span;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use crate::types::ids::{AssetId, MarketId};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::ConfigError(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    installed.map_err(|e| Error::ConfigError(e.to_string()))
}

pub fn settlement_span(kind: &'static str, market_id: &MarketId, asset: &AssetId) -> Span {
    tracing::info_span!(
        "settlement",
        kind,
        market_id = %market_id,
        asset = %asset,
    )
}

pub fn margin_span(market_id: &MarketId) -> Span {
    tracing::info_span!(
        "margin_updates",
        market_id = %market_id,
    )
}

pub fn checkpoint_span(operation: &'static str) -> Span {
    tracing::info_span!(
        "checkpoint",
        operation,
    )
}
