use anyhow::Context;
use std::sync::Arc;
use collateral_engine::config::loader::AppConfig;
use collateral_engine::core::CollateralEngine;
use collateral_engine::error::Error;
use collateral_engine::event_log::checkpoint_store::CheckpointStore;
use collateral_engine::event_log::producer::TracingEventSink;
use collateral_engine::observability::metrics::{register_metrics, REGISTRY};
use collateral_engine::observability::tracing::init_tracing;
use collateral_engine::CHECKPOINT_VERSION;

fn main() -> anyhow::Result<()> {
    let env = std::env::args().nth(1)
        .or_else(|| std::env::var("COLLATERAL_ENV").ok())
        .unwrap_or_else(|| "development".to_string());

    let app = AppConfig::load(&env).context("loading configuration")?;
    init_tracing(&app.engine.logging).context("initialising tracing")?;
    register_metrics(&REGISTRY).context("registering metrics")?;

    tracing::info!(env = %env, "Starting collateral engine");

    let mut engine = CollateralEngine::new(app.engine.clone(), Arc::new(TracingEventSink));
    for asset in &app.assets {
        engine.enable_asset(asset.clone())
            .with_context(|| format!("enabling asset {}", asset))?;
    }

    let store = CheckpointStore::from_config(&app.engine.checkpoint);
    let found = match app.engine.checkpoint.restore_height {
        Some(height) => store.load_at_height(height).map(|blob| (height, blob)),
        None => store.load_latest(),
    };
    match found {
        Ok((height, blob)) => {
            let version = engine.load_checkpoint(&blob)
                .with_context(|| format!("restoring checkpoint at height {}", height))?;
            tracing::info!(height, version, "Restored from checkpoint");
            if version < CHECKPOINT_VERSION {
                let path = engine.save_checkpoint(&store, height)
                    .with_context(|| format!("rewriting checkpoint at height {}", height))?;
                tracing::info!(height, path = %path.display(), "Checkpoint upgraded to current format");
            }
        }
        Err(Error::NoCheckpointFound) => {
            tracing::info!("No checkpoint found, starting fresh");
        }
        Err(e) => return Err(e).context("reading checkpoint store"),
    }

    engine.check_invariants().context("startup invariant check")?;
    tracing::info!(state_hash = %engine.hash(), accounts = engine.store().len(), "Collateral engine ready");
    Ok(())
}
