//! Binary entrypoint: loads a validated [`ember::EngineConfig`] from a
//! JSON file, wires a [`FeedManager`] (replaying a historical tick file
//! when one is given — no vendor venue adapter is in scope, per
//! `spec.md` §1's non-goals) and a [`PaperExecutionAdapter`], and runs
//! the engine until `Ctrl-C`.

use ember::engine::Engine;
use ember::EngineConfig;
use ember_core::{MarketTick, SystemClock};
use ember_execution::PaperExecutionAdapter;
use ember_feed::{FeedManager, HistoricalFeedAdapter, ReconnectPolicy};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json())
        .init();
}

fn load_config(path: &str) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let config: EngineConfig = serde_json::from_str(&raw)?;
    config.validate()?;
    Ok(config)
}

fn load_ticks(path: &str) -> Result<Vec<MarketTick>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    let ticks: Vec<MarketTick> = serde_json::from_str(&raw)?;
    Ok(ticks)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let mut args = env::args().skip(1);
    let Some(config_path) = args.next() else {
        error!("usage: ember <config.json> [ticks.json]");
        return ExitCode::FAILURE;
    };
    let ticks_path = args.next();

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(error) => {
            error!(%error, config_path, "failed to load engine configuration");
            return ExitCode::FAILURE;
        }
    };

    let feeds = FeedManager::new();
    if let Some(ticks_path) = ticks_path {
        match load_ticks(&ticks_path) {
            Ok(ticks) => {
                feeds.register(Arc::new(HistoricalFeedAdapter::new("hist", ticks)), ReconnectPolicy::new(500, 10_000, 100, Some(5)));
            }
            Err(error) => {
                error!(%error, ticks_path, "failed to load historical tick file");
                return ExitCode::FAILURE;
            }
        }
    } else {
        info!("no tick file given, engine will idle until a feed is registered");
    }

    let fee_bps = config.execution.fee_bps;
    let execution = PaperExecutionAdapter::new("paper", fee_bps, Arc::new(SystemClock));
    let worker_shutdown_timeout_ms = config.worker_shutdown_timeout_ms;

    let mut engine = match Engine::new(config, feeds, execution) {
        Ok(engine) => engine,
        Err(error) => {
            error!(%error, "failed to wire engine");
            return ExitCode::FAILURE;
        }
    };

    let running = engine.running_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
            running.store(false, std::sync::atomic::Ordering::Release);
        }
    });

    if let Err(error) = engine.run().await {
        error!(%error, "engine run loop exited with an error");
        engine.shutdown(worker_shutdown_timeout_ms).await;
        return ExitCode::FAILURE;
    }

    engine.shutdown(worker_shutdown_timeout_ms).await;
    ExitCode::SUCCESS
}
