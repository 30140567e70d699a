//! `taskboard-hub`: in-memory REST API plus realtime project rooms.
//!
//! ```bash
//! taskboard-hub --bind 127.0.0.1:8080 --seed-demo
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use taskboard_hub::config::{HubCliArgs, HubConfig};
use taskboard_hub::hub::{self, HubState};
use taskboard_hub::store::BoardStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match HubConfig::load(&HubCliArgs::parse()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let store = BoardStore::new();
    if config.seed_demo {
        match store.seed_demo().await {
            Ok(project) => tracing::info!(project_id = %project.id, "demo project seeded"),
            Err(e) => tracing::warn!(error = %e, "demo seeding failed"),
        }
    }
    let state = Arc::new(HubState::with_config(config.max_message_size, store));

    let (addr, server) = match hub::start_server_with_state(&config.bind_addr, state).await {
        Ok(started) => started,
        Err(e) => {
            tracing::error!(addr = %config.bind_addr, error = %e, "bind failed");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(%addr, max_message_size = config.max_message_size, "hub listening");

    match server.await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "hub server task failed");
            ExitCode::FAILURE
        }
    }
}
