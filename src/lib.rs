pub mod aggregate;
pub mod audio;
pub mod cli;
pub mod clock;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod reminder;
pub mod settings;
pub mod store;
pub mod tracker;
pub mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tokio::sync::mpsc;

use cli::Cli;
use db::Database;
use settings::SettingsStore;
use tracker::{ChannelEventSink, TrackerController, TrackerDeps};

pub use error::TrackerError;

const ENABLE_LOGS: bool = true;

fn resolve_data_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    match flag {
        Some(dir) => Ok(dir),
        None => dirs::data_dir()
            .map(|dir| dir.join("punchcard"))
            .ok_or_else(|| anyhow!("no data directory for this platform; pass --data-dir")),
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    utils::logging::init(utils::logging::default_level());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(start(cli))
}

async fn start(cli: Cli) -> Result<()> {
    let data_dir = resolve_data_dir(cli.data_dir)?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;

    let database = Database::new(data_dir.join("punchcard.sqlite3"))?;
    let settings = SettingsStore::new(data_dir.join("settings.json"))?;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let deps = TrackerDeps::new(Arc::new(database))
        .with_events(Arc::new(ChannelEventSink::new(event_tx)))
        .with_alert(audio::default_alert());
    let controller = TrackerController::new(cli.owner, deps, settings.current());

    // An open session left by an earlier run is picked up, not discarded.
    let snapshot = controller.attach().await?;
    if let Some(session) = &snapshot.session {
        crate::log_info!(
            "re-attached {} session {} from {}",
            session.status,
            session.id,
            session.check_in_time
        );
    }

    let result = cli::execute(&controller, &settings, cli.command, event_rx).await;
    controller.shutdown().await;
    result
}
