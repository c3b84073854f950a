//! cfx-testkit
//!
//! Shared plumbing for the scenario tests under `tests/`: bundle fixtures,
//! store helpers and a config-driven import runner that feeds the journal
//! the same way a deployment would.

pub mod fixtures;

use anyhow::{Context, Result};
use cfx_config::{EngineConfig, LoadedConfig};
use cfx_journal::JournalWriter;
use cfx_model::ConfigurationAreaProperties;
use cfx_reconcile::{ImportReport, Importer};
use cfx_store::ObjectStore;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Installs a fmt subscriber honouring `RUST_LOG`; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_test_writer()
        .try_init();
}

/// Appends every event of `report` to `writer` under `run_id`.
pub fn journal_report(writer: &mut JournalWriter, run_id: Uuid, report: &ImportReport) -> Result<usize> {
    let events = report.journal_events();
    for ev in &events {
        writer
            .append(run_id, &ev.event_type, ev.payload.clone())
            .with_context(|| format!("journal {} failed", ev.event_type))?;
    }
    Ok(events.len())
}

/// Outcome of [`import_with_config`].
pub struct ConfiguredRun {
    pub run_id: Uuid,
    pub report: ImportReport,
    /// Events written, `0` when the config names no journal.
    pub journaled: usize,
}

/// Import `areas` with the options of `loaded`, journaling the report when
/// the config names a journal path.
pub fn import_with_config(
    store: &mut dyn ObjectStore,
    loaded: &LoadedConfig,
    areas: &[ConfigurationAreaProperties],
) -> Result<ConfiguredRun> {
    let cfg = EngineConfig::from_config_json(&loaded.config_json)?;
    let report = Importer::new(store, cfg.import_options()).run(areas)?;

    let run_id = Uuid::new_v4();
    let journaled = match &cfg.journal.path {
        Some(path) => {
            let mut writer = JournalWriter::open(path, cfg.journal.hash_chain)?;
            journal_report(&mut writer, run_id, &report)?
        }
        None => 0,
    };
    info!(%run_id, config_hash = %loaded.config_hash, journaled, "configured import finished");
    Ok(ConfiguredRun {
        run_id,
        report,
        journaled,
    })
}
