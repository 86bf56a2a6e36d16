//! Host binary of the ledger unit
//!
//! Wires configuration, journal, lake and the coordinator region
//! together, starts the integrity scan and runs until interrupted.

use ledger_coordinator::{Configuration, CoordinatorFactory, Error, IntegrityScanner};
use ledger_journal::Journal;
use ledger_lake::Lake;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("ledger-unit failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Error> {
    let configuration = Configuration::from_env()?;

    let filter = EnvFilter::try_new(configuration.log_level.to_lowercase())
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(
        "starting ledger-unit, tenant {}, lake {}",
        configuration.tenant,
        configuration.lake_hostname
    );

    let journal = Arc::new(Journal::new(
        &configuration.root_storage,
        &configuration.tenant,
    )?);

    let lake = Lake::new();
    lake.host_region(
        configuration.tenant.clone(),
        Arc::new(CoordinatorFactory::new(Arc::clone(&journal))),
    );

    let scanner = IntegrityScanner::new(
        configuration.tenant.clone(),
        journal,
        Arc::clone(&lake),
        configuration.transaction_integrity_scan_interval,
    );
    let scan = scanner.spawn();

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("interrupt handler failed: {}", e);
    }
    tracing::info!("stopping ledger-unit, tenant {}", configuration.tenant);
    scan.abort();
    Ok(())
}
