//! Transaction integrity scan
//!
//! A periodic pass over the journal that picks up whatever a crash,
//! restart or phase timeout left unfinished. Terminal entries are
//! skipped, incomplete `dirty` writes are discarded, and everything
//! in between is re-injected into its coordinator, which re-drives the
//! phase implied by the on-disk state.

use ledger_common::Status;
use ledger_journal::Journal;
use ledger_lake::{Coordinates, Envelope, Lake};
use ledger_protocol::CoordinatorMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct IntegrityScanner {
    tenant: String,
    journal: Arc<Journal>,
    lake: Arc<Lake>,
    interval: Duration,
}

impl IntegrityScanner {
    pub fn new(
        tenant: impl Into<String>,
        journal: Arc<Journal>,
        lake: Arc<Lake>,
        interval: Duration,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            journal,
            lake,
            interval,
        }
    }

    /// Run the scan on its interval; the first pass fires immediately so
    /// a restarted process recovers before taking new traffic
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.scan_once();
            }
        })
    }

    /// One pass over the journal
    pub fn scan_once(&self) {
        let entries = match self.journal.scan_transactions() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("[{}] integrity scan failed: {}", self.tenant, e);
                return;
            }
        };

        for (id, status) in entries {
            match status {
                Status::Dirty => {
                    // incomplete write, the body never reached the journal
                    match self.journal.discard_transaction(&id) {
                        Ok(()) => {
                            tracing::info!("[{}] discarded dirty transaction {}", self.tenant, id)
                        }
                        Err(e) => {
                            tracing::warn!("[{}] cannot discard {}: {}", self.tenant, id, e)
                        }
                    }
                }
                Status::New | Status::Accepted => {
                    tracing::info!(
                        "[{}] resuming {} transaction {}",
                        self.tenant,
                        status,
                        id
                    );
                    self.lake.send(Envelope::new(
                        Coordinates::new(self.tenant.clone(), "transaction-integrity"),
                        Coordinates::new(self.tenant.clone(), id.as_str()),
                        CoordinatorMessage::ResumeTransaction.into_message(),
                    ));
                }
                Status::Rejected | Status::Committed | Status::Rollbacked => {}
            }
        }
    }
}
