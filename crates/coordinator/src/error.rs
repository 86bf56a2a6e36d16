use thiserror::Error;

/// Failures surfaced by the ledger unit outside of actor handlers
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("journal: {0}")]
    Journal(#[from] ledger_journal::JournalError),
}
