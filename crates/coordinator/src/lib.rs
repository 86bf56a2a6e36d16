//! The ledger unit: per-transaction coordination
//!
//! One coordinator actor per `(tenant, transaction id)` drives the
//! two-phase negotiation with every participating account: persist the
//! body, promise with all accounts, then commit or roll back, finalize the
//! journal state and answer the requester. Forward requests for committed
//! transactions are recorded by the same actor. A periodic integrity scan
//! resumes whatever a crash or timeout left unfinished.

mod actor;
mod config;
mod error;
mod integrity;
mod state;

pub use actor::{CoordinatorFactory, CoordinatorSettings};
pub use config::{ConfigError, Configuration};
pub use error::Error;
pub use integrity::IntegrityScanner;
pub use state::TransactionState;
