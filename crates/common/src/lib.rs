//! Common types for the ledger
//!
//! This crate defines:
//! - Transaction and transfer identifiers (opaque strings, unique per tenant)
//! - Account references and transfer sides
//! - The transaction model with its deterministic journal codec
//! - Transaction status as persisted in the journal state file

mod account;
mod ids;
mod status;
mod transaction;

pub use account::Account;
pub use ids::{TransactionId, TransferId};
pub use status::{Status, UnknownStatus};
pub use transaction::{
    CodecError, Side, Transaction, Transfer, ValidationError, PHASE_COMMIT, PHASE_PROMISE,
    PHASE_ROLLBACK,
};
