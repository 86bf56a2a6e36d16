//! Durable transaction journal on local storage
//!
//! Two layers: `Storage` is the byte-oriented primitive with atomic
//! single-file installs and append, `Journal` the per-tenant transaction
//! record built on it. Every transaction owns three files (body, state
//! line, forward log) under `<root>/t_<tenant>/transaction/`.

mod error;
mod journal;
mod storage;

pub use error::JournalError;
pub use journal::Journal;
pub use storage::Storage;
