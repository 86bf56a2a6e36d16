//! Typed message wrappers for ledger actor communication
//!
//! Messages are split by direction:
//! - `CoordinatorMessage`: everything addressed to a transaction
//!   coordinator (submissions, negotiation replies, timeouts, resumes,
//!   forward requests)
//! - `AccountMessage`: phase envelopes sent to account actors
//! - `ClientReply`: terminal replies back to the originating requester
//!
//! Each wrapper parses from and renders into the wire `Message`: the
//! `kind` header selects the variant, the body carries a JSON payload.

mod error;
mod messages;
mod replies;

pub use error::ParseError;
pub use messages::{AccountMessage, CoordinatorMessage, NegotiationReply, REASON_INTERNAL};
pub use replies::ClientReply;
