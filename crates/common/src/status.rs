//! Transaction status as persisted in the journal state file
//!
//! The on-disk status moves monotonically through
//! `dirty -> new -> {accepted | rejected} -> {committed | rollbacked}`;
//! it never regresses.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Single-valued status of a journaled transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Write in progress, the body may be incomplete
    Dirty,
    /// Body persisted, negotiation not yet begun or in progress
    New,
    /// Promise phase succeeded for all participants
    Accepted,
    /// Promise phase failed, no booking occurred
    Rejected,
    /// Final state, bookings are authoritative
    Committed,
    /// Commit phase failed at one or more participants, all were rolled back
    Rollbacked,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Dirty => "dirty",
            Status::New => "new",
            Status::Accepted => "accepted",
            Status::Rejected => "rejected",
            Status::Committed => "committed",
            Status::Rollbacked => "rollbacked",
        }
    }

    /// No further on-disk transition happens from a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Committed | Status::Rollbacked)
    }

    /// Position in the monotonic status order
    pub fn rank(&self) -> u8 {
        match self {
            Status::Dirty => 0,
            Status::New => 1,
            Status::Accepted | Status::Rejected => 2,
            Status::Committed | Status::Rollbacked => 3,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dirty" => Ok(Status::Dirty),
            "new" => Ok(Status::New),
            "accepted" => Ok(Status::Accepted),
            "rejected" => Ok(Status::Rejected),
            "committed" => Ok(Status::Committed),
            "rollbacked" => Ok(Status::Rollbacked),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Status token not part of the state file grammar
#[derive(Debug, Error)]
#[error("unknown transaction status: {0}")]
pub struct UnknownStatus(pub String);
