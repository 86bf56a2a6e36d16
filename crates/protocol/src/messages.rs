//! Messages addressed to transaction coordinators and account actors

use crate::error::ParseError;
use ledger_common::{
    Account, Side, Transaction, Transfer, TransactionId, TransferId, PHASE_COMMIT, PHASE_PROMISE,
    PHASE_ROLLBACK,
};
use ledger_lake::Message;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Rejection reason used when an account actor supplied none
pub const REASON_INTERNAL: &str = "internal";

const KIND_CREATE_TRANSACTION: &str = "create_transaction";
const KIND_REPLY_TIMEOUT: &str = "reply_timeout";
const KIND_RESUME_TRANSACTION: &str = "resume_transaction";
const KIND_FORWARD_TRANSFER: &str = "forward_transfer";

const KIND_PROMISE_WAS_ACCEPTED: &str = "promise_was_accepted";
const KIND_PROMISE_WAS_REJECTED: &str = "promise_was_rejected";
const KIND_COMMIT_WAS_ACCEPTED: &str = "commit_was_accepted";
const KIND_COMMIT_WAS_REJECTED: &str = "commit_was_rejected";
const KIND_ROLLBACK_WAS_ACCEPTED: &str = "rollback_was_accepted";
const KIND_ROLLBACK_WAS_REJECTED: &str = "rollback_was_rejected";
const KIND_FATAL_ERRORED: &str = "fatal_errored";

/// Reply of an account actor to a phase envelope
///
/// The seven kinds form a closed sum; anything else on the wire is not a
/// negotiation reply and is treated as a no-op by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum NegotiationReply {
    PromiseWasAccepted { account: Account },
    PromiseWasRejected { account: Account, reason: String },
    CommitWasAccepted { account: Account },
    CommitWasRejected { account: Account, reason: String },
    RollbackWasAccepted { account: Account },
    RollbackWasRejected { account: Account, reason: String },
    FatalErrored { account: Account },
}

impl NegotiationReply {
    /// Account the reply speaks for
    pub fn account(&self) -> &Account {
        match self {
            NegotiationReply::PromiseWasAccepted { account }
            | NegotiationReply::PromiseWasRejected { account, .. }
            | NegotiationReply::CommitWasAccepted { account }
            | NegotiationReply::CommitWasRejected { account, .. }
            | NegotiationReply::RollbackWasAccepted { account }
            | NegotiationReply::RollbackWasRejected { account, .. }
            | NegotiationReply::FatalErrored { account } => account,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            NegotiationReply::PromiseWasAccepted { .. } => KIND_PROMISE_WAS_ACCEPTED,
            NegotiationReply::PromiseWasRejected { .. } => KIND_PROMISE_WAS_REJECTED,
            NegotiationReply::CommitWasAccepted { .. } => KIND_COMMIT_WAS_ACCEPTED,
            NegotiationReply::CommitWasRejected { .. } => KIND_COMMIT_WAS_REJECTED,
            NegotiationReply::RollbackWasAccepted { .. } => KIND_ROLLBACK_WAS_ACCEPTED,
            NegotiationReply::RollbackWasRejected { .. } => KIND_ROLLBACK_WAS_REJECTED,
            NegotiationReply::FatalErrored { .. } => KIND_FATAL_ERRORED,
        }
    }

    fn reason(&self) -> Option<&str> {
        match self {
            NegotiationReply::PromiseWasRejected { reason, .. }
            | NegotiationReply::CommitWasRejected { reason, .. }
            | NegotiationReply::RollbackWasRejected { reason, .. } => Some(reason),
            _ => None,
        }
    }

    fn parse(kind: &str, message: &Message) -> Result<Self, ParseError> {
        let body: ReplyBody = decode_body(message)?;
        let account = body.account;
        let reason = body.reason.unwrap_or_else(|| REASON_INTERNAL.to_string());
        match kind {
            KIND_PROMISE_WAS_ACCEPTED => Ok(NegotiationReply::PromiseWasAccepted { account }),
            KIND_PROMISE_WAS_REJECTED => {
                Ok(NegotiationReply::PromiseWasRejected { account, reason })
            }
            KIND_COMMIT_WAS_ACCEPTED => Ok(NegotiationReply::CommitWasAccepted { account }),
            KIND_COMMIT_WAS_REJECTED => Ok(NegotiationReply::CommitWasRejected { account, reason }),
            KIND_ROLLBACK_WAS_ACCEPTED => Ok(NegotiationReply::RollbackWasAccepted { account }),
            KIND_ROLLBACK_WAS_REJECTED => {
                Ok(NegotiationReply::RollbackWasRejected { account, reason })
            }
            KIND_FATAL_ERRORED => Ok(NegotiationReply::FatalErrored { account }),
            other => Err(ParseError::UnknownKind(other.to_string())),
        }
    }
}

/// Everything addressed to a transaction coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorMessage {
    /// Start a new transaction
    CreateTransaction { transaction: Transaction },

    /// Reply of an account actor to the current phase
    Reply(NegotiationReply),

    /// Phase deadline elapsed without all replies. The epoch names the
    /// phase the timer was armed for; a timer outliving its phase is
    /// ignored on delivery.
    ReplyTimeout { epoch: u64 },

    /// Integrity scan asks to re-drive the phase implied by the journal
    ResumeTransaction,

    /// Record a cross-ledger forwarded leg of a committed transaction
    ForwardTransfer {
        id_transfer: TransferId,
        side: Side,
        target_tenant: String,
    },
}

impl CoordinatorMessage {
    /// Parse a wire message into a typed coordinator message
    pub fn from_message(message: &Message) -> Result<Self, ParseError> {
        let kind = message.get_header("kind").ok_or(ParseError::MissingKind)?;
        match kind {
            KIND_CREATE_TRANSACTION => Ok(CoordinatorMessage::CreateTransaction {
                transaction: decode_body(message)?,
            }),
            KIND_REPLY_TIMEOUT => Ok(CoordinatorMessage::ReplyTimeout {
                epoch: message
                    .get_header("epoch")
                    .and_then(|epoch| epoch.parse().ok())
                    .unwrap_or(0),
            }),
            KIND_RESUME_TRANSACTION => Ok(CoordinatorMessage::ResumeTransaction),
            KIND_FORWARD_TRANSFER => {
                let body: ForwardBody = decode_body(message)?;
                Ok(CoordinatorMessage::ForwardTransfer {
                    id_transfer: body.id_transfer,
                    side: body.side,
                    target_tenant: body.target_tenant,
                })
            }
            other => NegotiationReply::parse(other, message).map(CoordinatorMessage::Reply),
        }
    }

    /// Render into a wire message
    pub fn into_message(self) -> Message {
        match self {
            CoordinatorMessage::CreateTransaction { transaction } => {
                Message::with_body(serde_json::to_vec(&transaction).unwrap())
                    .with_header("kind", KIND_CREATE_TRANSACTION)
            }
            CoordinatorMessage::Reply(reply) => {
                let kind = reply.kind();
                let body = ReplyBody {
                    reason: reply.reason().map(String::from),
                    account: match reply {
                        NegotiationReply::PromiseWasAccepted { account }
                        | NegotiationReply::PromiseWasRejected { account, .. }
                        | NegotiationReply::CommitWasAccepted { account }
                        | NegotiationReply::CommitWasRejected { account, .. }
                        | NegotiationReply::RollbackWasAccepted { account }
                        | NegotiationReply::RollbackWasRejected { account, .. }
                        | NegotiationReply::FatalErrored { account } => account,
                    },
                };
                Message::with_body(serde_json::to_vec(&body).unwrap()).with_header("kind", kind)
            }
            CoordinatorMessage::ReplyTimeout { epoch } => Message::with_body(Vec::new())
                .with_header("kind", KIND_REPLY_TIMEOUT)
                .with_header("epoch", epoch.to_string()),
            CoordinatorMessage::ResumeTransaction => {
                Message::with_body(Vec::new()).with_header("kind", KIND_RESUME_TRANSACTION)
            }
            CoordinatorMessage::ForwardTransfer {
                id_transfer,
                side,
                target_tenant,
            } => {
                let body = ForwardBody {
                    id_transfer,
                    side,
                    target_tenant,
                };
                Message::with_body(serde_json::to_vec(&body).unwrap())
                    .with_header("kind", KIND_FORWARD_TRANSFER)
            }
        }
    }
}

/// Phase envelope sent to an account actor, carrying the subset of
/// transfers touching that account
#[derive(Debug, Clone, PartialEq)]
pub enum AccountMessage {
    Promise {
        id_transaction: TransactionId,
        transfers: Vec<Transfer>,
    },
    Commit {
        id_transaction: TransactionId,
        transfers: Vec<Transfer>,
    },
    Rollback {
        id_transaction: TransactionId,
        transfers: Vec<Transfer>,
    },
}

impl AccountMessage {
    /// Build the envelope for the given phase token
    pub fn for_phase(
        phase: &str,
        id_transaction: TransactionId,
        transfers: Vec<Transfer>,
    ) -> Option<Self> {
        match phase {
            PHASE_PROMISE => Some(AccountMessage::Promise {
                id_transaction,
                transfers,
            }),
            PHASE_COMMIT => Some(AccountMessage::Commit {
                id_transaction,
                transfers,
            }),
            PHASE_ROLLBACK => Some(AccountMessage::Rollback {
                id_transaction,
                transfers,
            }),
            _ => None,
        }
    }

    /// Transaction the envelope negotiates
    pub fn id_transaction(&self) -> &TransactionId {
        match self {
            AccountMessage::Promise { id_transaction, .. }
            | AccountMessage::Commit { id_transaction, .. }
            | AccountMessage::Rollback { id_transaction, .. } => id_transaction,
        }
    }

    /// Phase token this envelope negotiates
    pub fn phase(&self) -> &'static str {
        match self {
            AccountMessage::Promise { .. } => PHASE_PROMISE,
            AccountMessage::Commit { .. } => PHASE_COMMIT,
            AccountMessage::Rollback { .. } => PHASE_ROLLBACK,
        }
    }

    /// Parse a wire message into a typed account envelope
    pub fn from_message(message: &Message) -> Result<Self, ParseError> {
        let kind = message.get_header("kind").ok_or(ParseError::MissingKind)?;
        let body: NegotiationRequest = decode_body(message)?;
        AccountMessage::for_phase(kind, body.id_transaction, body.transfers)
            .ok_or_else(|| ParseError::UnknownKind(kind.to_string()))
    }

    /// Render into a wire message
    pub fn into_message(self) -> Message {
        let kind = self.phase();
        let (id_transaction, transfers) = match self {
            AccountMessage::Promise {
                id_transaction,
                transfers,
            }
            | AccountMessage::Commit {
                id_transaction,
                transfers,
            }
            | AccountMessage::Rollback {
                id_transaction,
                transfers,
            } => (id_transaction, transfers),
        };
        let body = NegotiationRequest {
            id_transaction,
            transfers,
        };
        Message::with_body(serde_json::to_vec(&body).unwrap()).with_header("kind", kind)
    }
}

#[derive(Serialize, Deserialize)]
struct ReplyBody {
    account: Account,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct NegotiationRequest {
    id_transaction: TransactionId,
    transfers: Vec<Transfer>,
}

#[derive(Serialize, Deserialize)]
struct ForwardBody {
    id_transfer: TransferId,
    side: Side,
    target_tenant: String,
}

fn decode_body<T: DeserializeOwned>(message: &Message) -> Result<T, ParseError> {
    serde_json::from_slice(&message.body).map_err(|e| ParseError::InvalidBody(e.to_string()))
}
