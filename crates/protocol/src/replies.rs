//! Terminal replies to the originating requester

use crate::error::ParseError;
use ledger_common::{Side, TransactionId, TransferId};
use ledger_lake::Message;
use serde::{Deserialize, Serialize};

const KIND_TRANSACTION_CREATED: &str = "transaction_created";
const KIND_TRANSACTION_REJECTED: &str = "transaction_rejected";
const KIND_TRANSACTION_REFUSED: &str = "transaction_refused";
const KIND_TRANSACTION_DUPLICATE: &str = "transaction_duplicate";
const KIND_TRANSACTION_RACE: &str = "transaction_race";
const KIND_REPLY_TIMEOUT: &str = "reply_timeout";
const KIND_TRANSFER_FORWARDED: &str = "transfer_forwarded";
const KIND_TRANSFER_REFUSED: &str = "transfer_refused";

/// Terminal outcome of a submission or forward request
#[derive(Debug, Clone, PartialEq)]
pub enum ClientReply {
    /// Fully committed; bookings are authoritative
    TransactionCreated { id_transaction: TransactionId },

    /// Negotiation rejected or rolled back; no booking stands
    TransactionRejected { id_transaction: TransactionId },

    /// Request malformed or invalid; nothing was journaled
    TransactionRefused { id_transaction: TransactionId },

    /// The id already exists in a terminal state
    TransactionDuplicate { id_transaction: TransactionId },

    /// Another submission for the same id is in flight
    TransactionRace { id_transaction: TransactionId },

    /// A phase did not complete within its deadline; the journal keeps
    /// whatever state was reached and the integrity scan will advance it
    ReplyTimeout { id_transaction: TransactionId },

    /// Forwarded leg durably recorded
    TransferForwarded {
        id_transaction: TransactionId,
        id_transfer: TransferId,
        side: Side,
    },

    /// Forward request declined; nothing was recorded
    TransferRefused {
        id_transaction: TransactionId,
        id_transfer: TransferId,
        side: Side,
    },
}

impl ClientReply {
    /// Transaction the reply concerns
    pub fn id_transaction(&self) -> &TransactionId {
        match self {
            ClientReply::TransactionCreated { id_transaction }
            | ClientReply::TransactionRejected { id_transaction }
            | ClientReply::TransactionRefused { id_transaction }
            | ClientReply::TransactionDuplicate { id_transaction }
            | ClientReply::TransactionRace { id_transaction }
            | ClientReply::ReplyTimeout { id_transaction }
            | ClientReply::TransferForwarded { id_transaction, .. }
            | ClientReply::TransferRefused { id_transaction, .. } => id_transaction,
        }
    }

    /// Parse a wire message into a typed reply
    pub fn from_message(message: &Message) -> Result<Self, ParseError> {
        let kind = message.get_header("kind").ok_or(ParseError::MissingKind)?;
        match kind {
            KIND_TRANSFER_FORWARDED | KIND_TRANSFER_REFUSED => {
                let body: ForwardReplyBody = decode_body(message)?;
                if kind == KIND_TRANSFER_FORWARDED {
                    Ok(ClientReply::TransferForwarded {
                        id_transaction: body.id_transaction,
                        id_transfer: body.id_transfer,
                        side: body.side,
                    })
                } else {
                    Ok(ClientReply::TransferRefused {
                        id_transaction: body.id_transaction,
                        id_transfer: body.id_transfer,
                        side: body.side,
                    })
                }
            }
            _ => {
                let body: ReplyBody = decode_body(message)?;
                let id_transaction = body.id_transaction;
                match kind {
                    KIND_TRANSACTION_CREATED => Ok(ClientReply::TransactionCreated { id_transaction }),
                    KIND_TRANSACTION_REJECTED => {
                        Ok(ClientReply::TransactionRejected { id_transaction })
                    }
                    KIND_TRANSACTION_REFUSED => Ok(ClientReply::TransactionRefused { id_transaction }),
                    KIND_TRANSACTION_DUPLICATE => {
                        Ok(ClientReply::TransactionDuplicate { id_transaction })
                    }
                    KIND_TRANSACTION_RACE => Ok(ClientReply::TransactionRace { id_transaction }),
                    KIND_REPLY_TIMEOUT => Ok(ClientReply::ReplyTimeout { id_transaction }),
                    other => Err(ParseError::UnknownKind(other.to_string())),
                }
            }
        }
    }

    /// Render into a wire message
    pub fn into_message(self) -> Message {
        match self {
            ClientReply::TransferForwarded {
                id_transaction,
                id_transfer,
                side,
            } => forward_reply(KIND_TRANSFER_FORWARDED, id_transaction, id_transfer, side),
            ClientReply::TransferRefused {
                id_transaction,
                id_transfer,
                side,
            } => forward_reply(KIND_TRANSFER_REFUSED, id_transaction, id_transfer, side),
            ClientReply::TransactionCreated { id_transaction } => {
                transaction_reply(KIND_TRANSACTION_CREATED, id_transaction)
            }
            ClientReply::TransactionRejected { id_transaction } => {
                transaction_reply(KIND_TRANSACTION_REJECTED, id_transaction)
            }
            ClientReply::TransactionRefused { id_transaction } => {
                transaction_reply(KIND_TRANSACTION_REFUSED, id_transaction)
            }
            ClientReply::TransactionDuplicate { id_transaction } => {
                transaction_reply(KIND_TRANSACTION_DUPLICATE, id_transaction)
            }
            ClientReply::TransactionRace { id_transaction } => {
                transaction_reply(KIND_TRANSACTION_RACE, id_transaction)
            }
            ClientReply::ReplyTimeout { id_transaction } => {
                transaction_reply(KIND_REPLY_TIMEOUT, id_transaction)
            }
        }
    }
}

fn transaction_reply(kind: &'static str, id_transaction: TransactionId) -> Message {
    let body = ReplyBody { id_transaction };
    Message::with_body(serde_json::to_vec(&body).unwrap()).with_header("kind", kind)
}

fn forward_reply(
    kind: &'static str,
    id_transaction: TransactionId,
    id_transfer: TransferId,
    side: Side,
) -> Message {
    let body = ForwardReplyBody {
        id_transaction,
        id_transfer,
        side,
    };
    Message::with_body(serde_json::to_vec(&body).unwrap()).with_header("kind", kind)
}

#[derive(Serialize, Deserialize)]
struct ReplyBody {
    id_transaction: TransactionId,
}

#[derive(Serialize, Deserialize)]
struct ForwardReplyBody {
    id_transaction: TransactionId,
    id_transfer: TransferId,
    side: Side,
}

fn decode_body<T: serde::de::DeserializeOwned>(message: &Message) -> Result<T, ParseError> {
    serde_json::from_slice(&message.body).map_err(|e| ParseError::InvalidBody(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_kinds() {
        let id = TransactionId::new("trn1");
        let replies = [
            ClientReply::TransactionCreated {
                id_transaction: id.clone(),
            },
            ClientReply::TransactionRejected {
                id_transaction: id.clone(),
            },
            ClientReply::TransactionRefused {
                id_transaction: id.clone(),
            },
            ClientReply::TransactionDuplicate {
                id_transaction: id.clone(),
            },
            ClientReply::TransactionRace {
                id_transaction: id.clone(),
            },
            ClientReply::ReplyTimeout {
                id_transaction: id.clone(),
            },
            ClientReply::TransferForwarded {
                id_transaction: id.clone(),
                id_transfer: TransferId::new("leg1"),
                side: Side::Credit,
            },
            ClientReply::TransferRefused {
                id_transaction: id,
                id_transfer: TransferId::new("leg1"),
                side: Side::Debit,
            },
        ];
        for reply in replies {
            let parsed = ClientReply::from_message(&reply.clone().into_message()).unwrap();
            assert_eq!(parsed, reply);
        }
    }
}
