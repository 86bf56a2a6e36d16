//! Transaction model and journal codec
//!
//! A transaction is an atomic group of transfers; it succeeds or fails as a
//! whole and is immutable once persisted. The journal codec is line
//! oriented: the first line carries the transaction id, every following
//! line one transfer with space-separated fields. The encoding is
//! deterministic and order-preserving so that `decode(encode(t)) == t`.

use crate::{Account, TransactionId, TransferId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Phase token negotiated with an account during the promise phase
pub const PHASE_PROMISE: &str = "T_PROMISE";
/// Phase token negotiated with an account during the commit phase
pub const PHASE_COMMIT: &str = "T_COMMIT";
/// Phase token negotiated with an account during the rollback phase
pub const PHASE_ROLLBACK: &str = "T_ROLLBACK";

/// Side of a transfer leg, as recorded in the forward log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Credit,
    Debit,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Credit => "credit",
            Side::Debit => "debit",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Movement of an amount from the debit account to the credit account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    pub credit: Account,
    pub debit: Account,
    pub value_date: DateTime<Utc>,
    pub amount: Decimal,
    pub currency: String,
}

/// Atomic group of transfers identified per tenant by its id
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub transfers: Vec<Transfer>,
}

impl Transaction {
    pub fn new(id: impl Into<TransactionId>, transfers: Vec<Transfer>) -> Self {
        Self {
            id: id.into(),
            transfers,
        }
    }

    /// Check the submission invariants.
    ///
    /// Identifiers, account components and currencies must be non-empty and
    /// free of whitespace; the codec and the state file are space and line
    /// separated.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_token(self.id.as_str()) {
            return Err(ValidationError::MissingTransactionId);
        }
        if self.transfers.is_empty() {
            return Err(ValidationError::NoTransfers);
        }
        for transfer in &self.transfers {
            if !is_token(transfer.id.as_str()) {
                return Err(ValidationError::MissingTransferId);
            }
            for account in [&transfer.credit, &transfer.debit] {
                if !is_token(&account.tenant) || !is_token(&account.name) {
                    return Err(ValidationError::MalformedAccount(account.clone()));
                }
            }
            if !is_token(&transfer.currency) {
                return Err(ValidationError::MalformedCurrency(transfer.id.clone()));
            }
        }
        Ok(())
    }

    /// Initial negotiation mapping: every account appearing as credit or
    /// debit in any transfer, deduplicated, mapped to the promise phase.
    pub fn prepare_remote_negotiation(&self) -> HashMap<Account, String> {
        let mut negotiation = HashMap::new();
        for transfer in &self.transfers {
            negotiation.insert(transfer.credit.clone(), PHASE_PROMISE.to_string());
            negotiation.insert(transfer.debit.clone(), PHASE_PROMISE.to_string());
        }
        negotiation
    }

    /// Union of transfers touching the given account on either side
    pub fn transfers_for(&self, account: &Account) -> Vec<Transfer> {
        self.transfers
            .iter()
            .filter(|transfer| &transfer.credit == account || &transfer.debit == account)
            .cloned()
            .collect()
    }

    /// Find a transfer by id
    pub fn transfer(&self, id: &TransferId) -> Option<&Transfer> {
        self.transfers.iter().find(|transfer| &transfer.id == id)
    }

    /// Serialize to the journal wire form
    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(self.id.as_str());
        for transfer in &self.transfers {
            out.push('\n');
            out.push_str(&format!(
                "{} {} {} {} {} {} {} {}",
                transfer.id,
                transfer.credit.tenant,
                transfer.credit.name,
                transfer.debit.tenant,
                transfer.debit.name,
                transfer.value_date.to_rfc3339(),
                transfer.amount,
                transfer.currency,
            ));
        }
        out.into_bytes()
    }

    /// Deserialize from the journal wire form
    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let text = std::str::from_utf8(data).map_err(|_| CodecError::NotUtf8)?;
        let mut lines = text.lines();
        let id = lines.next().filter(|l| !l.is_empty()).ok_or(CodecError::MissingHeader)?;

        let mut transfers = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            transfers.push(decode_transfer(line)?);
        }

        Ok(Transaction {
            id: TransactionId::from(id),
            transfers,
        })
    }
}

fn decode_transfer(line: &str) -> Result<Transfer, CodecError> {
    let parts: Vec<&str> = line.split(' ').collect();
    if parts.len() != 8 {
        return Err(CodecError::MalformedTransfer(line.to_string()));
    }
    let value_date = DateTime::parse_from_rfc3339(parts[5])
        .map_err(|_| CodecError::MalformedValueDate(parts[5].to_string()))?
        .with_timezone(&Utc);
    let amount = Decimal::from_str(parts[6])
        .map_err(|_| CodecError::MalformedAmount(parts[6].to_string()))?;

    Ok(Transfer {
        id: TransferId::from(parts[0]),
        credit: Account::new(parts[1], parts[2]),
        debit: Account::new(parts[3], parts[4]),
        value_date,
        amount,
        currency: parts[7].to_string(),
    })
}

fn is_token(value: &str) -> bool {
    !value.is_empty() && !value.contains(char::is_whitespace)
}

/// Submitted transaction violates an invariant; nothing is journaled
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("transaction id is missing or malformed")]
    MissingTransactionId,

    #[error("transaction carries no transfers")]
    NoTransfers,

    #[error("transfer id is missing or malformed")]
    MissingTransferId,

    #[error("account reference is malformed: {0}")]
    MalformedAccount(Account),

    #[error("currency of transfer {0} is malformed")]
    MalformedCurrency(TransferId),
}

/// Journal bytes do not parse as a transaction
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("body is not valid utf-8")]
    NotUtf8,

    #[error("body is missing the transaction id header line")]
    MissingHeader,

    #[error("malformed transfer line: {0}")]
    MalformedTransfer(String),

    #[error("malformed value date: {0}")]
    MalformedValueDate(String),

    #[error("malformed amount: {0}")]
    MalformedAmount(String),
}
