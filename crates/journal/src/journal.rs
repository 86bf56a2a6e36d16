//! Per-tenant transaction journal
//!
//! Every transaction owns three entries under `transaction/`: the body,
//! a one-line state file `status ( SP reason )?`, and an append-only
//! forward log with one record per forwarded leg:
//! `origin-transfer SP side SP target-tenant SP target-transaction SP
//! target-transfer`.

use crate::error::JournalError;
use crate::storage::Storage;
use ledger_common::{Side, Status, Transaction, TransactionId, Transfer, TransferId};
use std::path::Path;

const STATE_SUFFIX: &str = ".state";
const FORWARD_SUFFIX: &str = ".forward";

/// Journal of one tenant, rooted at `<root>/t_<tenant>`
pub struct Journal {
    storage: Storage,
}

impl Journal {
    pub fn new(root: impl AsRef<Path>, tenant: &str) -> Result<Self, JournalError> {
        let storage = Storage::new(root.as_ref().join(format!("t_{}", tenant)))?;
        Ok(Self { storage })
    }

    /// Persist a new transaction: state `dirty`, then the body, then
    /// state `new`. A failure leaves the partial record behind; the
    /// integrity scan completes or discards it.
    pub fn persist_transaction(&self, transaction: &Transaction) -> Result<(), JournalError> {
        let state = state_path(&transaction.id);
        self.storage
            .write_file(&state, Status::Dirty.as_str().as_bytes())?;
        self.storage
            .write_file(&transaction_path(&transaction.id), &transaction.encode())?;
        self.storage
            .update_file(&state, Status::New.as_str().as_bytes())
    }

    /// Load a transaction body; `None` on any i/o or parse failure
    pub fn load_transaction(&self, id: &TransactionId) -> Option<Transaction> {
        let data = self
            .storage
            .read_file_fully(&transaction_path(id))
            .ok()
            .flatten()?;
        match Transaction::decode(&data) {
            Ok(transaction) => Some(transaction),
            Err(e) => {
                tracing::warn!("unreadable transaction body {}: {}", id, e);
                None
            }
        }
    }

    /// Load one transfer of a journaled transaction
    pub fn load_transfer(&self, id: &TransactionId, id_transfer: &TransferId) -> Option<Transfer> {
        self.load_transaction(id)?.transfer(id_transfer).cloned()
    }

    /// Current status and optional reason from the state file
    pub fn get_transaction_state(&self, id: &TransactionId) -> Option<(Status, Option<String>)> {
        let data = self.storage.read_file_fully(&state_path(id)).ok().flatten()?;
        let text = String::from_utf8_lossy(&data);
        let line = text.trim_end_matches('\n');
        let (token, reason) = match line.split_once(' ') {
            Some((token, reason)) => (token, Some(reason.to_string())),
            None => (line, None),
        };
        match token.parse::<Status>() {
            Ok(status) => Some((status, reason)),
            Err(e) => {
                tracing::warn!("unreadable state of transaction {}: {}", id, e);
                None
            }
        }
    }

    pub fn accept_transaction(&self, id: &TransactionId) -> Result<(), JournalError> {
        self.set_state(id, Status::Accepted, None)
    }

    pub fn reject_transaction(&self, id: &TransactionId) -> Result<(), JournalError> {
        self.set_state(id, Status::Rejected, None)
    }

    pub fn commit_transaction(&self, id: &TransactionId) -> Result<(), JournalError> {
        self.set_state(id, Status::Committed, None)
    }

    pub fn rollback_transaction(&self, id: &TransactionId, reason: &str) -> Result<(), JournalError> {
        self.set_state(id, Status::Rollbacked, Some(reason))
    }

    /// Record a forwarded credit leg; appending is the commit point and
    /// happens at most once per `(transfer, side)`
    pub fn accept_forward_credit(
        &self,
        id: &TransactionId,
        id_transfer: &TransferId,
        target_tenant: &str,
        target_transaction: &TransactionId,
        target_transfer: &TransferId,
    ) -> Result<(), JournalError> {
        self.accept_forward(
            id,
            id_transfer,
            Side::Credit,
            target_tenant,
            target_transaction,
            target_transfer,
        )
    }

    /// Record a forwarded debit leg; see [`Journal::accept_forward_credit`]
    pub fn accept_forward_debit(
        &self,
        id: &TransactionId,
        id_transfer: &TransferId,
        target_tenant: &str,
        target_transaction: &TransactionId,
        target_transfer: &TransferId,
    ) -> Result<(), JournalError> {
        self.accept_forward(
            id,
            id_transfer,
            Side::Debit,
            target_tenant,
            target_transaction,
            target_transfer,
        )
    }

    pub fn is_transfer_forwarded_credit(
        &self,
        id: &TransactionId,
        id_transfer: &TransferId,
    ) -> Result<bool, JournalError> {
        self.is_transfer_forwarded(id, id_transfer, Side::Credit)
    }

    pub fn is_transfer_forwarded_debit(
        &self,
        id: &TransactionId,
        id_transfer: &TransferId,
    ) -> Result<bool, JournalError> {
        self.is_transfer_forwarded(id, id_transfer, Side::Debit)
    }

    pub fn is_transfer_forwarded(
        &self,
        id: &TransactionId,
        id_transfer: &TransferId,
        side: Side,
    ) -> Result<bool, JournalError> {
        let Some(data) = self.storage.read_file_fully(&forward_path(id))? else {
            return Ok(false);
        };
        let text = String::from_utf8_lossy(&data);
        for line in text.lines() {
            let mut parts = line.split(' ');
            if parts.next() == Some(id_transfer.as_str()) && parts.next() == Some(side.as_str()) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Journaled transactions with their current status
    pub fn scan_transactions(&self) -> Result<Vec<(TransactionId, Status)>, JournalError> {
        let mut found = Vec::new();
        for name in self.storage.list("transaction")? {
            let Some(id) = name.strip_suffix(STATE_SUFFIX) else {
                continue;
            };
            let id = TransactionId::from(id);
            match self.get_transaction_state(&id) {
                Some((status, _)) => found.push((id, status)),
                None => tracing::warn!("skipping journal entry with unreadable state: {}", id),
            }
        }
        Ok(found)
    }

    /// Drop all three files of a transaction (incomplete `dirty` writes)
    pub fn discard_transaction(&self, id: &TransactionId) -> Result<(), JournalError> {
        self.storage.remove_file(&transaction_path(id))?;
        self.storage.remove_file(&state_path(id))?;
        self.storage.remove_file(&forward_path(id))
    }

    fn set_state(
        &self,
        id: &TransactionId,
        status: Status,
        reason: Option<&str>,
    ) -> Result<(), JournalError> {
        let line = match reason {
            Some(reason) => format!("{} {}", status, reason),
            None => status.to_string(),
        };
        self.storage.update_file(&state_path(id), line.as_bytes())
    }

    fn accept_forward(
        &self,
        id: &TransactionId,
        id_transfer: &TransferId,
        side: Side,
        target_tenant: &str,
        target_transaction: &TransactionId,
        target_transfer: &TransferId,
    ) -> Result<(), JournalError> {
        if self.is_transfer_forwarded(id, id_transfer, side)? {
            return Ok(());
        }
        let record = format!(
            "{} {} {} {} {}\n",
            id_transfer, side, target_tenant, target_transaction, target_transfer
        );
        self.storage.append_file(&forward_path(id), record.as_bytes())
    }
}

fn transaction_path(id: &TransactionId) -> String {
    format!("transaction/{}", id)
}

fn state_path(id: &TransactionId) -> String {
    format!("transaction/{}{}", id, STATE_SUFFIX)
}

fn forward_path(id: &TransactionId) -> String {
    format!("transaction/{}{}", id, FORWARD_SUFFIX)
}
