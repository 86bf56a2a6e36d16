//! In-memory negotiation state of one coordinator actor
//!
//! The state is the actor's continuation between deliveries: which
//! accounts take part, which are still owed a reply for the current
//! phase, and how the phase is going so far. It is owned by its actor and
//! never shared, so no locking is involved.

use ledger_common::{Account, Transaction};
use ledger_lake::Coordinates;
use ledger_protocol::{NegotiationReply, REASON_INTERNAL};
use std::collections::{HashMap, HashSet};

/// Negotiation bookkeeping for a single transaction
#[derive(Debug, Default)]
pub struct TransactionState {
    /// Full transaction body
    pub transaction: Transaction,

    /// Participating accounts mapped to the phase currently negotiated
    pub negotiation: HashMap<Account, String>,

    /// Accounts whose reply for the current phase is still pending
    pub wait_for: HashSet<Account>,

    /// Replies counted for the current phase
    pub ok_responses: usize,
    pub failed_responses: usize,

    /// First rejection reason observed in the current phase
    pub failure_reason: Option<String>,

    /// Generation of the current phase; bumped every time a phase is
    /// armed so a deadline timer outliving its phase can be told apart
    /// from the live one
    pub epoch: u64,

    /// Set once the state has been populated
    pub ready: bool,

    /// Address of the originating requester, when one is waiting
    pub reply_to: Option<Coordinates>,
}

impl TransactionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the state from a transaction body
    pub fn prepare(&mut self, transaction: Transaction, requested_by: Option<Coordinates>) {
        self.negotiation = transaction.prepare_remote_negotiation();
        self.transaction = transaction;
        self.reset_marks();
        self.ready = true;
        self.reply_to = requested_by;
    }

    /// Count a reply towards the current phase.
    ///
    /// Only accounts still waited for are counted; late or duplicate
    /// replies, and replies from accounts outside the negotiation, fall
    /// through without effect.
    pub fn mark(&mut self, reply: &NegotiationReply) {
        match reply {
            NegotiationReply::PromiseWasAccepted { account }
            | NegotiationReply::CommitWasAccepted { account }
            | NegotiationReply::RollbackWasAccepted { account } => {
                if self.wait_for.remove(account) {
                    self.ok_responses += 1;
                }
            }
            NegotiationReply::PromiseWasRejected { account, reason }
            | NegotiationReply::CommitWasRejected { account, reason }
            | NegotiationReply::RollbackWasRejected { account, reason } => {
                if self.wait_for.remove(account) {
                    self.failed_responses += 1;
                    self.failure_reason.get_or_insert_with(|| reason.clone());
                }
            }
            NegotiationReply::FatalErrored { account } => {
                if self.wait_for.remove(account) {
                    self.failed_responses += 1;
                    self.failure_reason
                        .get_or_insert_with(|| REASON_INTERNAL.to_string());
                }
            }
        }
    }

    /// Arm a fresh phase: every participant owes a reply again and any
    /// timer scheduled for an earlier phase becomes stale
    pub fn reset_marks(&mut self) {
        self.wait_for = self.negotiation.keys().cloned().collect();
        self.ok_responses = 0;
        self.failed_responses = 0;
        self.failure_reason = None;
        self.epoch += 1;
    }

    /// Mark every participant as negotiating the given phase
    pub fn advance_phase(&mut self, phase: &str) {
        for negotiated in self.negotiation.values_mut() {
            *negotiated = phase.to_string();
        }
    }

    /// A phase is finished once no participant is owed a reply
    pub fn is_negotiation_finished(&self) -> bool {
        self.negotiation.len() <= self.ok_responses + self.failed_responses
    }
}
