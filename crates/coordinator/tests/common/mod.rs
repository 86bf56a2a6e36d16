//! Shared harness for the end-to-end negotiation tests: an in-process
//! lake hosting coordinator tenants, a registered client mailbox, and
//! scripted stub account actors.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use ledger_common::{Account, Status, Transaction, TransactionId, Transfer, TransferId};
use ledger_coordinator::{CoordinatorFactory, CoordinatorSettings};
use ledger_journal::Journal;
use ledger_lake::{Coordinates, Envelope, Lake};
use ledger_protocol::{AccountMessage, ClientReply, CoordinatorMessage, NegotiationReply};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Short phase deadline so timeout scenarios run quickly
pub const PHASE_TIMEOUT: Duration = Duration::from_millis(200);

pub struct Harness {
    pub lake: Arc<Lake>,
    pub client: Coordinates,
    pub inbox: UnboundedReceiver<Envelope>,
}

pub fn harness() -> Harness {
    let lake = Lake::new();
    let client = Coordinates::new("test", "client");
    let inbox = lake.register(client.clone());
    Harness {
        lake,
        client,
        inbox,
    }
}

/// Host a ledger tenant on the lake, journaling into a scratch directory
pub fn host_tenant(lake: &Arc<Lake>, tenant: &str) -> (Arc<Journal>, PathBuf) {
    let dir = std::env::temp_dir().join(format!("ledger_it_{}", uuid::Uuid::new_v4()));
    let journal = Arc::new(Journal::new(&dir, tenant).unwrap());
    lake.host_region(
        tenant,
        Arc::new(CoordinatorFactory::with_settings(
            Arc::clone(&journal),
            CoordinatorSettings {
                phase_timeout: PHASE_TIMEOUT,
            },
        )),
    );
    (journal, dir)
}

/// How a stub account answers phase envelopes
#[derive(Debug, Clone, Copy)]
pub enum Script {
    AcceptAll,
    RejectPromise(&'static str),
    /// Reject the promise of one particular transaction, accept the rest
    RejectPromiseOn(&'static str, &'static str),
    RejectCommit(&'static str),
}

/// Handle onto a spawned stub account actor
pub struct AccountStub {
    pub account: Account,
    /// Phase tokens received, in order
    pub received: Arc<Mutex<Vec<&'static str>>>,
    /// While set, envelopes are swallowed without a reply
    pub muted: Arc<AtomicBool>,
}

pub fn spawn_account(lake: &Arc<Lake>, tenant: &str, name: &str, script: Script) -> AccountStub {
    spawn_account_with_delay(lake, tenant, name, script, Duration::ZERO)
}

/// Spawn a stub that sits on every envelope for `delay` before replying
pub fn spawn_account_with_delay(
    lake: &Arc<Lake>,
    tenant: &str,
    name: &str,
    script: Script,
    delay: Duration,
) -> AccountStub {
    let account = Account::new(tenant, name);
    let coordinates = Coordinates::new(tenant, name);
    let mut mailbox = lake.register(coordinates.clone());
    let received = Arc::new(Mutex::new(Vec::new()));
    let muted = Arc::new(AtomicBool::new(false));

    let stub = AccountStub {
        account: account.clone(),
        received: Arc::clone(&received),
        muted: Arc::clone(&muted),
    };

    let lake = Arc::clone(lake);
    tokio::spawn(async move {
        while let Some(envelope) = mailbox.recv().await {
            let Ok(message) = AccountMessage::from_message(&envelope.message) else {
                continue;
            };
            received.lock().push(message.phase());
            if muted.load(Ordering::SeqCst) {
                continue;
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let reply = answer(&account, &message, script);
            lake.send(Envelope::new(
                coordinates.clone(),
                envelope.from,
                CoordinatorMessage::Reply(reply).into_message(),
            ));
        }
    });

    stub
}

fn answer(account: &Account, message: &AccountMessage, script: Script) -> NegotiationReply {
    match message {
        AccountMessage::Promise { id_transaction, .. } => match script {
            Script::RejectPromise(reason) => NegotiationReply::PromiseWasRejected {
                account: account.clone(),
                reason: reason.to_string(),
            },
            Script::RejectPromiseOn(id, reason) if id_transaction.as_str() == id => {
                NegotiationReply::PromiseWasRejected {
                    account: account.clone(),
                    reason: reason.to_string(),
                }
            }
            _ => NegotiationReply::PromiseWasAccepted {
                account: account.clone(),
            },
        },
        AccountMessage::Commit { .. } => match script {
            Script::RejectCommit(reason) => NegotiationReply::CommitWasRejected {
                account: account.clone(),
                reason: reason.to_string(),
            },
            _ => NegotiationReply::CommitWasAccepted {
                account: account.clone(),
            },
        },
        AccountMessage::Rollback { .. } => NegotiationReply::RollbackWasAccepted {
            account: account.clone(),
        },
    }
}

pub fn transfer(
    id: &str,
    credit: (&str, &str),
    debit: (&str, &str),
    amount: &str,
    currency: &str,
) -> Transfer {
    Transfer {
        id: TransferId::new(id),
        credit: Account::new(credit.0, credit.1),
        debit: Account::new(debit.0, debit.1),
        value_date: Utc.with_ymd_and_hms(2021, 3, 14, 9, 26, 53).unwrap(),
        amount: Decimal::from_str(amount).unwrap(),
        currency: currency.to_string(),
    }
}

/// Submit a transaction to its coordinator and await the terminal reply
pub async fn submit(harness: &mut Harness, tenant: &str, transaction: Transaction) -> ClientReply {
    let id = transaction.id.as_str().to_string();
    send_to_coordinator(
        harness,
        tenant,
        &id,
        CoordinatorMessage::CreateTransaction { transaction },
    );
    next_reply(harness).await
}

pub fn send_to_coordinator(
    harness: &Harness,
    tenant: &str,
    name: &str,
    message: CoordinatorMessage,
) {
    harness.lake.send(Envelope::new(
        harness.client.clone(),
        Coordinates::new(tenant, name),
        message.into_message(),
    ));
}

pub async fn next_reply(harness: &mut Harness) -> ClientReply {
    let envelope = tokio::time::timeout(Duration::from_secs(5), harness.inbox.recv())
        .await
        .expect("terminal reply within deadline")
        .expect("client inbox open");
    ClientReply::from_message(&envelope.message).expect("typed client reply")
}

/// Poll the journal until the transaction reaches the given status
pub async fn wait_for_status(journal: &Journal, id: &TransactionId, status: Status) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if journal.get_transaction_state(id).map(|(s, _)| s) == Some(status) {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("transaction {} did not reach status {}", id, status);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
