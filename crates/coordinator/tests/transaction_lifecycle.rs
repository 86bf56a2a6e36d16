//! End-to-end negotiation scenarios over the in-process lake

mod common;

use common::*;
use ledger_common::{Status, Transaction, TransactionId, PHASE_COMMIT, PHASE_PROMISE, PHASE_ROLLBACK};
use ledger_coordinator::IntegrityScanner;
use ledger_protocol::ClientReply;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn test_happy_path_commits() {
    let mut harness = harness();
    let (journal, _) = host_tenant(&harness.lake, "demo");
    let alice = spawn_account(&harness.lake, "demo", "alice", Script::AcceptAll);
    let bob = spawn_account(&harness.lake, "demo", "bob", Script::AcceptAll);

    let transaction = Transaction::new(
        "trn1",
        vec![transfer("leg1", ("demo", "bob"), ("demo", "alice"), "10", "EUR")],
    );
    let reply = submit(&mut harness, "demo", transaction).await;

    assert_eq!(
        reply,
        ClientReply::TransactionCreated {
            id_transaction: TransactionId::new("trn1")
        }
    );
    assert_eq!(
        journal.get_transaction_state(&TransactionId::new("trn1")),
        Some((Status::Committed, None))
    );
    assert_eq!(*alice.received.lock(), vec![PHASE_PROMISE, PHASE_COMMIT]);
    assert_eq!(*bob.received.lock(), vec![PHASE_PROMISE, PHASE_COMMIT]);
}

#[tokio::test]
async fn test_promise_rejection_rejects_the_transaction() {
    let mut harness = harness();
    let (journal, _) = host_tenant(&harness.lake, "demo");
    let alice = spawn_account(
        &harness.lake,
        "demo",
        "alice",
        Script::RejectPromise("insufficient-funds"),
    );
    let _bob = spawn_account(&harness.lake, "demo", "bob", Script::AcceptAll);

    let transaction = Transaction::new(
        "trn2",
        vec![transfer(
            "leg1",
            ("demo", "bob"),
            ("demo", "alice"),
            "1000000",
            "EUR",
        )],
    );
    let reply = submit(&mut harness, "demo", transaction).await;

    assert_eq!(
        reply,
        ClientReply::TransactionRejected {
            id_transaction: TransactionId::new("trn2")
        }
    );
    let id = TransactionId::new("trn2");
    assert_eq!(
        journal.get_transaction_state(&id),
        Some((Status::Rejected, None))
    );
    // no booking, nothing to forward
    assert!(!journal
        .is_transfer_forwarded_credit(&id, &"leg1".into())
        .unwrap());
    assert_eq!(*alice.received.lock(), vec![PHASE_PROMISE]);
}

#[tokio::test]
async fn test_commit_failure_rolls_back_everyone() {
    let mut harness = harness();
    let (journal, _) = host_tenant(&harness.lake, "demo");
    let alice = spawn_account(&harness.lake, "demo", "alice", Script::AcceptAll);
    let bob = spawn_account(&harness.lake, "demo", "bob", Script::AcceptAll);
    let _carol = spawn_account(
        &harness.lake,
        "demo",
        "carol",
        Script::RejectCommit("insufficient-funds"),
    );

    let transaction = Transaction::new(
        "trn3",
        vec![
            transfer("leg1", ("demo", "bob"), ("demo", "alice"), "10", "EUR"),
            transfer("leg2", ("demo", "carol"), ("demo", "bob"), "5", "EUR"),
        ],
    );
    let reply = submit(&mut harness, "demo", transaction).await;

    assert_eq!(
        reply,
        ClientReply::TransactionRejected {
            id_transaction: TransactionId::new("trn3")
        }
    );
    assert_eq!(
        journal.get_transaction_state(&TransactionId::new("trn3")),
        Some((Status::Rollbacked, Some("insufficient-funds".to_string())))
    );
    // the accounts that had committed were rolled back
    assert_eq!(
        *alice.received.lock(),
        vec![PHASE_PROMISE, PHASE_COMMIT, PHASE_ROLLBACK]
    );
    assert_eq!(
        *bob.received.lock(),
        vec![PHASE_PROMISE, PHASE_COMMIT, PHASE_ROLLBACK]
    );
}

#[tokio::test]
async fn test_duplicate_submission() {
    let mut harness = harness();
    let (journal, _) = host_tenant(&harness.lake, "demo");
    spawn_account(&harness.lake, "demo", "alice", Script::AcceptAll);
    spawn_account(&harness.lake, "demo", "bob", Script::AcceptAll);

    let transaction = Transaction::new(
        "trn1",
        vec![transfer("leg1", ("demo", "bob"), ("demo", "alice"), "10", "EUR")],
    );
    let first = submit(&mut harness, "demo", transaction.clone()).await;
    assert!(matches!(first, ClientReply::TransactionCreated { .. }));

    let second = submit(&mut harness, "demo", transaction.clone()).await;
    assert_eq!(
        second,
        ClientReply::TransactionDuplicate {
            id_transaction: TransactionId::new("trn1")
        }
    );
    // the journal is untouched
    assert_eq!(
        journal.get_transaction_state(&TransactionId::new("trn1")),
        Some((Status::Committed, None))
    );
    assert_eq!(
        journal.load_transaction(&TransactionId::new("trn1")),
        Some(transaction)
    );
}

#[tokio::test]
async fn test_timeout_then_recovery_completes_the_transaction() {
    let mut harness = harness();
    let (journal, _) = host_tenant(&harness.lake, "demo");
    let alice = spawn_account(&harness.lake, "demo", "alice", Script::AcceptAll);
    let bob = spawn_account(&harness.lake, "demo", "bob", Script::AcceptAll);
    bob.muted.store(true, Ordering::SeqCst);

    let transaction = Transaction::new(
        "trn5",
        vec![transfer("leg1", ("demo", "bob"), ("demo", "alice"), "10", "EUR")],
    );
    let reply = submit(&mut harness, "demo", transaction).await;

    let id = TransactionId::new("trn5");
    assert_eq!(
        reply,
        ClientReply::ReplyTimeout {
            id_transaction: id.clone()
        }
    );
    assert_eq!(journal.get_transaction_state(&id), Some((Status::New, None)));

    // the account comes back and the scan re-drives the promise phase
    bob.muted.store(false, Ordering::SeqCst);
    let scanner = IntegrityScanner::new(
        "demo",
        journal.clone(),
        harness.lake.clone(),
        Duration::from_secs(3600),
    );
    scanner.scan_once();

    wait_for_status(&journal, &id, Status::Committed).await;
    assert_eq!(*alice.received.lock(), vec![PHASE_PROMISE, PHASE_COMMIT]);
    assert_eq!(
        *bob.received.lock(),
        vec![PHASE_PROMISE, PHASE_PROMISE, PHASE_COMMIT]
    );
}

#[tokio::test]
async fn test_stale_phase_timer_does_not_time_out_the_next_phase() {
    let mut harness = harness();
    let (journal, _) = host_tenant(&harness.lake, "demo");
    // replies land just under the phase deadline: the promise phase
    // finishes before its timer fires, leaving that timer to go off
    // while the commit phase is still collecting replies
    let delay = PHASE_TIMEOUT * 3 / 5;
    spawn_account_with_delay(&harness.lake, "demo", "alice", Script::AcceptAll, delay);
    spawn_account_with_delay(&harness.lake, "demo", "bob", Script::AcceptAll, delay);

    let transaction = Transaction::new(
        "trn6",
        vec![transfer("leg1", ("demo", "bob"), ("demo", "alice"), "10", "EUR")],
    );
    let reply = submit(&mut harness, "demo", transaction).await;

    // the promise-phase deadline elapsed mid-commit but must not be
    // reported; the requester sees the real outcome
    assert_eq!(
        reply,
        ClientReply::TransactionCreated {
            id_transaction: TransactionId::new("trn6")
        }
    );
    assert_eq!(
        journal.get_transaction_state(&TransactionId::new("trn6")),
        Some((Status::Committed, None))
    );

    // and nothing else trails in afterwards
    let trailing = tokio::time::timeout(PHASE_TIMEOUT * 2, harness.inbox.recv()).await;
    assert!(trailing.is_err());
}

#[tokio::test]
async fn test_concurrent_submission_races() {
    let mut harness = harness();
    let (_journal, _) = host_tenant(&harness.lake, "demo");
    let alice = spawn_account(&harness.lake, "demo", "alice", Script::AcceptAll);
    let bob = spawn_account(&harness.lake, "demo", "bob", Script::AcceptAll);
    alice.muted.store(true, Ordering::SeqCst);
    bob.muted.store(true, Ordering::SeqCst);

    let transaction = Transaction::new(
        "trn7",
        vec![transfer("leg1", ("demo", "bob"), ("demo", "alice"), "10", "EUR")],
    );

    // two submissions while the promise phase is still in flight: the
    // second one hits the running coordinator and races
    send_to_coordinator(
        &harness,
        "demo",
        "trn7",
        ledger_protocol::CoordinatorMessage::CreateTransaction {
            transaction: transaction.clone(),
        },
    );
    send_to_coordinator(
        &harness,
        "demo",
        "trn7",
        ledger_protocol::CoordinatorMessage::CreateTransaction { transaction },
    );

    let first = next_reply(&mut harness).await;
    assert_eq!(
        first,
        ClientReply::TransactionRace {
            id_transaction: TransactionId::new("trn7")
        }
    );
    // the original submission then times out waiting for the accounts
    let second = next_reply(&mut harness).await;
    assert_eq!(
        second,
        ClientReply::ReplyTimeout {
            id_transaction: TransactionId::new("trn7")
        }
    );
}

#[tokio::test]
async fn test_invalid_submission_is_refused() {
    let mut harness = harness();
    let (journal, _) = host_tenant(&harness.lake, "demo");

    let reply = submit(&mut harness, "demo", Transaction::new("trn8", vec![])).await;
    assert_eq!(
        reply,
        ClientReply::TransactionRefused {
            id_transaction: TransactionId::new("trn8")
        }
    );
    assert_eq!(journal.get_transaction_state(&TransactionId::new("trn8")), None);
}

#[tokio::test]
async fn test_integrity_scan_discards_dirty_entries() {
    let harness = harness();
    let (journal, dir) = host_tenant(&harness.lake, "demo");

    // a crashed submission left only the dirty state line behind
    let state_path = dir.join("t_demo/transaction/trn9.state");
    std::fs::create_dir_all(state_path.parent().unwrap()).unwrap();
    std::fs::write(&state_path, b"dirty").unwrap();

    let scanner = IntegrityScanner::new(
        "demo",
        journal.clone(),
        harness.lake.clone(),
        Duration::from_secs(3600),
    );
    scanner.scan_once();

    assert_eq!(journal.get_transaction_state(&TransactionId::new("trn9")), None);
    assert!(!state_path.exists());
}
