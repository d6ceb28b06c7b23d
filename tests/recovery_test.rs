//! Power-cycle recovery: queues restored from the store and obligations replayed
//! from the ledger

mod common;

use common::*;
use handpay_reporting::config::{HandpayReportingConfig, ReportingMode, StoreBackend, StoreConfig};
use handpay_reporting::ledger::InMemoryLedger;
use handpay_reporting::models::{ClientId, HandpayState, KeyOffType, TransactionId};
use handpay_reporting::reporting::{ExceptionCode, HandpayReportingSystem};
use handpay_reporting::HandpayError;
use std::sync::Arc;
use std::time::Duration;

const PENDING: ExceptionCode = ExceptionCode::HandpayIsPending;
const RESET: ExceptionCode = ExceptionCode::HandpayWasReset;

#[tokio::test(start_paused = true)]
async fn test_queues_survive_restart_in_order() {
    let before = Harness::per_queue();
    before.connect(1).await;
    before.connect(2).await;
    for id in 1..=3 {
        let tx = before.request(id);
        before.handler.handpay_pending(&tx).await.unwrap();
    }
    assert_eq!(before.read_and_ack(2).await, Some(1));
    before.handler.shutdown();

    let after = HarnessBuilder::new(ReportingMode::PerQueue)
        .with_ledger(before.ledger.clone())
        .with_store(before.store.clone())
        .build();
    after.connect(1).await;
    after.connect(2).await;

    assert_eq!(after.queued_ids(1), vec![1, 2, 3]);
    assert_eq!(after.queued_ids(2), vec![2, 3]);

    // Nothing is raised until recovery runs
    assert_eq!(after.exceptions.raised(PENDING, 1), 0);
    after.handler.recover().await.unwrap();

    for client in [1, 2] {
        assert_eq!(after.exceptions.raised(PENDING, client), 1);
        assert_eq!(after.handler.is_timer_running(ClientId(client)), Some(true));
    }

    tokio::time::sleep(Duration::from_millis(TEST_INTERVAL_MS + 1)).await;
    assert_eq!(after.exceptions.raised(PENDING, 1), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pending_read_mark_is_not_restored() {
    let before = Harness::per_queue();
    before.connect(1).await;
    let tx = before.request(1);
    before.handler.handpay_pending(&tx).await.unwrap();
    before
        .handler
        .get_next_unread_handpay_transaction(ClientId(1))
        .await
        .unwrap();
    before.handler.shutdown();

    let after = HarnessBuilder::new(ReportingMode::PerQueue)
        .with_store(before.store.clone())
        .build();
    let queue = after.connect(1).await;

    assert!(!queue.is_pending_read());
    assert!(after.handler.implied_ack(ClientId(1)).is_none());
    assert_eq!(after.queued_ids(1), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_oversized_snapshot_keeps_newest_records() {
    let before = Harness::per_queue();
    before.connect(1).await;
    for id in 1..=4 {
        let tx = before.request(id);
        before.handler.handpay_pending(&tx).await.unwrap();
    }
    before.handler.shutdown();

    let after = HarnessBuilder::new(ReportingMode::PerQueue)
        .with_capacity(2)
        .with_store(before.store.clone())
        .build();
    after.connect(1).await;

    assert_eq!(after.queued_ids(1), vec![3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_recover_replays_reset_for_unread_resolved_handpays() {
    let h = Harness::per_queue();
    h.connect(1).await;
    h.connect(2).await;

    h.request(1);
    h.commit(1, KeyOffType::LocalCredit);
    h.request(2);
    h.ledger.set_state(TransactionId(2), HandpayState::Acknowledged);
    let mut read = h.request(3);
    read.state = HandpayState::Committed;
    read.read = true;
    h.ledger.insert(read);

    h.handler.recover().await.unwrap();

    for client in [1, 2] {
        assert_eq!(h.exceptions.raised(RESET, client), 2);
        assert_eq!(
            h.exceptions
                .raised(ExceptionCode::JackpotHandpayKeyedOffToMachinePay, client),
            1
        );
    }
    assert!(h.ledger.get(TransactionId(1)).unwrap().read);
    assert!(h.ledger.get(TransactionId(2)).unwrap().read);
}

#[tokio::test(start_paused = true)]
async fn test_recover_leaves_mid_key_off_handpays_alone() {
    let h = Harness::per_queue();
    h.connect(1).await;

    h.request(1);
    h.ledger.set_state(TransactionId(1), HandpayState::Pending);

    h.handler.recover().await.unwrap();

    assert!(h.exceptions.events().is_empty());
    assert!(!h.ledger.get(TransactionId(1)).unwrap().read);
    assert_eq!(h.handler.is_timer_running(ClientId(1)), Some(false));
}

#[tokio::test(start_paused = true)]
async fn test_legacy_recover_raises_pending_for_requested_handpay() {
    let h = Harness::legacy();
    h.connect(1).await;
    h.connect(2).await;
    h.request(1);

    h.handler.recover().await.unwrap();

    assert_eq!(h.exceptions.raised(PENDING, 1), 1);
    assert_eq!(h.exceptions.raised(PENDING, 2), 1);
}

#[tokio::test(start_paused = true)]
async fn test_legacy_recover_is_quiet_when_everything_is_read() {
    let h = Harness::legacy();
    h.connect(1).await;

    let mut tx = h.request(1);
    tx.state = HandpayState::Committed;
    tx.read = true;
    h.ledger.insert(tx);

    h.handler.recover().await.unwrap();

    assert!(h.exceptions.events().is_empty());
}

fn file_config(directory: &std::path::Path) -> HandpayReportingConfig {
    let mut config = HandpayReportingConfig::default();
    config.store = StoreConfig {
        backend: StoreBackend::File,
        directory: Some(directory.to_path_buf()),
    };
    config
}

#[tokio::test]
async fn test_file_backed_system_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(dir.path());
    let ledger = Arc::new(InMemoryLedger::new());

    {
        let system = HandpayReportingSystem::from_config(
            &config,
            ledger.clone(),
            Arc::new(RecordingExceptionSink::new()),
            None,
        )
        .unwrap();
        system.start(&[ClientId(1), ClientId(2)]).await.unwrap();

        let tx = handpay_reporting::models::HandpayTransaction::requested(
            7,
            1,
            handpay_reporting::models::HandpayType::BonusPay,
            2_500,
        );
        ledger.insert(tx.clone());
        system.handler().handpay_pending(&tx).await.unwrap();
        system.shutdown();
    }

    assert!(dir.path().join("handpay_queue-1.json").exists());

    let exceptions = Arc::new(RecordingExceptionSink::new());
    let system =
        HandpayReportingSystem::from_config(&config, ledger, exceptions.clone(), None).unwrap();
    system.start(&[ClientId(1), ClientId(2)]).await.unwrap();

    let status = system.status();
    assert_eq!(status.mode, ReportingMode::PerQueue);
    assert_eq!(status.clients.len(), 2);
    for client in &status.clients {
        assert_eq!(client.queued, 1);
        assert!(client.timer_running);
        assert!(!client.pending_read);
    }
    assert_eq!(exceptions.raised(PENDING, 1), 1);

    let record = system
        .handler()
        .get_next_unread_handpay_transaction(ClientId(2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.transaction_id(), TransactionId(7));
    assert_eq!(record.amount(), 2_500);
}

#[tokio::test(start_paused = true)]
async fn test_connect_twice_returns_the_registered_queue() {
    let system = HandpayReportingSystem::from_config(
        &HandpayReportingConfig::default(),
        Arc::new(InMemoryLedger::new()),
        Arc::new(RecordingExceptionSink::new()),
        None,
    )
    .unwrap();

    let first = system.connect_client(ClientId(3)).await.unwrap();
    let second = system.connect_client(ClientId(3)).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    system.disconnect_client(ClientId(3)).unwrap();
    assert!(system.status().clients.is_empty());
    assert!(!first.has_listener());

    let err = system.disconnect_client(ClientId(3)).unwrap_err();
    assert!(matches!(err, HandpayError::UnknownClient(ClientId(3))));
}

#[tokio::test]
async fn test_file_backend_requires_directory() {
    let mut config = HandpayReportingConfig::default();
    config.store.backend = StoreBackend::File;

    let result = HandpayReportingSystem::from_config(
        &config,
        Arc::new(InMemoryLedger::new()),
        Arc::new(RecordingExceptionSink::new()),
        None,
    );
    assert!(result.is_err());
}
