use super::*;
use crate::types::{EventKind, RequestId};

#[tokio::test]
async fn cancel_resolves_waiter_and_removes_record() {
    let (coordinator, engine, durable, temp_dir) = create_test_coordinator().await;
    let mut events = coordinator.subscribe();
    let src = source("big.iso");
    let handle = coordinator
        .schedule(&src, temp_dir.path().join("big.iso"))
        .await
        .unwrap();

    assert!(coordinator.cancel(&src).await.unwrap());

    assert_eq!(handle.await, Err(TransferError::Cancelled));
    assert_eq!(engine.cancelled(), vec![RequestId::from_source(&src)]);
    assert!(durable.snapshot().is_empty());
    wait_for_event(&mut events, |e| matches!(e, Event::Cancelled { .. })).await;
}

#[tokio::test]
async fn late_event_after_cancel_is_orphaned() {
    let (coordinator, _engine, _durable, temp_dir) = create_test_coordinator().await;
    let mut events = coordinator.subscribe();
    let src = source("late");
    let dest = temp_dir.path().join("late");
    let _handle = coordinator.schedule(&src, &dest).await.unwrap();
    coordinator.cancel(&src).await.unwrap();

    coordinator
        .event_sink()
        .finished(ok_task(&src), &engine_file(temp_dir.path(), "late", b"x"));

    let event = wait_for_event(&mut events, |e| matches!(e, Event::Orphaned { .. })).await;
    assert!(matches!(
        event,
        Event::Orphaned {
            kind: EventKind::Finished,
            ..
        }
    ));
    coordinator.on_batch_drained().await;
    assert!(!dest.exists());
}

#[tokio::test]
async fn cancel_unknown_request_is_a_no_op() {
    let (coordinator, engine, _durable, _temp_dir) = create_test_coordinator().await;

    assert!(!coordinator.cancel(&source("never-scheduled")).await.unwrap());
    assert!(engine.cancelled().is_empty());
}

#[tokio::test]
async fn cancelled_identity_can_be_scheduled_again() {
    let (coordinator, engine, _durable, temp_dir) = create_test_coordinator().await;
    let src = source("retry");
    let _first = coordinator
        .schedule(&src, temp_dir.path().join("retry"))
        .await
        .unwrap();
    coordinator.cancel(&src).await.unwrap();

    let _second = coordinator
        .schedule(&src, temp_dir.path().join("retry"))
        .await
        .unwrap();
    assert_eq!(engine.begun().len(), 2);
}
