use super::*;
use crate::config::DuplicatePolicy;
use crate::types::RequestId;

#[tokio::test]
async fn schedule_records_destination_then_begins_transfer() {
    let (coordinator, engine, durable, temp_dir) = create_test_coordinator().await;
    let mut events = coordinator.subscribe();
    let src = source("a.jpg");
    let dest = temp_dir.path().join("out/a.jpg");

    let _handle = coordinator.schedule(&src, &dest).await.unwrap();

    assert_eq!(
        durable.snapshot().get(src.as_str()),
        Some(&dest.to_string_lossy().into_owned())
    );
    assert_eq!(engine.begun(), vec![RequestId::from_source(&src)]);
    assert!(matches!(
        events.recv().await.unwrap(),
        Event::Scheduled { id, destination } if id.as_str() == src.as_str() && destination == dest
    ));
}

#[tokio::test]
async fn finished_and_failed_batch_resolves_both_then_signals_once() {
    let (coordinator, _engine, durable, temp_dir) = create_test_coordinator().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    coordinator.set_completion_handler(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let a = source("a");
    let b = source("b");
    let dest_a = temp_dir.path().join("tmp/a");
    let dest_b = temp_dir.path().join("tmp/b");
    let handle_a = coordinator.schedule(&a, &dest_a).await.unwrap();
    let handle_b = coordinator.schedule(&b, &dest_b).await.unwrap();

    let sink = coordinator.event_sink();
    let payload = engine_file(temp_dir.path(), "a.download", b"contents of a");
    sink.finished(ok_task(&a), &payload);
    sink.failed(RequestId::from_source(&b), "networkError".to_string());

    let report = coordinator.on_batch_drained().await;

    assert_eq!(handle_a.await.unwrap(), dest_a);
    assert_eq!(
        handle_b.await,
        Err(TransferError::ClientError {
            cause: "networkError".to_string()
        })
    );
    assert_eq!(std::fs::read(&dest_a).unwrap(), b"contents of a");
    assert!(!dest_b.exists());
    assert!(durable.snapshot().is_empty());
    assert!(report.signalled);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(coordinator.pending_jobs(), 0);
}

#[tokio::test]
async fn non_success_status_resolves_server_error() {
    let (coordinator, _engine, durable, temp_dir) = create_test_coordinator().await;
    let src = source("missing");
    let handle = coordinator
        .schedule(&src, temp_dir.path().join("out/missing"))
        .await
        .unwrap();

    let payload = engine_file(temp_dir.path(), "missing.download", b"<html>404</html>");
    coordinator.event_sink().finished(
        TaskInfo::new(&src, Some(ResponseInfo { status: 404 })),
        &payload,
    );

    assert_eq!(
        handle.await,
        Err(TransferError::ServerError {
            status: Some(ResponseInfo { status: 404 })
        })
    );
    coordinator.on_batch_drained().await;
    assert!(durable.snapshot().is_empty());
}

#[tokio::test]
async fn download_waits_for_outcome() {
    let (coordinator, _engine, _durable, temp_dir) = create_test_coordinator().await;
    let mut events = coordinator.subscribe();
    let src = source("report.pdf");
    let dest = temp_dir.path().join("out/report.pdf");

    let task = {
        let coordinator = coordinator.clone();
        let src = src.clone();
        let dest = dest.clone();
        tokio::spawn(async move { coordinator.download(&src, dest).await })
    };

    wait_for_event(&mut events, |e| matches!(e, Event::Scheduled { .. })).await;
    let payload = engine_file(temp_dir.path(), "report.download", b"pdf");
    coordinator.event_sink().finished(ok_task(&src), &payload);

    assert_eq!(task.await.unwrap().unwrap(), dest);
}

#[tokio::test]
async fn download_surfaces_transfer_error() {
    let (coordinator, _engine, _durable, temp_dir) = create_test_coordinator().await;
    let mut events = coordinator.subscribe();
    let src = source("flaky");

    let task = {
        let coordinator = coordinator.clone();
        let src = src.clone();
        let dest = temp_dir.path().join("out/flaky");
        tokio::spawn(async move { coordinator.download(&src, dest).await })
    };

    wait_for_event(&mut events, |e| matches!(e, Event::Scheduled { .. })).await;
    coordinator
        .event_sink()
        .failed(RequestId::from_source(&src), "timed out".to_string());

    assert!(matches!(
        task.await.unwrap(),
        Err(Error::Transfer(TransferError::ClientError { .. }))
    ));
}

#[tokio::test]
async fn duplicate_schedule_is_rejected_by_default() {
    let (coordinator, engine, durable, temp_dir) = create_test_coordinator().await;
    let src = source("a");
    let first = temp_dir.path().join("first");

    let _handle = coordinator.schedule(&src, &first).await.unwrap();
    let err = coordinator
        .schedule(&src, temp_dir.path().join("second"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Duplicate(_)));
    assert_eq!(engine.begun().len(), 1);
    assert_eq!(
        durable.snapshot().get(src.as_str()),
        Some(&first.to_string_lossy().into_owned())
    );
}

#[tokio::test]
async fn replace_policy_cancels_outstanding_request() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.duplicate_policy = DuplicatePolicy::Replace;
    let durable = Arc::new(crate::store::MemoryStore::new());
    let (coordinator, engine) = coordinator_with(config, durable.clone()).await;

    let src = source("a");
    let first = coordinator
        .schedule(&src, temp_dir.path().join("first"))
        .await
        .unwrap();
    let second_dest = temp_dir.path().join("second");
    let _second = coordinator.schedule(&src, &second_dest).await.unwrap();

    assert_eq!(first.await, Err(TransferError::Cancelled));
    assert_eq!(engine.cancelled(), vec![RequestId::from_source(&src)]);
    assert_eq!(engine.begun().len(), 2);
    assert_eq!(
        durable.snapshot().get(src.as_str()),
        Some(&second_dest.to_string_lossy().into_owned())
    );
}

#[tokio::test]
async fn replace_policy_orphans_report_for_cancelled_transfer() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.duplicate_policy = DuplicatePolicy::Replace;
    let (coordinator, engine) =
        coordinator_with(config, Arc::new(crate::store::MemoryStore::new())).await;
    engine.report_on_cancel();
    let mut events = coordinator.subscribe();

    let src = source("a");
    let first = coordinator
        .schedule(&src, temp_dir.path().join("first"))
        .await
        .unwrap();
    let second_dest = temp_dir.path().join("second");
    let mut second = coordinator.schedule(&src, &second_dest).await.unwrap();

    assert_eq!(first.await, Err(TransferError::Cancelled));
    // The engine's failure report for the first transfer did not settle the second
    assert!(second.try_outcome().is_none());
    let orphaned = wait_for_event(&mut events, |e| matches!(e, Event::Orphaned { .. })).await;
    assert!(matches!(
        orphaned,
        Event::Orphaned {
            kind: crate::types::EventKind::Failed,
            ..
        }
    ));

    coordinator.event_sink().finished(
        ok_task(&src),
        &engine_file(temp_dir.path(), "second", b"second"),
    );
    assert_eq!(second.await.unwrap(), second_dest);
    assert_eq!(std::fs::read(&second_dest).unwrap(), b"second");
}

#[tokio::test]
async fn engine_refusal_leaves_nothing_recorded() {
    let (coordinator, engine, durable, temp_dir) = create_test_coordinator().await;
    engine.refuse_begin();

    let err = coordinator
        .schedule(&source("a"), temp_dir.path().join("a"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Engine(_)));
    assert!(durable.snapshot().is_empty());
}

#[tokio::test]
async fn fetch_returns_existing_destination_without_scheduling() {
    let (coordinator, engine, _durable, temp_dir) = create_test_coordinator().await;
    let dest = temp_dir.path().join("cached.jpg");
    std::fs::write(&dest, b"already here").unwrap();

    let location = coordinator.fetch(&source("cached.jpg"), &dest).await.unwrap();

    assert_eq!(location, dest);
    assert!(engine.begun().is_empty());
}

#[tokio::test]
async fn schedule_after_shutdown_is_rejected() {
    let (coordinator, engine, _durable, temp_dir) = create_test_coordinator().await;
    let mut events = coordinator.subscribe();

    coordinator.shutdown().await.unwrap();
    let err = coordinator
        .schedule(&source("late"), temp_dir.path().join("late"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ShuttingDown));
    assert!(engine.begun().is_empty());
    wait_for_event(&mut events, |e| matches!(e, Event::Shutdown)).await;
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.session.identifier = String::new();

    let result = DownloadCoordinator::with_store(
        config,
        Arc::new(crate::store::MemoryStore::new()),
        |_sink| Ok(Arc::new(RecordingEngine::default()) as Arc<dyn TransferEngine>),
    )
    .await;

    assert!(matches!(result, Err(Error::Config { .. })));
}
