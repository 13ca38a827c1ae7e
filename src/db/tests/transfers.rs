use crate::db::*;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_upsert_and_get_record() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    db.upsert_transfer_record("https://example.com/cat.jpg", "/downloads/cat.jpg")
        .await
        .unwrap();

    let record = db
        .get_transfer_record("https://example.com/cat.jpg")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.identity, "https://example.com/cat.jpg");
    assert_eq!(record.destination, "/downloads/cat.jpg");
    assert!(record.created_at > 0);

    db.close().await;
}

#[tokio::test]
async fn test_upsert_replaces_destination() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    db.upsert_transfer_record("k", "/first").await.unwrap();
    db.upsert_transfer_record("k", "/second").await.unwrap();

    let record = db.get_transfer_record("k").await.unwrap().unwrap();
    assert_eq!(record.destination, "/second");
    assert_eq!(db.list_transfer_records().await.unwrap().len(), 1);

    db.close().await;
}

#[tokio::test]
async fn test_delete_record_is_idempotent() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    db.upsert_transfer_record("k", "/dest").await.unwrap();

    assert!(db.delete_transfer_record("k").await.unwrap());
    assert!(!db.delete_transfer_record("k").await.unwrap());
    assert!(db.get_transfer_record("k").await.unwrap().is_none());

    db.close().await;
}

#[tokio::test]
async fn test_records_survive_reopen() {
    let temp_file = NamedTempFile::new().unwrap();

    {
        let db = Database::new(temp_file.path()).await.unwrap();
        db.upsert_transfer_record("https://example.com/a", "/tmp/a")
            .await
            .unwrap();
        db.upsert_transfer_record("https://example.com/b", "/tmp/b")
            .await
            .unwrap();
        // No clean shutdown: simulates the process being terminated mid-transfer
        db.close().await;
    }

    let db = Database::new(temp_file.path()).await.unwrap();
    let identities: Vec<String> = db
        .list_transfer_records()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.identity)
        .collect();
    assert_eq!(
        identities,
        vec![
            "https://example.com/a".to_string(),
            "https://example.com/b".to_string()
        ]
    );

    db.close().await;
}
