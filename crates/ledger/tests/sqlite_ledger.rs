//! SQLite ledger tests against a temporary database file.

use std::time::Duration;

use ledger::{DEFAULT_TTL, DedupLedger, EventId, SqliteLedger};
use tempfile::TempDir;

async fn open_ledger(dir: &TempDir) -> SqliteLedger {
    SqliteLedger::open(dir.path().join("ledger.db"))
        .await
        .expect("ledger should open")
}

#[tokio::test]
async fn records_and_finds_ids() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open_ledger(&dir).await;
    let id = EventId::new();

    assert!(!ledger.exists(&id).await.unwrap());
    ledger.record(&id, DEFAULT_TTL).await.unwrap();
    assert!(ledger.exists(&id).await.unwrap());
    assert!(!ledger.exists(&EventId::new()).await.unwrap());
}

#[tokio::test]
async fn recording_twice_is_an_upsert() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open_ledger(&dir).await;
    let id = EventId::from("evt-1");

    ledger.record(&id, DEFAULT_TTL).await.unwrap();
    ledger.record(&id, DEFAULT_TTL).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processed_events")
        .fetch_one(ledger.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);

    let marker: String =
        sqlx::query_scalar("SELECT marker FROM processed_events WHERE event_id = 'evt-1'")
            .fetch_one(ledger.pool())
            .await
            .unwrap();
    assert_eq!(marker, "1");
}

#[tokio::test]
async fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let id = EventId::new();

    let ledger = open_ledger(&dir).await;
    ledger.record(&id, DEFAULT_TTL).await.unwrap();
    ledger.close().await;

    let reopened = open_ledger(&dir).await;
    assert!(reopened.exists(&id).await.unwrap());
}

#[tokio::test]
async fn expired_records_are_absent_and_purged() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open_ledger(&dir).await;
    let short = EventId::new();
    let long = EventId::new();

    ledger.record(&short, Duration::from_millis(50)).await.unwrap();
    ledger.record(&long, DEFAULT_TTL).await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    assert!(!ledger.exists(&short).await.unwrap());
    assert!(ledger.exists(&long).await.unwrap());

    assert_eq!(ledger.purge_expired().await.unwrap(), 1);
    assert_eq!(ledger.purge_expired().await.unwrap(), 0);
    assert!(ledger.exists(&long).await.unwrap());
}

#[tokio::test]
async fn rerecording_an_expired_id_makes_it_present_again() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = open_ledger(&dir).await;
    let id = EventId::new();

    ledger.record(&id, Duration::from_millis(20)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!ledger.exists(&id).await.unwrap());

    ledger.record(&id, DEFAULT_TTL).await.unwrap();
    assert!(ledger.exists(&id).await.unwrap());
}

#[tokio::test]
async fn open_fails_for_unreachable_path() {
    let dir = tempfile::tempdir().unwrap();
    let result = SqliteLedger::open(dir.path().join("missing").join("ledger.db")).await;
    assert!(result.is_err());
}
