// Integration tests for interactive transactions, batches and pool limits

mod common;

use std::thread;
use std::time::Duration;

use common::{client, client_with};
use folio_core::errors::{ExError, ExErrorKind};
use folio_core::model::{CreateTag, Tag};
use folio_core::query::{Filter, Unique};
use folio_store::{BatchOp, Repositories, StoreConfig, Transaction, TxOptions};

#[test]
fn test_transaction_commits_all_writes() {
    let client = client();

    let (a, b) = client
        .transaction(TxOptions::new(), |tx| {
            let a = tx.tags().create(CreateTag::new("a"))?;
            let b = tx.tags().create(CreateTag::new("b"))?;
            // reads inside the transaction see its own writes
            assert_eq!(tx.tags().count(None)?, 2);
            Ok((a, b))
        })
        .unwrap();

    assert_eq!(client.tags().count(None).unwrap(), 2);
    assert!(client.tags().find_unique(Unique::id(&a.id)).unwrap().is_some());
    assert!(client.tags().find_unique(Unique::id(&b.id)).unwrap().is_some());
}

#[test]
fn test_error_in_body_rolls_back_everything() {
    // Given
    let client = client();

    // When
    let err = client
        .transaction(TxOptions::new(), |tx| {
            tx.tags().create(CreateTag::new("kept?"))?;
            Err::<(), _>(ExError::validation("caller aborted"))
        })
        .unwrap_err();

    // Then
    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert_eq!(err.op(), Some("transaction"));
    assert_eq!(client.tags().count(None).unwrap(), 0);
}

#[test]
fn test_failed_statement_rolls_back_earlier_writes() {
    let client = client();
    client.tags().create(CreateTag::new("taken")).unwrap();

    let err = client
        .transaction(TxOptions::new(), |tx| {
            tx.tags().create(CreateTag::new("fresh"))?;
            tx.tags().create(CreateTag::new("taken"))
        })
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Conflict);
    assert_eq!(err.entity(), Some("Tag"));
    assert_eq!(
        client
            .tags()
            .count(Some(Filter::eq("name", "fresh")))
            .unwrap(),
        0
    );
}

#[test]
fn test_caught_error_inside_transaction_keeps_other_writes() {
    let client = client();
    client.tags().create(CreateTag::new("taken")).unwrap();

    client
        .transaction(TxOptions::new(), |tx| {
            tx.tags().create(CreateTag::new("first"))?;
            let dup = tx.tags().create(CreateTag::new("taken"));
            assert!(dup.is_err());
            tx.tags().create(CreateTag::new("second"))?;
            Ok(())
        })
        .unwrap();

    assert_eq!(client.tags().count(None).unwrap(), 3);
}

#[test]
fn test_transaction_past_timeout_fails_and_rolls_back() {
    let client = client();

    let err = client
        .transaction(TxOptions::new().timeout(Duration::from_millis(50)), |tx| {
            tx.tags().create(CreateTag::new("slow"))?;
            thread::sleep(Duration::from_millis(120));
            Ok(())
        })
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Timeout);
    assert_eq!(client.tags().count(None).unwrap(), 0);
}

#[test]
fn test_statement_after_deadline_is_timeout() {
    let client = client();

    let err = client
        .transaction(TxOptions::new().timeout(Duration::from_millis(30)), |tx| {
            thread::sleep(Duration::from_millis(80));
            assert_eq!(tx.remaining(), Duration::ZERO);
            tx.tags().count(None)
        })
        .unwrap_err();

    assert_eq!(err.kind(), ExErrorKind::Timeout);
}

#[test]
fn test_max_wait_exceeded_is_timeout() {
    // Given: an in-memory store has a single connection, held by the outer transaction
    let client = client();

    // When
    let inner = client
        .transaction(TxOptions::new(), |_outer| {
            Ok(client.transaction(TxOptions::new().max_wait(Duration::from_millis(20)), |_| Ok(())))
        })
        .unwrap();

    // Then
    let err = inner.unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Timeout);
}

#[test]
fn test_repository_call_on_exhausted_pool_is_store_unavailable() {
    let client = client_with(StoreConfig::in_memory().with_acquire_timeout(Duration::from_millis(20)));

    let outside = client
        .transaction(TxOptions::new(), |_tx| Ok(client.tags().count(None)))
        .unwrap();

    let err = outside.unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::StoreUnavailable);
    assert_eq!(err.op(), Some("count"));
}

#[test]
fn test_batch_runs_in_order_and_is_atomic() {
    let client = client();

    let ops: Vec<BatchOp<'_, Tag>> = vec![
        Box::new(|tx: &Transaction<'_>| tx.tags().create(CreateTag::new("one"))),
        Box::new(|tx: &Transaction<'_>| tx.tags().create(CreateTag::new("two"))),
    ];
    let tags = client.batch(ops).unwrap();

    let failing: Vec<BatchOp<'_, Tag>> = vec![
        Box::new(|tx: &Transaction<'_>| tx.tags().create(CreateTag::new("three"))),
        Box::new(|tx: &Transaction<'_>| tx.tags().create(CreateTag::new("one"))),
    ];
    let err = client.batch(failing).unwrap_err();

    assert_eq!(tags.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(), ["one", "two"]);
    assert_eq!(err.kind(), ExErrorKind::Conflict);
    assert_eq!(client.tags().count(None).unwrap(), 2);
}

#[test]
fn test_file_store_allows_concurrent_readers() {
    // Given: a file database with a pool of several connections
    let dir = tempfile::tempdir().unwrap();
    let client = client_with(StoreConfig::file(dir.path().join("folio.db")).with_max_connections(4));
    client.tags().create(CreateTag::new("shared")).unwrap();

    // When: readers run while a transaction holds the write lock
    let seen = client
        .transaction(TxOptions::new(), |tx| {
            tx.tags().create(CreateTag::new("pending"))?;
            let outside = thread::scope(|scope| {
                scope
                    .spawn(|| client.tags().count(None))
                    .join()
                    .unwrap()
            })?;
            Ok(outside)
        })
        .unwrap();

    // Then: the outside reader saw only committed data
    assert_eq!(seen, 1);
    assert_eq!(client.tags().count(None).unwrap(), 2);
}
