//! Restart and crash recovery specs
//!
//! A crash is simulated by killing the serving task, or by laying out the
//! files a crash would leave before the daemon starts.

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test]
async fn open_transaction_survives_a_crash() {
    let mut store = Store::empty();
    store.start().await;
    let txn = {
        let mut client = store.client().await;
        let txn = client.begin("out.txt").await;
        client.write(txn, 1, "before ").await.passes();
        txn
    };

    store.crash().await;
    store.start().await;
    let mut client = store.client().await;
    client.write(txn, 2, "after").await.passes();
    client.commit(txn, 2).await.passes();

    assert_eq!(store.read_str("out.txt"), "before after");
}

#[tokio::test]
async fn pending_commit_survives_a_crash() {
    let mut store = Store::empty();
    store.start().await;
    let txn = {
        let mut client = store.client().await;
        let txn = client.begin("out.txt").await;
        client.write(txn, 2, "BB").await.passes();
        client.commit(txn, 2).await.fails_with(ErrorCode::MissingSequence);
        txn
    };

    store.crash().await;
    store.start().await;
    let mut client = store.client().await;
    let response = client.write(txn, 1, "AA").await;

    assert_eq!(response.status, Status::Success);
    assert_eq!(store.read_str("out.txt"), "AABB");
}

#[tokio::test]
async fn interrupted_commit_is_finished_at_startup() {
    let mut store = Store::empty();
    store.file("out.txt", b"base|");
    store.file(".log_0", b"out.txt\n1 3\nabc\n2 3\ndef\ncommit 2 5");
    store.file(".commit_0", b"");

    store.start().await;

    assert_eq!(store.read_str("out.txt"), "base|abcdef");
    assert_eq!(store.log_files(), Vec::<String>::new());
}

#[tokio::test]
async fn half_applied_commit_is_redone_once() {
    let mut store = Store::empty();
    store.file("out.txt", b"base|abc");
    store.file(".log_0", b"out.txt\n1 3\nabc\n2 3\ndef\ncommit 2 5");

    store.start().await;

    assert_eq!(store.read_str("out.txt"), "base|abcdef");
}

#[tokio::test]
async fn applied_commit_is_not_repeated() {
    let mut store = Store::empty();
    store.file("out.txt", b"base|abcdef");
    store.file(".log_0", b"out.txt\n1 3\nabc\n2 3\ndef\ncommit 2 5");

    store.start().await;
    store.crash().await;
    store.start().await;

    assert_eq!(store.read_str("out.txt"), "base|abcdef");
    assert_eq!(store.log_files(), Vec::<String>::new());
}

#[tokio::test]
async fn unreadable_log_is_discarded() {
    let mut store = Store::empty();
    store.file(".log_4", b"out.txt\nthis is not a record\nmore");
    store.file(".commit_4", b"");
    store.file(".commit_9", b"");

    store.start().await;
    let mut client = store.client().await;

    assert_eq!(store.log_files(), Vec::<String>::new());
    assert!(!store.has("out.txt"));
    client
        .write(TxnId(4), 1, "x")
        .await
        .fails_with(ErrorCode::UnknownTransaction);
}

#[tokio::test]
async fn recovered_ids_are_not_handed_out_again() {
    let mut store = Store::empty();
    store.file(".log_0", b"a.txt");
    store.file(".commit_0", b"");

    store.start().await;
    let mut client = store.client().await;

    assert_eq!(client.begin("b.txt").await, TxnId(1));
}
