//! Commit specs
//!
//! Verify that committed fragments land in the target in sequence order,
//! exactly once.

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test]
async fn commit_writes_fragments_in_order() {
    let mut store = Store::empty();
    store.start().await;
    let mut client = store.client().await;

    let txn = client.begin("out.txt").await;
    client.write(txn, 1, "AAAAA").await.passes();
    client.write(txn, 2, "BBBBB").await.passes();
    let response = client.commit(txn, 2).await;

    assert_eq!(response.status, Status::Success);
    assert_eq!(store.read_str("out.txt"), "AAAAABBBBB");
}

#[tokio::test]
async fn fragments_sent_out_of_order_commit_in_order() {
    let mut store = Store::empty();
    store.start().await;
    let mut client = store.client().await;

    let txn = client.begin("out.txt").await;
    for (seq, data) in [(3, "c"), (1, "a"), (4, "d"), (2, "b")] {
        client.write(txn, seq, data).await.passes();
    }
    client.commit(txn, 4).await.passes();

    assert_eq!(store.read_str("out.txt"), "abcd");
}

#[tokio::test]
async fn committed_transaction_is_gone() {
    let mut store = Store::empty();
    store.start().await;
    let mut client = store.client().await;

    let txn = client.begin("out.txt").await;
    client.write(txn, 1, "x").await.passes();
    client.commit(txn, 1).await.passes();

    client
        .commit(txn, 1)
        .await
        .fails_with(ErrorCode::UnknownTransaction);
    assert_eq!(store.log_files(), Vec::<String>::new());
    assert_eq!(store.read_str("out.txt"), "x");
}

#[tokio::test]
async fn commit_appends_after_existing_content() {
    let mut store = Store::empty();
    store.file("journal", b"day 1\n");
    store.start().await;
    let mut client = store.client().await;

    let txn = client.begin("journal").await;
    client.write(txn, 1, "day 2\n").await.passes();
    client.commit(txn, 1).await.passes();

    assert_eq!(store.read_str("journal"), "day 1\nday 2\n");
}

#[tokio::test]
async fn commit_with_gap_names_the_gap() {
    let mut store = Store::empty();
    store.start().await;
    let mut client = store.client().await;

    let txn = client.begin("out.txt").await;
    client.write(txn, 2, "BB").await.passes();

    client
        .commit(txn, 2)
        .await
        .fails_with(ErrorCode::MissingSequence)
        .reason_is("1");
    assert!(!store.has("out.txt"));
}

#[tokio::test]
async fn filling_the_gap_completes_the_commit() {
    let mut store = Store::empty();
    store.start().await;
    let mut client = store.client().await;

    let txn = client.begin("out.txt").await;
    client.write(txn, 2, "BB").await.passes();
    client.commit(txn, 2).await.fails_with(ErrorCode::MissingSequence);

    let response = client.write(txn, 1, "AA").await;

    assert_eq!(response.status, Status::Success);
    assert_eq!(store.read_str("out.txt"), "AABB");
    assert_eq!(store.log_files(), Vec::<String>::new());
}

#[tokio::test]
async fn transactions_on_one_file_commit_whole() {
    let mut store = Store::empty();
    store.start().await;
    let mut first = store.client().await;
    let mut second = store.client().await;

    let a = first.begin("shared").await;
    let b = second.begin("shared").await;
    first.write(a, 1, "aaaa").await.passes();
    second.write(b, 1, "bbbb").await.passes();
    first.write(a, 2, "AAAA").await.passes();
    second.write(b, 2, "BBBB").await.passes();
    second.commit(b, 2).await.passes();
    first.commit(a, 2).await.passes();

    assert_eq!(store.read_str("shared"), "bbbbBBBBaaaaAAAA");
}
