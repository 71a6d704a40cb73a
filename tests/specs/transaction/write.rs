//! Write specs

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test]
async fn new_transactions_get_the_smallest_free_id() {
    let mut store = Store::empty();
    store.start().await;
    let mut client = store.client().await;

    let a = client.begin("a").await;
    let b = client.begin("b").await;
    client.abort(a).await.passes();
    let c = client.begin("c").await;

    assert_eq!(a, TxnId(0));
    assert_eq!(b, TxnId(1));
    assert_eq!(c, TxnId(0));
}

#[tokio::test]
async fn repeated_write_is_stored_once() {
    let mut store = Store::empty();
    store.start().await;
    let mut client = store.client().await;

    let txn = client.begin("out.txt").await;
    client.write(txn, 1, "once").await.passes();
    client.write(txn, 1, "once").await.passes();
    client.commit(txn, 1).await.passes();

    assert_eq!(store.read_str("out.txt"), "once");
}

#[tokio::test]
async fn write_to_unknown_transaction_fails() {
    let mut store = Store::empty();
    store.start().await;
    let mut client = store.client().await;

    let response = client.write(TxnId(12), 1, "x").await;

    response.fails_with(ErrorCode::UnknownTransaction);
    assert_eq!(response.txn, 12);
    assert_eq!(response.seq, 1);
}

#[tokio::test]
async fn sequence_zero_is_malformed() {
    let mut store = Store::empty();
    store.start().await;
    let mut client = store.client().await;

    let txn = client.begin("out.txt").await;
    client.write(txn, 0, "x").await.fails_with(ErrorCode::Malformed);
}

#[tokio::test]
async fn payload_may_contain_protocol_text() {
    let mut store = Store::empty();
    store.start().await;
    let mut client = store.client().await;

    let txn = client.begin("out.txt").await;
    client.write(txn, 1, "COMMIT 0 1 0\r\n\r\n").await.passes();
    client.write(txn, 2, "\n2 5\nfake!").await.passes();
    client.commit(txn, 2).await.passes();

    assert_eq!(
        store.read_str("out.txt"),
        "COMMIT 0 1 0\r\n\r\n\n2 5\nfake!"
    );
}

#[tokio::test]
async fn filenames_outside_the_directory_are_refused() {
    let mut store = Store::empty();
    store.start().await;
    let mut client = store.client().await;

    for name in ["../escape", "sub/dir", ".log_0"] {
        client
            .call(Request::NewTxn {
                filename: name.to_string(),
            })
            .await
            .fails_with(ErrorCode::Malformed);
    }
}

#[tokio::test]
async fn read_returns_file_contents() {
    let mut store = Store::empty();
    store.file("notes", b"hello\r\n\r\nworld");
    store.start().await;
    let mut client = store.client().await;

    client.read("notes").await.passes().reason_is("hello\r\n\r\nworld");
    client.read("absent").await.fails_with(ErrorCode::NotFound);
}
