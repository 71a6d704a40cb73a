//! Abort specs

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test]
async fn abort_leaves_no_trace() {
    let mut store = Store::empty();
    store.start().await;
    let mut client = store.client().await;

    let txn = client.begin("out.txt").await;
    client.write(txn, 1, "discarded").await.passes();
    client.abort(txn).await.passes();

    assert!(!store.has("out.txt"));
    assert_eq!(store.log_files(), Vec::<String>::new());
}

#[tokio::test]
async fn aborted_transaction_is_unknown() {
    let mut store = Store::empty();
    store.start().await;
    let mut client = store.client().await;

    let txn = client.begin("out.txt").await;
    client.abort(txn).await.passes();

    client
        .write(txn, 1, "late")
        .await
        .fails_with(ErrorCode::UnknownTransaction);
    client
        .abort(txn)
        .await
        .fails_with(ErrorCode::UnknownTransaction);
}

#[tokio::test]
async fn abort_keeps_existing_file_untouched() {
    let mut store = Store::empty();
    store.file("data", b"keep");
    store.start().await;
    let mut client = store.client().await;

    let txn = client.begin("data").await;
    client.write(txn, 1, "drop").await.passes();
    client.abort(txn).await.passes();

    assert_eq!(store.read_str("data"), "keep");
}
