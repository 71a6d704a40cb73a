//! Wire framing specs

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test]
async fn raw_session_matches_documented_format() {
    let mut store = Store::empty();
    store.start().await;
    let mut client = store.client().await;

    client.send_raw(b"NEW_TXN -1 0 0\r\n\r\nout.txt\r\n").await;
    assert_eq!(client.recv().await.encode(), b"ACK 0 0 0 0 \r\n\r\n".to_vec());

    client.send_raw(b"WRITE 0 1 5\r\n\r\nAAAAA\r\n").await;
    assert_eq!(client.recv().await.encode(), b"ACK 0 1 0 0 \r\n\r\n".to_vec());

    client.send_raw(b"COMMIT 0 1 0\r\n").await;
    assert_eq!(
        client.recv().await.encode(),
        b"SUCCESS 0 1 0 0 \r\n\r\n".to_vec()
    );
}

#[tokio::test]
async fn bare_newlines_and_blank_lines_are_tolerated() {
    let mut store = Store::empty();
    store.start().await;
    let mut client = store.client().await;

    client
        .send_raw(b"\n\nNEW_TXN -1 0 0\n\nout.txt\n\nWRITE 0 1 2\n\nhi\n\n\nCOMMIT 0 1 0\n")
        .await;

    client.recv().await.passes();
    client.recv().await.passes();
    assert_eq!(client.recv().await.status, Status::Success);
    assert_eq!(store.read_str("out.txt"), "hi");
}

#[tokio::test]
async fn missing_sequences_each_get_an_error() {
    let mut store = Store::empty();
    store.start().await;
    let mut client = store.client().await;

    let txn = client.begin("out.txt").await;
    client.write(txn, 3, "c").await.passes();
    let first = client.commit(txn, 3).await;
    let second = client.recv().await;

    first.fails_with(ErrorCode::MissingSequence).reason_is("1 2");
    second.fails_with(ErrorCode::MissingSequence).reason_is("1 2");
    assert_eq!((first.seq, second.seq), (1, 2));
}

#[tokio::test]
async fn garbage_header_is_rejected_and_connection_closed() {
    let mut store = Store::empty();
    store.start().await;
    let mut client = store.client().await;

    client.send_raw(b"HELLO there\r\n").await;

    client.recv().await.fails_with(ErrorCode::Malformed);
    assert!(client.is_closed().await);

    // Other connections are unaffected
    let mut other = store.client().await;
    other.begin("fine.txt").await;
}
