//! Integration tests for concurrent chunk submission.

mod common;

use axum::http::StatusCode;
use common::TestServer;
use common::fixtures::{create_upload, put_chunk};

#[tokio::test]
async fn test_duplicate_final_chunk_completes_exactly_once() {
    let server = TestServer::new().await;
    let upload_id = create_upload(&server.router, "kit.zip", "application/zip").await;

    let (status, _) = put_chunk(&server.router, &upload_id, 0, 2, b"AAAA").await;
    assert_eq!(status, StatusCode::OK);

    // Two clients re-send the final chunk at the same instant.
    let router_a = server.router.clone();
    let router_b = server.router.clone();
    let id_a = upload_id.clone();
    let id_b = upload_id.clone();
    let (a, b) = tokio::join!(
        tokio::spawn(async move { put_chunk(&router_a, &id_a, 1, 2, b"BBBB").await }),
        tokio::spawn(async move { put_chunk(&router_b, &id_b, 1, 2, b"BBBB").await }),
    );
    let results = [a.unwrap(), b.unwrap()];

    let completions = results
        .iter()
        .filter(|(_, body)| body.get("remote_id").is_some())
        .count();
    assert_eq!(completions, 1, "exactly one request relays the upload: {results:?}");

    // The loser saw either a plain ack or the already-claimed session.
    for (status, body) in &results {
        if body.get("remote_id").is_none() {
            assert!(
                *status == StatusCode::OK || *status == StatusCode::NOT_FOUND,
                "unexpected loser response: {status} {body}"
            );
        }
    }

    // No duplicate remote uploads.
    let objects = server.stored_objects();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].1, b"AAAABBBB");
}

#[tokio::test]
async fn test_concurrent_distinct_chunks_lose_nothing() {
    let server = TestServer::new().await;
    let upload_id = create_upload(&server.router, "beat.wav", "audio/wav").await;

    const TOTAL: u32 = 16;
    let mut handles = Vec::new();
    for i in 0..TOTAL {
        let router = server.router.clone();
        let id = upload_id.clone();
        handles.push(tokio::spawn(async move {
            put_chunk(&router, &id, i, TOTAL, &[b'a' + (i as u8 % 26); 8]).await
        }));
    }

    let mut completions = 0;
    for handle in handles {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        if body.get("remote_id").is_some() {
            completions += 1;
        }
    }
    assert_eq!(completions, 1);

    // Every chunk survived, in index order.
    let objects = server.stored_objects();
    assert_eq!(objects.len(), 1);
    let payload = &objects[0].1;
    assert_eq!(payload.len(), TOTAL as usize * 8);
    for i in 0..TOTAL as usize {
        assert_eq!(payload[i * 8..(i + 1) * 8], [b'a' + (i as u8 % 26); 8]);
    }
}
