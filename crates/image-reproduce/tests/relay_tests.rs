//! Integration tests for the streaming relay
//!
//! Upstream is simulated with an mpsc channel so tests control exactly when
//! bytes arrive and can observe when the relay lets go of the upstream.

use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use image_reproduce::ReproduceError;
use image_reproduce::relay::{Frame, encode_frames, relay};

type Chunk = image_reproduce::Result<Bytes>;

fn channel() -> (mpsc::Sender<Chunk>, ReceiverStream<Chunk>) {
    let (tx, rx) = mpsc::channel(16);
    (tx, ReceiverStream::new(rx))
}

#[tokio::test]
async fn test_frames_arrive_as_upstream_produces_them() {
    let (tx, upstream) = channel();
    let mut frames = Box::pin(relay(upstream));

    tx.send(Ok(Bytes::from_static(b"data: {\"n\":1}\n\n"))).await.unwrap();
    assert_eq!(frames.next().await, Some(Frame::Data(r#"{"n":1}"#.to_string())));

    tx.send(Ok(Bytes::from_static(b"data: {\"n\":2}\n\n"))).await.unwrap();
    assert_eq!(frames.next().await, Some(Frame::Data(r#"{"n":2}"#.to_string())));

    drop(tx);
    assert_eq!(frames.next().await, Some(Frame::End));
    assert_eq!(frames.next().await, None);
}

#[tokio::test]
async fn test_dropping_relay_releases_upstream() {
    let (tx, upstream) = channel();
    let mut frames = Box::pin(relay(upstream));

    tx.send(Ok(Bytes::from_static(b"data: {\"n\":1}\n\n"))).await.unwrap();
    assert!(frames.next().await.is_some());
    assert!(!tx.is_closed());

    // Client went away
    drop(frames);

    assert!(tx.is_closed());
    assert!(tx.send(Ok(Bytes::from_static(b"data: {}\n\n"))).await.is_err());
}

#[tokio::test]
async fn test_payload_split_byte_by_byte() {
    let body = b"data: {\"text\":\"h\xC3\xA9llo\"}\n\ndata: [DONE]\n\n";
    let chunks: Vec<Chunk> = body
        .iter()
        .map(|b| Ok(Bytes::copy_from_slice(std::slice::from_ref(b))))
        .collect();

    let frames: Vec<Frame> = relay(stream::iter(chunks)).collect().await;

    assert_eq!(
        frames,
        vec![
            Frame::Data("{\"text\":\"h\u{e9}llo\"}".to_string()),
            Frame::End
        ]
    );
}

#[tokio::test]
async fn test_events_split_across_uneven_chunks() {
    let chunks: Vec<Chunk> = vec![
        Ok(Bytes::from_static(b": keep-alive\n\nda")),
        Ok(Bytes::from_static(b"ta: {\"a\":1}\n")),
        Ok(Bytes::from_static(b"\ndata: {\"a\"")),
        Ok(Bytes::from_static(b":2}\r\n\r\n")),
    ];

    let frames: Vec<Frame> = relay(stream::iter(chunks)).collect().await;

    assert_eq!(
        frames,
        vec![
            Frame::Data(r#"{"a":1}"#.to_string()),
            Frame::Data(r#"{"a":2}"#.to_string()),
            Frame::End
        ]
    );
}

#[tokio::test]
async fn test_failure_after_partial_output_encodes_error_last() {
    let (tx, upstream) = channel();
    tx.send(Ok(Bytes::from_static(b"data: {\"a\":1}\n\n"))).await.unwrap();
    tx.send(Err(ReproduceError::Timeout("read timed out".to_string())))
        .await
        .unwrap();
    drop(tx);

    let body: Vec<u8> = encode_frames(relay(upstream))
        .map(|chunk| chunk.unwrap_or_default())
        .collect::<Vec<Bytes>>()
        .await
        .concat();
    let body = String::from_utf8(body).unwrap();

    assert_eq!(
        body,
        "data: {\"a\":1}\n\ndata: {\"error\":\"Request timed out: read timed out\"}\n\n"
    );
}

#[tokio::test]
async fn test_multi_megabyte_event_in_small_chunks() {
    let payload = format!("{{\"b\":\"{}\"}}", "A".repeat(4 * 1024 * 1024));
    let body = format!("data: {payload}\n\ndata: [DONE]\n\n");
    let chunks: Vec<Chunk> = body
        .as_bytes()
        .chunks(8 * 1024)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();

    let started = std::time::Instant::now();
    let frames: Vec<Frame> = relay(stream::iter(chunks)).collect().await;

    assert_eq!(frames, vec![Frame::Data(payload), Frame::End]);
    assert!(
        started.elapsed() < std::time::Duration::from_secs(10),
        "relay took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_endless_line_fails_stream() {
    let (tx, upstream) = channel();
    let mut frames = Box::pin(image_reproduce::relay::relay_with_limit(upstream, 1024));

    tx.send(Ok(Bytes::from_static(b"data: {\"a\":1}\n\ndata: \"")))
        .await
        .unwrap();
    assert_eq!(frames.next().await, Some(Frame::Data(r#"{"a":1}"#.to_string())));

    for _ in 0..4 {
        tx.send(Ok(Bytes::from(vec![b'x'; 512]))).await.unwrap();
    }

    assert!(matches!(frames.next().await, Some(Frame::Error(m)) if m.contains("exceeds 1024 bytes")));
    assert_eq!(frames.next().await, None);
}
