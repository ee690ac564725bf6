//! Tests for line framing and pipe readers.

use claude_code_stream::cli::StreamParser;
use tokio::io::AsyncWriteExt;

async fn collect_lines(mut rx: tokio::sync::mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(line) = rx.recv().await {
        lines.push(line);
    }
    lines
}

#[tokio::test]
async fn into_lines_frames_chunks() {
    let (reader, mut writer) = tokio::io::duplex(1024);

    tokio::spawn(async move {
        writer.write_all(b"{\"type\":").await.unwrap();
        writer.write_all(b"\"error\"}\n\n   \nfirst ").await.unwrap();
        writer.write_all(b"half\nno terminator").await.unwrap();
        drop(writer);
    });

    let mut rx = StreamParser::into_lines(reader);

    assert_eq!(rx.recv().await.as_deref(), Some(r#"{"type":"error"}"#));
    assert_eq!(rx.recv().await.as_deref(), Some("first half"));
    assert_eq!(rx.recv().await.as_deref(), Some("no terminator"));

    // Channel should close after EOF
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn into_lines_byte_at_a_time() {
    let (reader, mut writer) = tokio::io::duplex(16);
    let input = b"{\"type\":\"error\"}\nsecond line\r\n\nthird".to_vec();

    tokio::spawn(async move {
        for byte in input {
            writer.write_all(&[byte]).await.unwrap();
            writer.flush().await.unwrap();
        }
        drop(writer);
    });

    let lines = collect_lines(StreamParser::into_lines(reader)).await;
    assert_eq!(lines, vec![r#"{"type":"error"}"#, "second line", "third"]);
}

#[tokio::test]
async fn into_lines_handles_line_larger_than_buffer() {
    let (reader, mut writer) = tokio::io::duplex(64);
    let long = "x".repeat(32 * 1024);
    let expected = long.clone();

    tokio::spawn(async move {
        writer.write_all(long.as_bytes()).await.unwrap();
        writer.write_all(b"\nshort\n").await.unwrap();
        drop(writer);
    });

    let lines = collect_lines(StreamParser::into_lines(reader)).await;
    assert_eq!(lines, vec![expected, "short".to_string()]);
}

#[tokio::test]
async fn into_text_preserves_arrival_order() {
    let (reader, mut writer) = tokio::io::duplex(1024);

    tokio::spawn(async move {
        writer.write_all(b"disk ").await.unwrap();
        writer.write_all(b"full\n").await.unwrap();
        writer.write_all(b"\nretry failed").await.unwrap();
        drop(writer);
    });

    let collected = collect_lines(StreamParser::into_text(reader)).await.concat();
    assert_eq!(collected, "disk full\n\nretry failed");
}

#[tokio::test]
async fn into_text_reassembles_split_utf8() {
    let (reader, mut writer) = tokio::io::duplex(1024);
    let bytes = "erreur: é".as_bytes().to_vec();

    tokio::spawn(async move {
        let split = bytes.len() - 1;
        writer.write_all(&bytes[..split]).await.unwrap();
        writer.flush().await.unwrap();
        tokio::task::yield_now().await;
        writer.write_all(&bytes[split..]).await.unwrap();
        drop(writer);
    });

    let collected = collect_lines(StreamParser::into_text(reader)).await.concat();
    assert_eq!(collected, "erreur: é");
}
