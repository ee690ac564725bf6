//! Tests for the session pull loop, driven through in-memory pipes.

use claude_code_stream::adapter::{
    normalize, ApiStreamChunk, ChunkStream, ClaudeCodeError, ProcessOutcome, SessionInputs,
    StopReasonPolicy, MISSING_RESULT_MESSAGE, MODEL_PLAN_MISMATCH_HINT,
};
use claude_code_stream::cli::SpawnError;
use futures_util::StreamExt;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::oneshot;

use crate::support::{assistant_text, result_line, INIT_METERED, INIT_SUBSCRIPTION};

struct FakeSession {
    stdout: DuplexStream,
    stderr: DuplexStream,
    exit: oneshot::Sender<ProcessOutcome>,
    stream: ChunkStream,
}

fn fake_session(policy: StopReasonPolicy) -> FakeSession {
    let (stdout_reader, stdout) = tokio::io::duplex(64 * 1024);
    let (stderr_reader, stderr) = tokio::io::duplex(64 * 1024);
    let (exit, exit_rx) = oneshot::channel();
    let inputs = SessionInputs::from_readers(stdout_reader, stderr_reader, exit_rx);
    FakeSession {
        stdout,
        stderr,
        exit,
        stream: normalize(inputs, policy),
    }
}

/// Feed a whole session up front, then collect everything it yields.
async fn run_session(
    lines: &[String],
    stderr: &str,
    outcome: ProcessOutcome,
) -> (Vec<ApiStreamChunk>, Option<ClaudeCodeError>) {
    let mut session = fake_session(StopReasonPolicy::Strict);
    for line in lines {
        session.stdout.write_all(line.as_bytes()).await.unwrap();
        session.stdout.write_all(b"\n").await.unwrap();
    }
    session.stderr.write_all(stderr.as_bytes()).await.unwrap();
    drop(session.stdout);
    drop(session.stderr);
    // Sent before any line is consumed: must still apply last.
    let _ = session.exit.send(outcome);

    let mut chunks = Vec::new();
    let mut error = None;
    while let Some(item) = session.stream.next().await {
        match item {
            Ok(chunk) => chunks.push(chunk),
            Err(e) => {
                assert!(error.is_none(), "more than one error yielded");
                error = Some(e);
            }
        }
    }
    (chunks, error)
}

fn usage_of(chunk: &ApiStreamChunk) -> claude_code_stream::adapter::UsageChunk {
    match chunk {
        ApiStreamChunk::Usage(usage) => *usage,
        other => panic!("Expected Usage chunk, got {other:?}"),
    }
}

#[tokio::test]
async fn subscription_session_reports_zero_cost() {
    let lines = vec![
        INIT_SUBSCRIPTION.to_string(),
        assistant_text("hello", 5, 2),
        result_line(0.01),
    ];
    let (chunks, error) = run_session(&lines, "", ProcessOutcome::Exited(Some(0))).await;

    assert!(error.is_none());
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0], ApiStreamChunk::text("hello"));
    let usage = usage_of(&chunks[1]);
    assert_eq!(usage.input_tokens, 5);
    assert_eq!(usage.output_tokens, 2);
    assert!(usage.total_cost_usd.abs() < f64::EPSILON);
}

#[tokio::test]
async fn metered_session_reports_cost_and_sums_tokens() {
    let lines = vec![
        INIT_METERED.to_string(),
        assistant_text("a", 10, 1),
        assistant_text("b", 20, 2),
        assistant_text("c", 30, 3),
        result_line(0.5),
    ];
    let (chunks, error) = run_session(&lines, "", ProcessOutcome::Exited(Some(0))).await;

    assert!(error.is_none());
    let texts: Vec<_> = chunks[..3].to_vec();
    assert_eq!(
        texts,
        vec![
            ApiStreamChunk::text("a"),
            ApiStreamChunk::text("b"),
            ApiStreamChunk::text("c"),
        ]
    );
    let usage = usage_of(chunks.last().unwrap());
    assert_eq!(usage.input_tokens, 60);
    assert_eq!(usage.output_tokens, 6);
    assert!((usage.total_cost_usd - 0.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn usage_is_last_and_unique() {
    let lines = vec![
        INIT_METERED.to_string(),
        assistant_text("x", 1, 1),
        result_line(0.1),
        assistant_text("after result", 1, 1),
        result_line(0.2),
    ];
    let (chunks, error) = run_session(&lines, "", ProcessOutcome::Exited(Some(0))).await;

    assert!(error.is_none());
    assert_eq!(chunks.iter().filter(|c| c.is_usage()).count(), 1);
    assert!(chunks.last().unwrap().is_usage());
    assert!(!chunks.contains(&ApiStreamChunk::text("after result")));
}

#[tokio::test]
async fn non_json_lines_surface_verbatim() {
    let lines = vec![
        "Starting up...".to_string(),
        INIT_METERED.to_string(),
        "{\"partial\": ".to_string(),
        assistant_text("real", 1, 1),
        result_line(0.0),
    ];
    let (chunks, error) = run_session(&lines, "", ProcessOutcome::Exited(Some(0))).await;

    assert!(error.is_none());
    assert_eq!(chunks[0], ApiStreamChunk::text("Starting up..."));
    assert_eq!(chunks[1], ApiStreamChunk::text("{\"partial\": "));
    assert_eq!(chunks[2], ApiStreamChunk::text("real"));
    assert!(chunks[3].is_usage());
}

#[tokio::test]
async fn nonzero_exit_includes_stderr() {
    let lines = vec![INIT_METERED.to_string(), assistant_text("partial", 1, 1)];
    let (chunks, error) = run_session(&lines, "disk full", ProcessOutcome::Exited(Some(1))).await;

    assert_eq!(chunks, vec![ApiStreamChunk::text("partial")]);
    let err = error.unwrap();
    assert!(matches!(err, ClaudeCodeError::ProcessExit { exit_code: Some(1), .. }));
    let message = err.to_string();
    assert!(message.contains("disk full"));
    assert!(message.contains('1'));
}

#[tokio::test]
async fn nonzero_exit_without_stderr_names_code() {
    let (chunks, error) = run_session(&[], "", ProcessOutcome::Exited(Some(3))).await;

    assert!(chunks.is_empty());
    let err = error.unwrap();
    assert!(matches!(err, ClaudeCodeError::ProcessExit { exit_code: Some(3), stderr: None }));
    assert_eq!(err.to_string(), "Claude Code process exited with code 3.");
}

#[tokio::test]
async fn stderr_ignored_on_success() {
    let lines = vec![
        INIT_METERED.to_string(),
        assistant_text("ok", 1, 1),
        result_line(0.0),
    ];
    let (chunks, error) =
        run_session(&lines, "deprecation warning", ProcessOutcome::Exited(Some(0))).await;

    assert!(error.is_none());
    assert_eq!(chunks.len(), 2);
}

#[tokio::test]
async fn clean_exit_without_result_is_protocol_error() {
    let lines = vec![INIT_METERED.to_string(), assistant_text("hi", 1, 1)];
    let (chunks, error) = run_session(&lines, "", ProcessOutcome::Exited(Some(0))).await;

    assert_eq!(chunks, vec![ApiStreamChunk::text("hi")]);
    assert!(matches!(error, Some(ClaudeCodeError::Protocol(ref m)) if m == MISSING_RESULT_MESSAGE));
}

#[tokio::test]
async fn launch_failure_event_surfaces() {
    let (chunks, error) = run_session(
        &[],
        "",
        ProcessOutcome::Failed(SpawnError::NotFound("claude".to_string())),
    )
    .await;

    assert!(chunks.is_empty());
    assert!(matches!(error, Some(ClaudeCodeError::ProcessLaunch(_))));
}

#[tokio::test]
async fn model_plan_mismatch_scenario() {
    let text = r#"API Error: 400 {"error":{"message":"Invalid model name"}}"#;
    let line = serde_json::json!({
        "type": "assistant",
        "message": {
            "content": [{"type": "text", "text": text}],
            "stop_reason": "stop_sequence",
            "usage": {"input_tokens": 0, "output_tokens": 0}
        }
    })
    .to_string();
    let lines = vec![INIT_METERED.to_string(), line, result_line(0.0)];
    let (chunks, error) = run_session(&lines, "", ProcessOutcome::Exited(Some(1))).await;

    assert!(chunks.is_empty());
    let err = error.unwrap();
    assert!(matches!(err, ClaudeCodeError::ModelPlanMismatch { .. }));
    let message = err.to_string();
    assert!(message.contains(text));
    assert!(message.contains(MODEL_PLAN_MISMATCH_HINT));
}

#[tokio::test]
async fn explicit_error_message_fails_session() {
    let lines = vec![
        INIT_METERED.to_string(),
        assistant_text("before", 1, 1),
        r#"{"type":"error"}"#.to_string(),
        assistant_text("after", 1, 1),
    ];
    let (chunks, error) = run_session(&lines, "", ProcessOutcome::Exited(Some(0))).await;

    assert_eq!(chunks, vec![ApiStreamChunk::text("before")]);
    assert!(matches!(error, Some(ClaudeCodeError::Protocol(_))));
}

#[tokio::test]
async fn exit_waits_for_buffered_lines() {
    let mut session = fake_session(StopReasonPolicy::Strict);

    // The process "exits" first; its output is still in the pipe.
    session.exit.send(ProcessOutcome::Exited(Some(0))).unwrap();
    session.stdout.write_all(INIT_METERED.as_bytes()).await.unwrap();
    session.stdout.write_all(b"\n").await.unwrap();
    session
        .stdout
        .write_all(assistant_text("late", 1, 1).as_bytes())
        .await
        .unwrap();
    session.stdout.write_all(b"\n").await.unwrap();
    session
        .stdout
        .write_all(result_line(0.0).as_bytes())
        .await
        .unwrap();
    drop(session.stdout);
    drop(session.stderr);

    let first = session.stream.next().await.unwrap().unwrap();
    assert_eq!(first, ApiStreamChunk::text("late"));
    let second = session.stream.next().await.unwrap().unwrap();
    assert!(second.is_usage());
    assert!(session.stream.next().await.is_none());
}

#[tokio::test]
async fn pull_loop_yields_while_waiting() {
    let mut session = fake_session(StopReasonPolicy::Strict);

    {
        let mut next = tokio_test::task::spawn(session.stream.next());
        tokio_test::assert_pending!(next.poll());
    }

    session
        .stdout
        .write_all(format!("{}\n", assistant_text("now", 1, 1)).as_bytes())
        .await
        .unwrap();

    let chunk = session.stream.next().await.unwrap().unwrap();
    assert_eq!(chunk, ApiStreamChunk::text("now"));
}

#[tokio::test]
async fn lenient_policy_streams_past_stop_reason() {
    let mut session = fake_session(StopReasonPolicy::ApiErrorsOnly);
    let line = serde_json::json!({
        "type": "assistant",
        "message": {
            "content": [{"type": "text", "text": "done"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 3, "output_tokens": 4}
        }
    })
    .to_string();
    for l in [INIT_METERED.to_string(), line, result_line(0.2)] {
        session.stdout.write_all(format!("{l}\n").as_bytes()).await.unwrap();
    }
    drop(session.stdout);
    drop(session.stderr);
    let _ = session.exit.send(ProcessOutcome::Exited(Some(0)));

    let chunks: Vec<_> = session.stream.collect::<Vec<_>>().await;
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].as_ref().unwrap(), &ApiStreamChunk::text("done"));
    assert_eq!(usage_of(chunks[1].as_ref().unwrap()).output_tokens, 4);
}
