//! Shared test helpers.

use std::path::{Path, PathBuf};

/// Write an executable shell script standing in for the Claude Code binary.
#[cfg(unix)]
pub fn fake_claude(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-claude");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Init line for a metered session.
pub const INIT_METERED: &str = r#"{"type":"system","subtype":"init","session_id":"sess-1","tools":[],"mcp_servers":[],"apiKeySource":"ANTHROPIC_API_KEY"}"#;

/// Init line for a subscription session.
pub const INIT_SUBSCRIPTION: &str = r#"{"type":"system","subtype":"init","session_id":"sess-1","tools":[],"mcp_servers":[],"apiKeySource":"none"}"#;

/// Assistant line with one text block and the given usage.
pub fn assistant_text(text: &str, input_tokens: u64, output_tokens: u64) -> String {
    serde_json::json!({
        "type": "assistant",
        "message": {
            "content": [{"type": "text", "text": text}],
            "stop_reason": null,
            "usage": {"input_tokens": input_tokens, "output_tokens": output_tokens}
        }
    })
    .to_string()
}

/// Result line reporting `cost`.
pub fn result_line(cost: f64) -> String {
    serde_json::json!({
        "type": "result",
        "subtype": "success",
        "result": "ok",
        "total_cost_usd": cost,
        "is_error": false,
        "duration_ms": 10,
        "num_turns": 1
    })
    .to_string()
}
