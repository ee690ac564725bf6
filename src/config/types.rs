//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapter::StopReasonPolicy;

/// Configuration for the Claude Code adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Path to the Claude Code executable. Defaults to `claude` on `PATH`.
    #[serde(default)]
    pub path: Option<String>,
    /// Model identifier. Unknown ids fall back to the default model.
    #[serde(default)]
    pub model: Option<String>,
    /// Exported as `CLAUDE_CODE_MAX_OUTPUT_TOKENS` when set.
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    /// Which stop reasons end a session.
    #[serde(default)]
    pub stop_reason_policy: StopReasonPolicy,
    /// Replace image blocks with text before launch.
    #[serde(default = "default_filter_images")]
    pub filter_images: bool,
    /// Grace period between SIGTERM and SIGKILL when a session is dropped.
    #[serde(default = "default_terminate_timeout_ms")]
    pub terminate_timeout_ms: u64,
}

fn default_filter_images() -> bool {
    true
}

fn default_terminate_timeout_ms() -> u64 {
    5000
}

impl AdapterConfig {
    /// Grace period as a `Duration`.
    #[must_use]
    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            path: None,
            model: None,
            max_output_tokens: None,
            stop_reason_policy: StopReasonPolicy::default(),
            filter_images: default_filter_images(),
            terminate_timeout_ms: default_terminate_timeout_ms(),
        }
    }
}
