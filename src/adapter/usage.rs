//! Token and cost accumulation across the messages of one session.

use crate::adapter::UsageChunk;
use crate::cli::TokenUsage;

/// Running token and cost totals.
///
/// Counters only grow. The cost is set once, from the result message.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageAccumulator {
    totals: UsageChunk,
}

impl UsageAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one assistant message's token counts. Absent cache counts are zero.
    pub fn apply_assistant_usage(&mut self, delta: &TokenUsage) {
        let totals = &mut self.totals;
        totals.input_tokens = totals.input_tokens.saturating_add(delta.input_tokens);
        totals.output_tokens = totals.output_tokens.saturating_add(delta.output_tokens);
        totals.cache_read_tokens = totals
            .cache_read_tokens
            .saturating_add(delta.cache_read_input_tokens.unwrap_or(0));
        totals.cache_write_tokens = totals
            .cache_write_tokens
            .saturating_add(delta.cache_creation_input_tokens.unwrap_or(0));
    }

    /// Record the session cost. Non-metered sessions always report zero.
    pub fn finalize(&mut self, cost_usd: f64, is_metered: bool) {
        self.totals.total_cost_usd = if is_metered { cost_usd } else { 0.0 };
    }

    /// Snapshot of the current totals.
    #[must_use]
    pub fn totals(&self) -> UsageChunk {
        self.totals
    }
}
