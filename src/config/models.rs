//! Models available through Claude Code.

/// Model used when none is configured or the configured one is unknown.
pub const DEFAULT_MODEL_ID: &str = "claude-sonnet-4-20250514";

/// Static information about a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelInfo {
    pub max_tokens: u32,
    pub context_window: u32,
    pub supports_images: bool,
    pub supports_prompt_cache: bool,
}

const fn info(max_tokens: u32) -> ModelInfo {
    ModelInfo {
        max_tokens,
        context_window: 200_000,
        supports_images: false,
        supports_prompt_cache: true,
    }
}

/// Known model ids.
pub const MODELS: &[(&str, ModelInfo)] = &[
    ("claude-sonnet-4-20250514", info(64_000)),
    ("claude-opus-4-20250514", info(32_000)),
    ("claude-3-7-sonnet-20250219", info(8192)),
    ("claude-3-5-sonnet-20241022", info(8192)),
    ("claude-3-5-haiku-20241022", info(8192)),
];

/// A resolved model id with its info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub id: String,
    pub info: ModelInfo,
}

fn lookup(id: &str) -> Option<ModelInfo> {
    MODELS
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, info)| *info)
}

/// Resolve a configured model id, falling back to [`DEFAULT_MODEL_ID`].
#[must_use]
pub fn resolve_model(requested: Option<&str>) -> ModelSelection {
    if let Some(id) = requested {
        if let Some(info) = lookup(id) {
            return ModelSelection {
                id: id.to_string(),
                info,
            };
        }
        tracing::warn!(model = id, default = DEFAULT_MODEL_ID, "Unknown model, using default");
    }

    ModelSelection {
        id: DEFAULT_MODEL_ID.to_string(),
        info: lookup(DEFAULT_MODEL_ID).unwrap_or(info(64_000)),
    }
}
