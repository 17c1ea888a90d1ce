use std::collections::HashMap;

/// Resolves a caller-facing Anthropic model id to the upstream Bedrock model id.
///
/// Consults, in order: a user-supplied override table, a compiled-in default
/// table, then falls back to passing the input through unchanged.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct ModelMappingConfig {
    /// User-supplied overrides. Takes priority over the built-in defaults.
    pub overrides: HashMap<String, String>,
}

impl ModelMappingConfig {
    /// Resolve a caller model id to the id that should be sent to Bedrock.
    pub fn resolve<'a>(&'a self, caller_model_id: &'a str) -> &'a str {
        if let Some(mapped) = self.overrides.get(caller_model_id) {
            return mapped;
        }

        if let Some(mapped) = default_model_mapping().get(caller_model_id) {
            return mapped;
        }

        caller_model_id
    }

    /// Whether the resolved model id looks like a Claude-family model.
    ///
    /// Gates cache-marker emission and Claude-specific beta header pass-through.
    pub fn is_claude_family(resolved_model_id: &str) -> bool {
        let lower = resolved_model_id.to_ascii_lowercase();
        lower.contains("anthropic") || lower.contains("claude")
    }
}

/// Built-in Anthropic-id -> Bedrock cross-region-inference-profile-id table.
///
/// Mirrors the reference deployment's `default_model_mapping` settings entry.
fn default_model_mapping() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: std::sync::OnceLock<HashMap<&'static str, &'static str>> = std::sync::OnceLock::new();

    TABLE.get_or_init(|| {
        HashMap::from([
            (
                "claude-opus-4-5-20251101",
                "global.anthropic.claude-opus-4-5-20251101-v1:0",
            ),
            (
                "claude-sonnet-4-5-20250929",
                "global.anthropic.claude-sonnet-4-5-20250929-v1:0",
            ),
            (
                "claude-haiku-4-5-20251001",
                "global.anthropic.claude-haiku-4-5-20251001-v1:0",
            ),
            (
                "claude-3-5-haiku-20241022",
                "us.anthropic.claude-3-5-haiku-20241022-v1:0",
            ),
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mapping_resolves_known_model() {
        let config = ModelMappingConfig::default();
        assert_eq!(
            config.resolve("claude-haiku-4-5-20251001"),
            "global.anthropic.claude-haiku-4-5-20251001-v1:0"
        );
    }

    #[test]
    fn override_takes_priority_over_default() {
        let mut config = ModelMappingConfig::default();
        config
            .overrides
            .insert("claude-haiku-4-5-20251001".to_string(), "custom.model.v2".to_string());

        assert_eq!(config.resolve("claude-haiku-4-5-20251001"), "custom.model.v2");
    }

    #[test]
    fn unmapped_id_passes_through() {
        let config = ModelMappingConfig::default();
        assert_eq!(config.resolve("some-future-model"), "some-future-model");
    }

    #[test]
    fn claude_family_detection() {
        assert!(ModelMappingConfig::is_claude_family(
            "global.anthropic.claude-opus-4-5-20251101-v1:0"
        ));
        assert!(!ModelMappingConfig::is_claude_family("amazon.titan-text-express-v1"));
    }
}
