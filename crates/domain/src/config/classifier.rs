use serde::{Deserialize, Serialize};

/// Task classification settings.
///
/// The offline heuristics always work; a remote classifier model is used
/// first when `remote_enabled` is set and falls back to the heuristics on
/// any failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub remote_enabled: bool,
    /// OpenAI-compatible endpoint of the classifier model.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Model id sent to the remote classifier.
    #[serde(default = "d_model")]
    pub model: String,
    /// Environment variable holding the classifier API key.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    /// Deadline for a remote classification call.
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            remote_enabled: false,
            endpoint: None,
            model: d_model(),
            api_key_env: d_api_key_env(),
            timeout_ms: d_timeout_ms(),
        }
    }
}

fn d_model() -> String {
    "groq-llama-3.2-3b".into()
}

fn d_api_key_env() -> String {
    "SY_CLASSIFIER_API_KEY".into()
}

fn d_timeout_ms() -> u64 {
    5_000
}
