use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// HTTP endpoints for the provider backends the executor talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendsConfig {
    /// Keyed by provider name as used in model descriptors.
    #[serde(default = "default_backends")]
    pub providers: HashMap<String, BackendEndpoint>,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            providers: default_backends(),
        }
    }
}

/// One OpenAI-compatible backend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendEndpoint {
    pub base_url: String,
    /// Environment variable holding this provider's API key. When unset,
    /// requests to this provider fail with an auth error.
    pub api_key_env: String,
}

fn endpoint(base_url: &str, api_key_env: &str) -> BackendEndpoint {
    BackendEndpoint {
        base_url: base_url.to_string(),
        api_key_env: api_key_env.to_string(),
    }
}

pub fn default_backends() -> HashMap<String, BackendEndpoint> {
    let mut m = HashMap::new();
    m.insert(
        "cerebras".to_string(),
        endpoint("https://api.cerebras.ai/v1", "SY_CEREBRAS_API_KEY"),
    );
    m.insert(
        "groq".to_string(),
        endpoint("https://api.groq.com/openai/v1", "SY_GROQ_API_KEY"),
    );
    m.insert(
        "google".to_string(),
        endpoint(
            "https://generativelanguage.googleapis.com/v1beta/openai",
            "SY_GOOGLE_API_KEY",
        ),
    );
    m.insert(
        "huggingface".to_string(),
        endpoint("https://router.huggingface.co/v1", "SY_HUGGINGFACE_API_KEY"),
    );
    m.insert(
        "elevenlabs".to_string(),
        endpoint("https://api.elevenlabs.io/v1", "SY_ELEVENLABS_API_KEY"),
    );
    m
}
