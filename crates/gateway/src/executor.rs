//! reqwest-backed adapters for the OpenAI-compatible provider backends:
//! the generation executor, the health probe, and the remote classifier.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use sy_domain::config::{BackendEndpoint, ClassifierConfig};
use sy_domain::model::ModelDescriptor;
use sy_domain::request::{ChatMessage, ChatRole, ClassificationRequest, GenerateRequest,
    GenerateResponse, Usage};
use sy_domain::{BackendError, Error, ErrorCategory, Result};
use sy_resilience::{Executor, HealthProbe};
use sy_routing::{RemoteClassifier, RemoteVerdict};

const ERROR_BODY_MAX: usize = 300;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

fn role_str(role: ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    }
}

fn build_messages(request: &GenerateRequest) -> Vec<serde_json::Value> {
    let mut messages = Vec::with_capacity(request.history.len() + 2);
    if let Some(system) = &request.system_prompt {
        messages.push(json!({ "role": "system", "content": system }));
    }
    for ChatMessage { role, content } in &request.history {
        messages.push(json!({ "role": role_str(*role), "content": content }));
    }
    messages.push(json!({ "role": "user", "content": request.prompt }));
    messages
}

fn truncate(body: &str) -> String {
    if body.len() <= ERROR_BODY_MAX {
        body.to_string()
    } else {
        let mut end = ERROR_BODY_MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body[..end].to_string()
    }
}

fn transport_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::timeout(e.to_string())
    } else {
        BackendError::unknown(e.to_string())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generation executor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Calls `{base_url}/chat/completions` on the provider owning each model.
pub struct HttpExecutor {
    client: reqwest::Client,
    backends: HashMap<String, BackendEndpoint>,
}

impl HttpExecutor {
    pub fn new(backends: HashMap<String, BackendEndpoint>) -> Self {
        Self {
            client: reqwest::Client::new(),
            backends,
        }
    }

    fn endpoint_for(&self, model: &ModelDescriptor) -> std::result::Result<(&BackendEndpoint, String), BackendError> {
        let endpoint = self.backends.get(&model.provider).ok_or_else(|| {
            BackendError::of_kind(
                ErrorCategory::InvalidConfig,
                format!("no backend configured for provider {}", model.provider),
            )
        })?;
        let key = std::env::var(&endpoint.api_key_env).ok().filter(|k| !k.is_empty());
        let key = key.ok_or_else(|| {
            BackendError::of_kind(
                ErrorCategory::AuthError,
                format!("{} is not set", endpoint.api_key_env),
            )
        })?;
        Ok((endpoint, key))
    }
}

#[async_trait::async_trait]
impl Executor for HttpExecutor {
    async fn generate(
        &self,
        model: &ModelDescriptor,
        request: &GenerateRequest,
    ) -> std::result::Result<GenerateResponse, BackendError> {
        let (endpoint, key) = self.endpoint_for(model)?;

        let mut body = json!({
            "model": model.backend_id(),
            "messages": build_messages(request),
        });
        let params = request.params.as_ref().unwrap_or(&model.default_params);
        if let Some(t) = params.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(p) = params.top_p {
            body["top_p"] = json!(p);
        }
        if let Some(m) = params.max_output_tokens {
            body["max_tokens"] = json!(m);
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", endpoint.base_url))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status.as_u16(), truncate(&detail)));
        }

        let completion: ChatCompletion = response.json().await.map_err(transport_error)?;
        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BackendError::unknown("completion had no choices"))?;

        Ok(GenerateResponse {
            text,
            model_used: model.id.clone(),
            usage: completion.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Health probe
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Pings `{base_url}/models` on the provider owning the model. Cheap, and
/// the listing endpoint is the one call every OpenAI-compatible backend has.
pub struct HttpHealthProbe {
    client: reqwest::Client,
    backends: HashMap<String, BackendEndpoint>,
}

impl HttpHealthProbe {
    pub fn new(backends: HashMap<String, BackendEndpoint>, timeout: Duration) -> Self {
        // Per-request timeout; the checker also wraps probes in its own
        // deadline.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client, backends }
    }
}

#[async_trait::async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self, model: &ModelDescriptor) -> std::result::Result<(), BackendError> {
        let endpoint = self.backends.get(&model.provider).ok_or_else(|| {
            BackendError::of_kind(
                ErrorCategory::InvalidConfig,
                format!("no backend configured for provider {}", model.provider),
            )
        })?;
        let mut request = self.client.get(format!("{}/models", endpoint.base_url));
        if let Ok(key) = std::env::var(&endpoint.api_key_env) {
            if !key.is_empty() {
                request = request.bearer_auth(key);
            }
        }
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BackendError::from_status(status.as_u16(), "probe failed"))
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Remote classifier
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const CLASSIFIER_SYSTEM_PROMPT: &str = "\
You are a task classifier for an AI model router. Reply with a single JSON \
object and nothing else: {\"category\": one of SIMPLE, MEDIUM, COMPLEX, \
CODING, REASONING, VISION_IN, IMAGE_GEN, VIDEO_GEN, MULTILINGUAL, AGENTIC, \
LONG_CONTEXT, \"confidence\": 0.0-1.0, \"reasoning\": short string, \
\"complexity\": LOW|MEDIUM|HIGH, \"estimated_tokens\": integer, \
\"detected_language\": ISO-639-1 code}";

#[derive(Debug, Deserialize)]
struct VerdictBody {
    category: String,
    confidence: f64,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    complexity: Option<String>,
    #[serde(default)]
    estimated_tokens: Option<u64>,
    #[serde(default)]
    detected_language: Option<String>,
}

/// Model output often arrives wrapped in a markdown code fence.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Consults a small remote model over the OpenAI-compatible chat API.
pub struct HttpRemoteClassifier {
    client: reqwest::Client,
    cfg: ClassifierConfig,
    endpoint: String,
}

impl HttpRemoteClassifier {
    pub fn new(cfg: ClassifierConfig, endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            cfg,
            endpoint,
        }
    }
}

#[async_trait::async_trait]
impl RemoteClassifier for HttpRemoteClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> Result<RemoteVerdict> {
        let key = std::env::var(&self.cfg.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Auth(format!("{} is not set", self.cfg.api_key_env)))?;

        let body = json!({
            "model": self.cfg.model,
            "messages": [
                { "role": "system", "content": CLASSIFIER_SYSTEM_PROMPT },
                { "role": "user", "content": request.user_message },
            ],
            "temperature": 0.0,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Backend(transport_error(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Backend(BackendError::from_status(
                status.as_u16(),
                "classifier call failed",
            )));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| Error::Backend(transport_error(e)))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Other("classifier returned no choices".into()))?;

        let verdict: VerdictBody = serde_json::from_str(strip_code_fences(&content))?;
        Ok(RemoteVerdict {
            category: verdict.category,
            confidence: verdict.confidence,
            reasoning: verdict.reasoning,
            complexity: verdict.complexity,
            estimated_tokens: verdict.estimated_tokens,
            detected_language: verdict.detected_language,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sy_domain::model::ModelParams;

    #[test]
    fn messages_keep_system_history_user_order() {
        let request = GenerateRequest {
            prompt: "and now?".into(),
            system_prompt: Some("be brief".into()),
            history: vec![
                ChatMessage {
                    role: ChatRole::User,
                    content: "hi".into(),
                },
                ChatMessage {
                    role: ChatRole::Assistant,
                    content: "hello".into(),
                },
            ],
            params: None,
        };
        let messages = build_messages(&request);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[3]["content"], "and now?");
    }

    #[test]
    fn messages_without_system_prompt_start_with_history() {
        let request = GenerateRequest {
            prompt: "q".into(),
            ..GenerateRequest::default()
        };
        let messages = build_messages(&request);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(
            strip_code_fences("```json\n{\"category\": \"CODING\"}\n```"),
            "{\"category\": \"CODING\"}"
        );
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn request_params_take_precedence_over_model_defaults() {
        let defaults = ModelParams {
            temperature: Some(0.7),
            max_output_tokens: Some(1024),
            ..ModelParams::default()
        };
        let request = GenerateRequest {
            prompt: "p".into(),
            params: Some(ModelParams {
                max_output_tokens: Some(64),
                ..ModelParams::default()
            }),
            ..GenerateRequest::default()
        };
        let chosen = request.params.as_ref().unwrap_or(&defaults);
        assert_eq!(chosen.max_output_tokens, Some(64));
        // A request-level override replaces the whole parameter set.
        assert_eq!(chosen.temperature, None);
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(1000);
        assert_eq!(truncate(&body).len(), ERROR_BODY_MAX);
        assert_eq!(truncate("short"), "short");
    }
}
