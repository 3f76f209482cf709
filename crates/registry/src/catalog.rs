//! Built-in model catalog: one descriptor per model the default routing
//! table references. Operators can replace this wholesale via config, but
//! the ids here must stay in sync with the default rules.

use sy_domain::model::{
    Capability, ModelCategory, ModelDescriptor, ModelLifecycle, ModelParams, RateLimit,
};

struct Spec {
    id: &'static str,
    name: &'static str,
    provider: &'static str,
    backend_id: Option<&'static str>,
    category: ModelCategory,
    capabilities: &'static [Capability],
    context_window: u32,
    max_output_tokens: u32,
    supports_streaming: bool,
    requests_per_minute: u32,
    requests_per_day: Option<u32>,
    priority: u8,
}

impl Spec {
    fn build(&self) -> ModelDescriptor {
        ModelDescriptor {
            id: self.id.into(),
            name: self.name.into(),
            provider: self.provider.into(),
            backend_id: self.backend_id.map(Into::into),
            category: self.category,
            capabilities: self.capabilities.to_vec(),
            context_window: self.context_window,
            max_output_tokens: self.max_output_tokens,
            supports_streaming: self.supports_streaming,
            lifecycle: ModelLifecycle::default(),
            rate_limit: RateLimit {
                requests_per_minute: self.requests_per_minute,
                requests_per_day: self.requests_per_day,
                tokens_per_minute: None,
            },
            priority: self.priority,
            default_params: ModelParams {
                temperature: Some(0.7),
                ..ModelParams::default()
            },
            enabled: true,
            cost_per_token: None,
        }
    }
}

const TEXT: &[Capability] = &[Capability::Text];
const TEXT_VISION: &[Capability] = &[Capability::Text, Capability::Vision, Capability::AudioIn];

const CATALOG: &[Spec] = &[
    Spec {
        id: "cerebras-llama-4-scout-17b",
        name: "Llama 4 Scout 17B (Cerebras)",
        provider: "cerebras",
        backend_id: Some("llama-4-scout-17b-16e-instruct"),
        category: ModelCategory::Conversation,
        capabilities: TEXT,
        context_window: 131_072,
        max_output_tokens: 8_192,
        supports_streaming: true,
        requests_per_minute: 100,
        requests_per_day: Some(50_000),
        priority: 60,
    },
    Spec {
        id: "cerebras-llama-3.3-70b",
        name: "Llama 3.3 70B (Cerebras)",
        provider: "cerebras",
        backend_id: Some("llama-3.3-70b"),
        category: ModelCategory::General,
        capabilities: TEXT,
        context_window: 131_072,
        max_output_tokens: 8_192,
        supports_streaming: true,
        requests_per_minute: 100,
        requests_per_day: Some(50_000),
        priority: 70,
    },
    Spec {
        id: "cerebras-gpt-oss-120b",
        name: "GPT-OSS 120B (Cerebras)",
        provider: "cerebras",
        backend_id: Some("gpt-oss-120b"),
        category: ModelCategory::Math,
        capabilities: TEXT,
        context_window: 131_072,
        max_output_tokens: 32_768,
        supports_streaming: true,
        requests_per_minute: 100,
        requests_per_day: Some(50_000),
        priority: 80,
    },
    Spec {
        id: "cerebras-deepseek-v3-0324",
        name: "DeepSeek V3 0324 (Cerebras)",
        provider: "cerebras",
        backend_id: Some("deepseek-v3-0324"),
        category: ModelCategory::Coding,
        capabilities: TEXT,
        context_window: 131_072,
        max_output_tokens: 16_384,
        supports_streaming: true,
        requests_per_minute: 100,
        requests_per_day: Some(50_000),
        priority: 75,
    },
    Spec {
        id: "groq-llama-3.2-3b",
        name: "Llama 3.2 3B (Groq)",
        provider: "groq",
        backend_id: Some("llama-3.2-3b-preview"),
        category: ModelCategory::Conversation,
        capabilities: TEXT,
        context_window: 131_072,
        max_output_tokens: 8_192,
        supports_streaming: true,
        requests_per_minute: 30,
        requests_per_day: Some(14_400),
        priority: 40,
    },
    Spec {
        id: "groq-mistral-saba-24b",
        name: "Mistral Saba 24B (Groq)",
        provider: "groq",
        backend_id: Some("mistral-saba-24b"),
        category: ModelCategory::Conversation,
        capabilities: TEXT,
        context_window: 32_768,
        max_output_tokens: 8_192,
        supports_streaming: true,
        requests_per_minute: 30,
        requests_per_day: Some(14_400),
        priority: 55,
    },
    Spec {
        id: "gemini-2.5-flash",
        name: "Gemini 2.5 Flash",
        provider: "google",
        backend_id: None,
        category: ModelCategory::General,
        capabilities: TEXT_VISION,
        context_window: 1_048_576,
        max_output_tokens: 65_536,
        supports_streaming: true,
        requests_per_minute: 15,
        requests_per_day: Some(1_500),
        priority: 65,
    },
    Spec {
        id: "gemini-2.5-pro",
        name: "Gemini 2.5 Pro",
        provider: "google",
        backend_id: None,
        category: ModelCategory::General,
        capabilities: TEXT_VISION,
        context_window: 1_048_576,
        max_output_tokens: 65_536,
        supports_streaming: true,
        requests_per_minute: 15,
        requests_per_day: Some(1_500),
        priority: 85,
    },
    Spec {
        id: "gemini-3-pro-preview",
        name: "Gemini 3 Pro (preview)",
        provider: "google",
        backend_id: None,
        category: ModelCategory::Multimodal,
        capabilities: &[
            Capability::Text,
            Capability::Vision,
            Capability::AudioIn,
            Capability::ComputerUse,
        ],
        context_window: 1_048_576,
        max_output_tokens: 65_536,
        supports_streaming: true,
        requests_per_minute: 15,
        requests_per_day: Some(1_500),
        priority: 90,
    },
    Spec {
        id: "imagen-4.0",
        name: "Imagen 4.0",
        provider: "google",
        backend_id: None,
        category: ModelCategory::Multimodal,
        capabilities: &[Capability::ImageGen],
        context_window: 4_096,
        max_output_tokens: 4_096,
        supports_streaming: false,
        requests_per_minute: 15,
        requests_per_day: Some(1_500),
        priority: 70,
    },
    Spec {
        id: "veo-3.1",
        name: "Veo 3.1",
        provider: "google",
        backend_id: None,
        category: ModelCategory::Multimodal,
        capabilities: &[Capability::VideoGen],
        context_window: 4_096,
        max_output_tokens: 4_096,
        supports_streaming: false,
        requests_per_minute: 15,
        requests_per_day: Some(1_500),
        priority: 70,
    },
];

/// Descriptors for every model the default routing table references.
pub fn default_catalog() -> Vec<ModelDescriptor> {
    CATALOG.iter().map(Spec::build).collect()
}
