//! Task classification: deterministic keyword/shape heuristics with an
//! optional remote model consulted for ambiguous requests.
//!
//! `classify` never fails. Every remote problem (disabled, timeout, bad
//! verdict) falls back to the deterministic rules.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use sy_domain::config::ClassifierConfig;
use sy_domain::model::{Complexity, TaskCategory};
use sy_domain::request::{Classification, ClassificationRequest};
use sy_domain::trace::TraceEvent;
use sy_domain::Result;

/// `classifier_model` value for verdicts produced offline.
pub const OFFLINE_CLASSIFIER: &str = "fallback-rules";

const CODING_KEYWORDS: &[&str] = &[
    "code", "function", "debug", "compile", "program", "script", "bug", "refactor",
    "implement", "algorithm", "api", "python", "javascript", "typescript", "rust",
    "java", "sql", "regex",
];
const CREATE_WORDS: &[&str] = &["generate", "create", "draw", "make me"];
const IMAGE_WORDS: &[&str] = &["image", "picture", "photo"];

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Remote classifier capability
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Raw verdict from a remote classifier model, before validation.
#[derive(Debug, Clone)]
pub struct RemoteVerdict {
    pub category: String,
    pub confidence: f64,
    pub reasoning: String,
    pub complexity: Option<String>,
    pub estimated_tokens: Option<u64>,
    pub detected_language: Option<String>,
}

#[async_trait::async_trait]
pub trait RemoteClassifier: Send + Sync {
    async fn classify(&self, request: &ClassificationRequest) -> Result<RemoteVerdict>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Classifier
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TaskClassifier {
    config: ClassifierConfig,
    remote: Option<Arc<dyn RemoteClassifier>>,
}

impl TaskClassifier {
    pub fn new(config: ClassifierConfig, remote: Option<Arc<dyn RemoteClassifier>>) -> Self {
        Self { config, remote }
    }

    /// Classify a request. Infallible: the deterministic rules always
    /// produce a verdict.
    pub async fn classify(&self, request: &ClassificationRequest) -> Classification {
        let out = self.classify_inner(request).await;
        TraceEvent::RequestClassified {
            category: out.category.to_string(),
            confidence: out.confidence,
            complexity: out.estimated_complexity.to_string(),
            estimated_tokens: out.estimated_tokens,
            classifier_model: out.classifier_model.clone(),
        }
        .emit();
        out
    }

    /// Re-run classification with the previous verdict folded in as a hint.
    pub async fn reclassify(
        &self,
        request: &ClassificationRequest,
        previous: &Classification,
        note: &str,
    ) -> Classification {
        let mut hinted = request.clone();
        hinted.user_message = format!(
            "{} (previously classified as {}; {note})",
            request.user_message, previous.category
        );
        self.classify(&hinted).await
    }

    async fn classify_inner(&self, request: &ClassificationRequest) -> Classification {
        let message = request.user_message.as_str();
        let lower = message.to_lowercase();
        let language = detect_language(message);
        let complexity = estimate_complexity(message, request.conversation_history.len());
        let tokens = estimate_tokens(request, complexity);
        let multimodal = !request.attachments.is_empty();

        let verdict = |category, confidence, reasoning: String| Classification {
            category,
            confidence,
            reasoning,
            estimated_complexity: complexity,
            estimated_tokens: tokens,
            requires_multimodal: multimodal,
            detected_language: language.to_string(),
            classified_at: Utc::now(),
            classifier_model: OFFLINE_CLASSIFIER.to_string(),
        };

        // Attachments trump everything.
        if multimodal {
            return verdict(
                TaskCategory::VisionIn,
                0.95,
                format!(
                    "request carries {} attachment(s)",
                    request.attachments.len()
                ),
            );
        }

        // Keyword heuristics.
        let wants_creation = CREATE_WORDS.iter().any(|w| lower.contains(w));
        let mentions_image = IMAGE_WORDS.iter().any(|w| lower.contains(w));
        if let Some(kw) = CODING_KEYWORDS.iter().find(|w| lower.contains(*w)) {
            return verdict(
                TaskCategory::Coding,
                0.85,
                format!("coding keyword \"{kw}\""),
            );
        }
        if wants_creation && mentions_image {
            return verdict(
                TaskCategory::ImageGen,
                0.85,
                "image generation wording".into(),
            );
        }
        if wants_creation && lower.contains("video") {
            return verdict(
                TaskCategory::VideoGen,
                0.85,
                "video generation wording".into(),
            );
        }
        if mentions_image {
            return verdict(
                TaskCategory::VisionIn,
                0.85,
                "image wording without generation intent".into(),
            );
        }
        if lower.contains("translate") || language != "en" {
            return verdict(
                TaskCategory::Multilingual,
                0.85,
                format!("translation request or non-English text ({language})"),
            );
        }

        // Ambiguous: ask the remote model when one is wired in.
        if self.config.remote_enabled {
            if let Some(remote) = &self.remote {
                let deadline = Duration::from_millis(self.config.timeout_ms);
                match tokio::time::timeout(deadline, remote.classify(request)).await {
                    Ok(Ok(raw)) => {
                        if let Some(c) =
                            self.validate_remote(raw, complexity, tokens, language, multimodal)
                        {
                            return c;
                        }
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "remote classifier failed; using deterministic rules");
                    }
                    Err(_) => {
                        tracing::warn!(
                            timeout_ms = self.config.timeout_ms,
                            "remote classifier timed out; using deterministic rules"
                        );
                    }
                }
            }
        }

        // Deterministic fallback.
        let chars = message.chars().count();
        if chars > 200 || lower.contains("analyze") || lower.contains("complex") {
            verdict(
                TaskCategory::Complex,
                0.7,
                "long or analytical request".into(),
            )
        } else if chars < 50 && !message.contains('?') {
            verdict(TaskCategory::Simple, 0.7, "short statement".into())
        } else {
            verdict(TaskCategory::Medium, 0.7, "default classification".into())
        }
    }

    /// Coerce a raw remote verdict into a valid classification, or reject
    /// it entirely when the category is unusable.
    fn validate_remote(
        &self,
        raw: RemoteVerdict,
        local_complexity: Complexity,
        local_tokens: u64,
        local_language: &str,
        multimodal: bool,
    ) -> Option<Classification> {
        let Some(category) = parse_category(&raw.category) else {
            tracing::warn!(category = %raw.category, "remote classifier returned unknown category");
            return None;
        };
        let confidence = if raw.confidence.is_finite() && (0.0..=1.0).contains(&raw.confidence) {
            raw.confidence
        } else {
            0.8
        };
        let complexity = raw
            .complexity
            .as_deref()
            .and_then(parse_complexity)
            .unwrap_or(local_complexity);
        Some(Classification {
            category,
            confidence,
            reasoning: raw.reasoning,
            estimated_complexity: complexity,
            estimated_tokens: raw.estimated_tokens.unwrap_or(local_tokens),
            requires_multimodal: multimodal,
            detected_language: raw
                .detected_language
                .unwrap_or_else(|| local_language.to_string()),
            classified_at: Utc::now(),
            classifier_model: self.config.model.clone(),
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Heuristics
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_category(s: &str) -> Option<TaskCategory> {
    TaskCategory::ALL
        .into_iter()
        .find(|c| c.to_string() == s.trim().to_uppercase())
}

fn parse_complexity(s: &str) -> Option<Complexity> {
    match s.trim().to_uppercase().as_str() {
        "LOW" => Some(Complexity::Low),
        "MEDIUM" => Some(Complexity::Medium),
        "HIGH" => Some(Complexity::High),
        _ => None,
    }
}

fn estimate_complexity(message: &str, history_len: usize) -> Complexity {
    let chars = message.chars().count();
    if chars > 300 || history_len > 10 {
        Complexity::High
    } else if chars < 60 && history_len < 3 {
        Complexity::Low
    } else {
        Complexity::Medium
    }
}

/// chars/4 over message + history, plus an output estimate by complexity.
fn estimate_tokens(request: &ClassificationRequest, complexity: Complexity) -> u64 {
    let input_chars: usize = request.user_message.chars().count()
        + request
            .conversation_history
            .iter()
            .map(|m| m.content.chars().count())
            .sum::<usize>();
    let input_tokens = (input_chars as u64).div_ceil(4);
    let output_tokens = match complexity {
        Complexity::Low => 200,
        Complexity::Medium => 500,
        Complexity::High => 1_000,
    };
    input_tokens + output_tokens
}

/// Best-effort language detection from Unicode script ranges.
fn detect_language(message: &str) -> &'static str {
    let mut has_kana = false;
    let mut has_cjk = false;
    let mut has_arabic = false;
    let mut has_cyrillic = false;
    let mut has_spanish = false;
    let mut has_german = false;
    let mut has_french = false;
    for c in message.chars() {
        match c {
            '\u{3040}'..='\u{30FF}' => has_kana = true,
            '\u{4E00}'..='\u{9FFF}' => has_cjk = true,
            '\u{0600}'..='\u{06FF}' => has_arabic = true,
            '\u{0400}'..='\u{04FF}' => has_cyrillic = true,
            'ñ' | '¿' | '¡' => has_spanish = true,
            'ä' | 'ö' | 'ü' | 'ß' => has_german = true,
            'é' | 'è' | 'ê' | 'ë' | 'à' | 'â' | 'ç' | 'ô' | 'û' | 'ù' | 'ï' | 'î' => {
                has_french = true
            }
            _ => {}
        }
    }
    // Kana wins over kanji so Japanese text with CJK ideographs stays ja.
    if has_kana {
        "ja"
    } else if has_cjk {
        "zh"
    } else if has_arabic {
        "ar"
    } else if has_cyrillic {
        "ru"
    } else if has_spanish {
        "es"
    } else if has_german {
        "de"
    } else if has_french {
        "fr"
    } else {
        "en"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sy_domain::request::{Attachment, AttachmentKind, ChatMessage, ChatRole};
    use sy_domain::{Error, Result};

    fn make_classifier() -> TaskClassifier {
        TaskClassifier::new(ClassifierConfig::default(), None)
    }

    fn make_request(message: &str) -> ClassificationRequest {
        ClassificationRequest {
            user_message: message.into(),
            attachments: Vec::new(),
            conversation_history: Vec::new(),
        }
    }

    #[tokio::test]
    async fn attachments_force_vision() {
        let mut req = make_request("what is in this?");
        req.attachments.push(Attachment {
            kind: AttachmentKind::Image,
            mime_type: Some("image/png".into()),
        });
        let c = make_classifier().classify(&req).await;
        assert_eq!(c.category, TaskCategory::VisionIn);
        assert!((c.confidence - 0.95).abs() < f64::EPSILON);
        assert!(c.requires_multimodal);
    }

    #[tokio::test]
    async fn coding_keywords_route_to_coding() {
        let c = make_classifier()
            .classify(&make_request("please debug this stack trace"))
            .await;
        assert_eq!(c.category, TaskCategory::Coding);
        assert_eq!(c.classifier_model, OFFLINE_CLASSIFIER);
    }

    #[tokio::test]
    async fn generation_wording_splits_image_and_video() {
        let clf = make_classifier();
        let img = clf
            .classify(&make_request("generate a picture of a lighthouse"))
            .await;
        assert_eq!(img.category, TaskCategory::ImageGen);
        let vid = clf
            .classify(&make_request("create a short video of waves"))
            .await;
        assert_eq!(vid.category, TaskCategory::VideoGen);
    }

    #[tokio::test]
    async fn non_english_text_routes_multilingual() {
        let c = make_classifier()
            .classify(&make_request("Привет, как дела?"))
            .await;
        assert_eq!(c.category, TaskCategory::Multilingual);
        assert_eq!(c.detected_language, "ru");
    }

    #[tokio::test]
    async fn fallback_tiers_by_length() {
        let clf = make_classifier();
        let simple = clf.classify(&make_request("hello there")).await;
        assert_eq!(simple.category, TaskCategory::Simple);
        assert!((simple.confidence - 0.7).abs() < f64::EPSILON);

        let long = "please consider the following at length ".repeat(10);
        let complex = clf.classify(&make_request(&long)).await;
        assert_eq!(complex.category, TaskCategory::Complex);
    }

    #[tokio::test]
    async fn complexity_uses_length_and_history() {
        let clf = make_classifier();
        let low = clf.classify(&make_request("hi")).await;
        assert_eq!(low.estimated_complexity, Complexity::Low);

        let mut req = make_request("hi");
        req.conversation_history = (0..12)
            .map(|i| ChatMessage {
                role: ChatRole::User,
                content: format!("turn {i}"),
            })
            .collect();
        let high = clf.classify(&req).await;
        assert_eq!(high.estimated_complexity, Complexity::High);
    }

    #[test]
    fn token_estimate_includes_history_and_output() {
        let mut req = make_request("a".repeat(40).as_str());
        req.conversation_history.push(ChatMessage {
            role: ChatRole::Assistant,
            content: "b".repeat(40),
        });
        // 80 chars / 4 = 20 input tokens, LOW output estimate 200.
        assert_eq!(estimate_tokens(&req, Complexity::Low), 220);
    }

    #[test]
    fn language_detection_prefers_kana_over_kanji() {
        assert_eq!(detect_language("日本語のテキストです"), "ja");
        assert_eq!(detect_language("你好世界"), "zh");
        assert_eq!(detect_language("مرحبا"), "ar");
        assert_eq!(detect_language("straße"), "de");
        assert_eq!(detect_language("¿qué tal?"), "es");
        assert_eq!(detect_language("château"), "fr");
        assert_eq!(detect_language("plain text"), "en");
    }

    struct FixedRemote {
        verdict: RemoteVerdict,
    }

    #[async_trait::async_trait]
    impl RemoteClassifier for FixedRemote {
        async fn classify(&self, _request: &ClassificationRequest) -> Result<RemoteVerdict> {
            Ok(self.verdict.clone())
        }
    }

    struct FailingRemote;

    #[async_trait::async_trait]
    impl RemoteClassifier for FailingRemote {
        async fn classify(&self, _request: &ClassificationRequest) -> Result<RemoteVerdict> {
            Err(Error::Other("remote down".into()))
        }
    }

    fn remote_config() -> ClassifierConfig {
        ClassifierConfig {
            remote_enabled: true,
            endpoint: Some("http://localhost:1".into()),
            ..ClassifierConfig::default()
        }
    }

    #[tokio::test]
    async fn remote_verdict_is_validated_and_coerced() {
        let remote = Arc::new(FixedRemote {
            verdict: RemoteVerdict {
                category: "reasoning".into(),
                confidence: 7.5,
                reasoning: "model said so".into(),
                complexity: Some("HIGH".into()),
                estimated_tokens: None,
                detected_language: None,
            },
        });
        let clf = TaskClassifier::new(remote_config(), Some(remote));
        let c = clf.classify(&make_request("tell me something")).await;
        assert_eq!(c.category, TaskCategory::Reasoning);
        // Out-of-range confidence coerces to 0.8.
        assert!((c.confidence - 0.8).abs() < f64::EPSILON);
        assert_eq!(c.estimated_complexity, Complexity::High);
        assert_eq!(c.classifier_model, clf.config.model);
    }

    #[tokio::test]
    async fn remote_failure_falls_back_to_rules() {
        let clf = TaskClassifier::new(remote_config(), Some(Arc::new(FailingRemote)));
        let c = clf.classify(&make_request("tell me about something?")).await;
        assert_eq!(c.classifier_model, OFFLINE_CLASSIFIER);
    }

    #[tokio::test]
    async fn unknown_remote_category_is_rejected() {
        let remote = Arc::new(FixedRemote {
            verdict: RemoteVerdict {
                category: "BANANAS".into(),
                confidence: 0.9,
                reasoning: "?".into(),
                complexity: None,
                estimated_tokens: None,
                detected_language: None,
            },
        });
        let clf = TaskClassifier::new(remote_config(), Some(remote));
        let c = clf.classify(&make_request("tell me about something?")).await;
        assert_eq!(c.classifier_model, OFFLINE_CLASSIFIER);
    }

    #[tokio::test]
    async fn reclassify_appends_previous_category_hint() {
        let clf = make_classifier();
        let first = clf.classify(&make_request("hello")).await;
        let second = clf
            .reclassify(&make_request("hello"), &first, "user escalated")
            .await;
        // The hint text pushes the message past the SIMPLE length cutoff.
        assert_ne!(second.category, TaskCategory::Simple);
    }
}
