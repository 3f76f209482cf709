//! Classify-then-route round trips over the default catalog and rules.

use std::sync::Arc;
use sy_admission::RateLimiter;
use sy_domain::config::{ClassifierConfig, LimitsConfig, RoutingConfig};
use sy_domain::model::TaskCategory;
use sy_domain::request::{Attachment, AttachmentKind, ClassificationRequest, RoutingRequest};
use sy_registry::ModelRegistry;
use sy_routing::{IntelligentRouter, TaskClassifier};

fn make_stack() -> (Arc<ModelRegistry>, Arc<RateLimiter>, IntelligentRouter, TaskClassifier) {
    let registry = Arc::new(ModelRegistry::with_default_catalog().unwrap());
    let limiter = Arc::new(RateLimiter::new(&LimitsConfig::default()));
    let router = IntelligentRouter::new(
        Arc::clone(&registry),
        Arc::clone(&limiter),
        &RoutingConfig::default(),
    );
    let classifier = TaskClassifier::new(ClassifierConfig::default(), None);
    (registry, limiter, router, classifier)
}

fn make_request(message: &str) -> ClassificationRequest {
    ClassificationRequest {
        user_message: message.into(),
        attachments: Vec::new(),
        conversation_history: Vec::new(),
    }
}

async fn classify_and_route(
    classifier: &TaskClassifier,
    router: &IntelligentRouter,
    request: ClassificationRequest,
) -> sy_routing::RoutingDecision {
    let classification = classifier.classify(&request).await;
    router
        .route(&RoutingRequest {
            classification,
            user_message: request.user_message,
            conversation_history: request.conversation_history,
        })
        .unwrap()
}

#[tokio::test]
async fn coding_request_lands_on_coding_primary() {
    let (_, _, router, classifier) = make_stack();
    let decision = classify_and_route(
        &classifier,
        &router,
        make_request("refactor this function to avoid the borrow checker error"),
    )
    .await;
    assert_eq!(decision.category, TaskCategory::Coding);
    assert_eq!(decision.selected_model.id, "cerebras-deepseek-v3-0324");
}

#[tokio::test]
async fn image_attachment_routes_to_vision_chain() {
    let (_, _, router, classifier) = make_stack();
    let mut request = make_request("what is this?");
    request.attachments.push(Attachment {
        kind: AttachmentKind::Image,
        mime_type: Some("image/jpeg".into()),
    });
    let decision = classify_and_route(&classifier, &router, request).await;
    assert_eq!(decision.category, TaskCategory::VisionIn);
    assert_eq!(decision.selected_model.provider, "google");
}

#[tokio::test]
async fn dead_primary_still_serves_the_category() {
    let (registry, _, router, classifier) = make_stack();
    registry.mark_dead("cerebras-deepseek-v3-0324", Some("cerebras-gpt-oss-120b".into()));

    let decision = classify_and_route(
        &classifier,
        &router,
        make_request("debug this python script for me"),
    )
    .await;
    assert_eq!(decision.category, TaskCategory::Coding);
    assert_ne!(decision.selected_model.id, "cerebras-deepseek-v3-0324");
}

#[tokio::test]
async fn routed_decision_always_carries_a_latency_estimate() {
    let (_, _, router, classifier) = make_stack();
    let decision =
        classify_and_route(&classifier, &router, make_request("hello there")).await;
    assert!(decision.estimated_latency_ms > 0);
    assert!(!decision.routing_reason.is_empty());
}
