//! Request understanding and model selection: the task classifier, the
//! routing-rule table, and the utilization-aware router.

pub mod classifier;
pub mod router;
pub mod rules;

pub use classifier::{RemoteClassifier, RemoteVerdict, TaskClassifier};
pub use router::{IntelligentRouter, RoutingDecision, RoutingStats};
pub use rules::{default_rules, validate_rules, RulesValidation};
