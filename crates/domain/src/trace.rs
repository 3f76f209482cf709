use serde::Serialize;

/// Structured events emitted onto the tracing pipeline.
///
/// Each variant serializes to a single JSON object with an `event` tag, so
/// downstream log processors can filter without regexes. Emission is fire
/// and forget; a serialization failure only costs the event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    RequestClassified {
        category: String,
        confidence: f64,
        complexity: String,
        estimated_tokens: u64,
        classifier_model: String,
    },
    RouteSelected {
        category: String,
        model: String,
        provider: String,
        fallback_count: usize,
        reason: String,
    },
    ModelFallback {
        from_model: String,
        to_model: String,
        attempt: u32,
        reason: String,
    },
    RequestQueued {
        provider: String,
        priority: u8,
        queue_len: usize,
        utilization: f64,
    },
    QueueDrained {
        provider: String,
        processed: usize,
        failed: usize,
    },
    HealthTransition {
        model: String,
        from: String,
        to: String,
    },
    ProviderUnavailable {
        provider: String,
        reason: String,
    },
    ModelDeprecated {
        model: String,
        replacement: Option<String>,
    },
    GenerateCompleted {
        model: String,
        provider: String,
        duration_ms: u64,
        attempts: u32,
    },
}

impl TraceEvent {
    /// Emit this event at INFO level with the serialized payload attached.
    pub fn emit(&self) {
        match serde_json::to_string(self) {
            Ok(json) => tracing::info!(trace_event = %json, "sy_event"),
            Err(e) => tracing::warn!(error = %e, "failed to serialize trace event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tag() {
        let ev = TraceEvent::RouteSelected {
            category: "CODING".into(),
            model: "cerebras-gpt-oss-120b".into(),
            provider: "cerebras".into(),
            fallback_count: 2,
            reason: "primary choice".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "route_selected");
        assert_eq!(json["fallback_count"], 2);
    }
}
