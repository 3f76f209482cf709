use serde::{Deserialize, Serialize};

/// Tracing and telemetry export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Service name stamped on exported spans.
    #[serde(default = "d_service_name")]
    pub service_name: String,
    /// OTLP gRPC endpoint. When unset, spans stay local.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: d_service_name(),
            otlp_endpoint: None,
        }
    }
}

fn d_service_name() -> String {
    "switchyard".into()
}
