use serde::{Deserialize, Serialize};

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    /// Environment variable holding the bearer token for protected routes.
    /// When the env var is unset, authentication is disabled (dev mode).
    #[serde(default = "d_token_env")]
    pub token_env: String,
    /// Maximum in-flight requests across the whole server.
    #[serde(default = "d_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub rate_limit: IpRateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            token_env: d_token_env(),
            max_concurrency: d_max_concurrency(),
            cors: CorsConfig::default(),
            rate_limit: IpRateLimitConfig::default(),
        }
    }
}

fn d_host() -> String {
    "127.0.0.1".into()
}

fn d_port() -> u16 {
    8787
}

fn d_token_env() -> String {
    "SY_API_TOKEN".into()
}

fn d_max_concurrency() -> usize {
    256
}

/// Allowed CORS origins. An empty list disables CORS headers entirely.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Per-client-IP request throttling applied in front of all routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpRateLimitConfig {
    #[serde(default = "d_per_second")]
    pub per_second: u64,
    #[serde(default = "d_burst")]
    pub burst: u32,
}

impl Default for IpRateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: d_per_second(),
            burst: d_burst(),
        }
    }
}

fn d_per_second() -> u64 {
    10
}

fn d_burst() -> u32 {
    20
}
