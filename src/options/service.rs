use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[schemars(title = "Service", inline)]
#[serde(default)]
/// Geometry generation service connection and fetch pool sizing.
pub struct ServiceOptions {
    /// Base URL of the generation service.
    #[schemars(title = "Service URL")]
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    #[schemars(title = "Timeout (ms)", range(min = 100, max = 120_000))]
    pub timeout_ms: u64,
    /// Number of background fetch threads.
    #[schemars(skip)]
    pub workers: usize,
    /// Maximum number of cached sub-assemblies before LRU eviction.
    #[schemars(skip)]
    pub cache_capacity: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_owned(),
            timeout_ms: 30_000,
            workers: 4,
            cache_capacity: 256,
        }
    }
}
