//! Configuration for the activity layer.

use serde::{Deserialize, Serialize};

/// Configuration for the ingestion pipeline activities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum article writes in flight during parse-and-store.
    #[serde(default = "default_max_concurrent_writes")]
    pub max_concurrent_writes: usize,
}

fn default_max_concurrent_writes() -> usize {
    20
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_writes: default_max_concurrent_writes(),
        }
    }
}
