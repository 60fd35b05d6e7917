//! Request log sink configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestLogBackend {
    /// Bounded in-process ring
    #[default]
    Memory,
    /// One JSON object per line, appended to `path`
    Jsonl,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestLogConfig {
    #[serde(default)]
    pub backend: RequestLogBackend,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_capacity() -> usize {
    10_000
}

impl Default for RequestLogConfig {
    fn default() -> Self {
        Self {
            backend: RequestLogBackend::default(),
            capacity: default_capacity(),
            path: None,
        }
    }
}
