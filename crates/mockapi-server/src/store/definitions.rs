//! YAML fixtures describing teams, projects and their mocked urls.
//!
//! ```yaml
//! teams:
//!   - slug: acme
//!     projects:
//!       - slug: widgets
//!         forward_proxy_active: true
//!         forward_proxy:
//!           domain: api.acme.test
//!         urls:
//!           - url: /status
//!             status: OK
//!             contents:
//!               - data: '{"ok":true}'
//!                 randomness: 100
//! ```

use crate::model::SymbolicStatus;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Definitions {
    #[serde(default)]
    pub teams: Vec<TeamDefinition>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TeamDefinition {
    pub slug: String,
    /// Defaults to the slug
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub projects: Vec<ProjectDefinition>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectDefinition {
    pub slug: String,
    #[serde(default)]
    pub forward_proxy_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_proxy: Option<ForwardProxyDefinition>,
    #[serde(default)]
    pub urls: Vec<UrlDefinition>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForwardProxyDefinition {
    /// Host, optionally with port, e.g. `api.acme.test` or `127.0.0.1:9000`
    pub domain: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UrlDefinition {
    pub url: String,
    #[serde(default)]
    pub status: SymbolicStatus,
    #[serde(default)]
    pub contents: Vec<ContentDefinition>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContentDefinition {
    #[serde(default)]
    pub name: String,
    pub data: String,
    #[serde(default)]
    pub randomness: i64,
    #[serde(default)]
    pub latency: i64,
}

impl Definitions {
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read definitions from {}", path.display()))?;
        Self::from_yaml(&contents)
            .with_context(|| format!("Failed to parse definitions in {}", path.display()))
    }
}
