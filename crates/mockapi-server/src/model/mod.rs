//! Records read and written by the serving pipeline.
//!
//! Definitions (`Project`, `ForwardProxy`, `Url`, `MockContent`) are owned by
//! the management side and are read-only here, apart from the Url request
//! counter. `RequestLog` is append-only.

mod status;

pub use status::{SymbolicStatus, STATUS_TABLE};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Id = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: Id,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Id,
    pub slug: String,
    pub team_id: Id,
    pub is_forward_proxy_active: bool,
}

/// Upstream domain a project relays to when forwarding is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardProxy {
    pub id: Id,
    pub project_id: Id,
    pub domain: String,
}

/// A mocked path inside a project, with its candidate responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Url {
    pub id: Id,
    pub project_id: Id,
    pub url: String,
    pub status: SymbolicStatus,
    pub requests: i64,
    /// Present in stored definitions but never written by the server.
    pub time: Option<i64>,
    pub mock_contents: Vec<MockContent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockContent {
    pub id: Id,
    pub url_id: Id,
    pub name: String,
    pub data: String,
    /// Selection weight. Negative values count as zero.
    pub randomness: i64,
    /// Milliseconds to wait before responding.
    pub latency: i64,
}

/// Audit record written once per served request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLog {
    pub timestamp: DateTime<Utc>,
    pub ip_address: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub project_id: Option<Id>,
    pub url_id: Option<Id>,
    pub is_proxied: bool,
}

impl RequestLog {
    /// Start an entry for a request that has not been resolved yet.
    pub fn started(
        ip_address: impl Into<String>,
        method: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            ip_address: ip_address.into(),
            method: method.into(),
            url: url.into(),
            status: 0,
            project_id: None,
            url_id: None,
            is_proxied: false,
        }
    }

    pub fn finish(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}
