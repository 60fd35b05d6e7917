//! Storage collaborators of the serving pipeline.
//!
//! Definitions are read through [`MockRepository`]; every request reads the
//! current state, so edits apply on the next request. Audit records go to a
//! [`RequestLogStore`].

mod definitions;
mod log;
mod memory;

pub use definitions::{
    ContentDefinition, Definitions, ForwardProxyDefinition, ProjectDefinition, TeamDefinition,
    UrlDefinition,
};
pub use log::{JsonLinesLogStore, MemoryLogStore};
pub use memory::InMemoryRepository;

use crate::config::{RequestLogBackend, RequestLogConfig};
use crate::model::{ForwardProxy, Id, Project, RequestLog, Url};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Outcome of a lookup that reached storage successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Lookup::Found(value),
            None => Lookup::NotFound,
        }
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("{kind} {id} does not exist")]
    MissingRecord { kind: &'static str, id: Id },
    #[error("invalid definitions: {0}")]
    InvalidDefinitions(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read access to mock definitions plus the Url request counter.
#[async_trait]
pub trait MockRepository: Send + Sync {
    async fn find_project(
        &self,
        team_slug: &str,
        project_slug: &str,
    ) -> Result<Lookup<Project>, RepositoryError>;

    /// Url with its mock contents, matched on the exact path.
    async fn find_url(
        &self,
        team_slug: &str,
        project_slug: &str,
        path: &str,
    ) -> Result<Lookup<Url>, RepositoryError>;

    async fn forward_proxy_for(
        &self,
        project_id: Id,
    ) -> Result<Lookup<ForwardProxy>, RepositoryError>;

    /// Best-effort; concurrent increments may be lost.
    async fn increment_url_requests(&self, url_id: Id) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait RequestLogStore: Send + Sync {
    async fn append(&self, entry: RequestLog) -> Result<(), RepositoryError>;
}

/// Create the request log sink for the configured backend
pub fn create_request_log_store(
    config: &RequestLogConfig,
) -> anyhow::Result<Arc<dyn RequestLogStore>> {
    match config.backend {
        RequestLogBackend::Memory => {
            tracing::info!(
                "Using in-memory request log (capacity={})",
                config.capacity
            );
            Ok(Arc::new(MemoryLogStore::new(config.capacity)))
        }
        RequestLogBackend::Jsonl => {
            let path = config.path.as_ref().ok_or_else(|| {
                anyhow::anyhow!("jsonl request log selected but no path provided")
            })?;
            tracing::info!("Appending request log to {}", path.display());
            Ok(Arc::new(JsonLinesLogStore::new(path)))
        }
    }
}
