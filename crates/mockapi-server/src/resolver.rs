//! Project and Url resolution on top of a [`MockRepository`].

use crate::model::{ForwardProxy, Project, Url};
use crate::store::{Lookup, MockRepository, RepositoryError};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct Resolver {
    repository: Arc<dyn MockRepository>,
}

impl Resolver {
    pub fn new(repository: Arc<dyn MockRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn MockRepository> {
        &self.repository
    }

    pub async fn find_project(
        &self,
        team_slug: &str,
        project_slug: &str,
    ) -> Result<Lookup<Project>, RepositoryError> {
        let lookup = self
            .repository
            .find_project(team_slug, project_slug)
            .await?;
        debug!(
            team = team_slug,
            project = project_slug,
            found = lookup.is_found(),
            "Resolved project"
        );
        Ok(lookup)
    }

    pub async fn find_url(
        &self,
        team_slug: &str,
        project_slug: &str,
        path: &str,
    ) -> Result<Lookup<Url>, RepositoryError> {
        let lookup = self
            .repository
            .find_url(team_slug, project_slug, path)
            .await?;
        debug!(
            team = team_slug,
            project = project_slug,
            path,
            found = lookup.is_found(),
            "Resolved url"
        );
        Ok(lookup)
    }

    pub async fn forward_proxy_for(
        &self,
        project: &Project,
    ) -> Result<Lookup<ForwardProxy>, RepositoryError> {
        self.repository.forward_proxy_for(project.id).await
    }

    pub async fn record_hit(&self, url: &Url) -> Result<(), RepositoryError> {
        self.repository.increment_url_requests(url.id).await
    }
}
