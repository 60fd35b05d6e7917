use super::{Definitions, Lookup, MockRepository, RepositoryError};
use crate::model::{ForwardProxy, Id, MockContent, Project, SymbolicStatus, Team, Url};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Default)]
struct Tables {
    next_id: Id,
    teams: Vec<Team>,
    projects: Vec<Project>,
    forward_proxies: Vec<ForwardProxy>,
    urls: Vec<Url>,
}

impl Tables {
    fn allocate_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    fn project(&self, team_slug: &str, project_slug: &str) -> Option<&Project> {
        let team = self.teams.iter().find(|team| team.slug == team_slug)?;
        self.projects
            .iter()
            .find(|project| project.team_id == team.id && project.slug == project_slug)
    }
}

/// Definitions held in process, seeded from fixtures or built up in tests.
///
/// Ids are assigned sequentially across all tables. Lookups hand out owned
/// copies, so writers never wait on a request in flight.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: &Definitions) -> Result<Self, RepositoryError> {
        let repository = Self::new();

        for team_def in &definitions.teams {
            let team = repository.insert_team(
                &team_def.slug,
                team_def.name.as_deref().unwrap_or(&team_def.slug),
            )?;

            for project_def in &team_def.projects {
                let project = repository.insert_project(
                    team.id,
                    &project_def.slug,
                    project_def.forward_proxy_active,
                )?;
                if let Some(proxy) = &project_def.forward_proxy {
                    repository.set_forward_proxy(project.id, &proxy.domain)?;
                }

                let mut seen = HashSet::new();
                for url_def in &project_def.urls {
                    if !seen.insert(url_def.url.as_str()) {
                        return Err(RepositoryError::InvalidDefinitions(format!(
                            "duplicate url '{}' in project '{}/{}'",
                            url_def.url, team_def.slug, project_def.slug
                        )));
                    }
                    let url =
                        repository.insert_url(project.id, &url_def.url, url_def.status.clone())?;
                    for content in &url_def.contents {
                        repository.insert_mock_content(
                            url.id,
                            &content.name,
                            &content.data,
                            content.randomness,
                            content.latency,
                        )?;
                    }
                }
            }
        }

        let tables = repository.tables.read();
        tracing::info!(
            "Loaded {} teams, {} projects, {} urls",
            tables.teams.len(),
            tables.projects.len(),
            tables.urls.len()
        );
        drop(tables);

        Ok(repository)
    }

    pub fn insert_team(&self, slug: &str, name: &str) -> Result<Team, RepositoryError> {
        let mut tables = self.tables.write();
        if tables.teams.iter().any(|team| team.slug == slug) {
            return Err(RepositoryError::InvalidDefinitions(format!(
                "duplicate team slug '{slug}'"
            )));
        }
        let team = Team {
            id: tables.allocate_id(),
            slug: slug.to_string(),
            name: name.to_string(),
        };
        tables.teams.push(team.clone());
        Ok(team)
    }

    pub fn insert_project(
        &self,
        team_id: Id,
        slug: &str,
        is_forward_proxy_active: bool,
    ) -> Result<Project, RepositoryError> {
        let mut tables = self.tables.write();
        if !tables.teams.iter().any(|team| team.id == team_id) {
            return Err(RepositoryError::MissingRecord {
                kind: "team",
                id: team_id,
            });
        }
        if tables
            .projects
            .iter()
            .any(|project| project.team_id == team_id && project.slug == slug)
        {
            return Err(RepositoryError::InvalidDefinitions(format!(
                "duplicate project slug '{slug}'"
            )));
        }
        let project = Project {
            id: tables.allocate_id(),
            slug: slug.to_string(),
            team_id,
            is_forward_proxy_active,
        };
        tables.projects.push(project.clone());
        Ok(project)
    }

    pub fn set_forward_proxy_active(
        &self,
        project_id: Id,
        active: bool,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        let project = tables
            .projects
            .iter_mut()
            .find(|project| project.id == project_id)
            .ok_or(RepositoryError::MissingRecord {
                kind: "project",
                id: project_id,
            })?;
        project.is_forward_proxy_active = active;
        Ok(())
    }

    /// Create or replace the project's forward proxy.
    pub fn set_forward_proxy(
        &self,
        project_id: Id,
        domain: &str,
    ) -> Result<ForwardProxy, RepositoryError> {
        let mut tables = self.tables.write();
        if !tables.projects.iter().any(|project| project.id == project_id) {
            return Err(RepositoryError::MissingRecord {
                kind: "project",
                id: project_id,
            });
        }
        tables
            .forward_proxies
            .retain(|proxy| proxy.project_id != project_id);
        let proxy = ForwardProxy {
            id: tables.allocate_id(),
            project_id,
            domain: domain.to_string(),
        };
        tables.forward_proxies.push(proxy.clone());
        Ok(proxy)
    }

    pub fn insert_url(
        &self,
        project_id: Id,
        path: &str,
        status: SymbolicStatus,
    ) -> Result<Url, RepositoryError> {
        let mut tables = self.tables.write();
        if !tables.projects.iter().any(|project| project.id == project_id) {
            return Err(RepositoryError::MissingRecord {
                kind: "project",
                id: project_id,
            });
        }
        let url = Url {
            id: tables.allocate_id(),
            project_id,
            url: path.to_string(),
            status,
            requests: 0,
            time: None,
            mock_contents: Vec::new(),
        };
        tables.urls.push(url.clone());
        Ok(url)
    }

    pub fn insert_mock_content(
        &self,
        url_id: Id,
        name: &str,
        data: &str,
        randomness: i64,
        latency: i64,
    ) -> Result<MockContent, RepositoryError> {
        let mut tables = self.tables.write();
        let id = tables.allocate_id();
        let url = tables
            .urls
            .iter_mut()
            .find(|url| url.id == url_id)
            .ok_or(RepositoryError::MissingRecord {
                kind: "url",
                id: url_id,
            })?;
        let content = MockContent {
            id,
            url_id,
            name: name.to_string(),
            data: data.to_string(),
            randomness,
            latency,
        };
        url.mock_contents.push(content.clone());
        Ok(content)
    }

    /// Snapshot of a Url by id.
    pub fn url(&self, url_id: Id) -> Option<Url> {
        self.tables
            .read()
            .urls
            .iter()
            .find(|url| url.id == url_id)
            .cloned()
    }
}

#[async_trait]
impl MockRepository for InMemoryRepository {
    async fn find_project(
        &self,
        team_slug: &str,
        project_slug: &str,
    ) -> Result<Lookup<Project>, RepositoryError> {
        let tables = self.tables.read();
        Ok(tables.project(team_slug, project_slug).cloned().into())
    }

    async fn find_url(
        &self,
        team_slug: &str,
        project_slug: &str,
        path: &str,
    ) -> Result<Lookup<Url>, RepositoryError> {
        let tables = self.tables.read();
        let Some(project) = tables.project(team_slug, project_slug) else {
            return Ok(Lookup::NotFound);
        };
        Ok(tables
            .urls
            .iter()
            .find(|url| url.project_id == project.id && url.url == path)
            .cloned()
            .into())
    }

    async fn forward_proxy_for(
        &self,
        project_id: Id,
    ) -> Result<Lookup<ForwardProxy>, RepositoryError> {
        let tables = self.tables.read();
        Ok(tables
            .forward_proxies
            .iter()
            .find(|proxy| proxy.project_id == project_id)
            .cloned()
            .into())
    }

    async fn increment_url_requests(&self, url_id: Id) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        let url = tables
            .urls
            .iter_mut()
            .find(|url| url.id == url_id)
            .ok_or(RepositoryError::MissingRecord {
                kind: "url",
                id: url_id,
            })?;
        url.requests += 1;
        Ok(())
    }
}
