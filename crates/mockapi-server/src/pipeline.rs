//! Per-request orchestration of the mock serving path.
//!
//! ```text
//! authenticate -> decode params -> rate limit -> project
//!     -> relay (forward requested, allowed, not already relayed)
//!     -> url -> select content -> simulate latency -> count -> respond
//! ```
//!
//! Every request ends in exactly one response and exactly one request log
//! entry, whichever step it stops at.

use crate::auth::{authenticate, AuthValidator};
use crate::body::{build_response, BoxError, ServeBody, APPLICATION_JSON, TEXT_PLAIN};
use crate::codec::{decode_path, DecodedPath};
use crate::error::ServeError;
use crate::latency;
use crate::metrics;
use crate::model::{MockContent, Project, RequestLog, Url};
use crate::ratelimit::RateLimiter;
use crate::relay::{infer_scheme, should_forward, ForwardRelay, RelayTarget};
use crate::request_log::RequestLogger;
use crate::resolver::Resolver;
use crate::selector;
use crate::server::headers::{MockHeadersExt, X_MOCKAPI_LATENCY_MS};
use crate::store::Lookup;
use hyper::body::{Body, Bytes};
use hyper::http::request::Parts;
use hyper::{Request, Response};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Connection-level facts about the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    /// The client connection itself is TLS.
    pub is_tls: bool,
}

/// Path components of `/mock/{team}/{project}/{wildcard}`, percent-decoded.
#[derive(Debug, Clone, Copy)]
pub struct MockRoute<'a> {
    pub team_slug: &'a str,
    pub project_slug: &'a str,
    pub wildcard: &'a str,
}

/// How a request ended, for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Served,
    Proxied,
}

impl Outcome {
    fn as_str(&self) -> &'static str {
        match self {
            Outcome::Served => "served",
            Outcome::Proxied => "proxied",
        }
    }
}

pub struct MockPipeline {
    auth: Arc<dyn AuthValidator>,
    limiter: Arc<RateLimiter>,
    resolver: Resolver,
    relay: Arc<ForwardRelay>,
    logger: RequestLogger,
}

impl MockPipeline {
    pub fn new(
        auth: Arc<dyn AuthValidator>,
        limiter: Arc<RateLimiter>,
        resolver: Resolver,
        relay: Arc<ForwardRelay>,
        logger: RequestLogger,
    ) -> Self {
        Self {
            auth,
            limiter,
            resolver,
            relay,
            logger,
        }
    }

    /// Serve one mock request. Never fails: errors become error envelopes.
    pub async fn serve<B>(
        &self,
        route: MockRoute<'_>,
        client: &ClientInfo,
        req: Request<B>,
    ) -> Response<ServeBody>
    where
        B: Body<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = req.into_parts();
        let mut entry = RequestLog::started(&client.ip, parts.method.as_str(), parts.uri.path());

        let (response, outcome) = match self
            .run(route, client, parts, body, &mut entry)
            .await
        {
            Ok((response, outcome)) => (response, outcome.as_str()),
            Err(e) => {
                debug!(status = e.status().as_u16(), "Request ended: {}", e);
                let outcome = e.outcome();
                (e.into_response(), outcome)
            }
        };

        let status = response.status().as_u16();
        metrics::record_request(outcome, status);
        self.logger.log(entry.finish(status));
        response
    }

    async fn run<B>(
        &self,
        route: MockRoute<'_>,
        client: &ClientInfo,
        parts: Parts,
        body: B,
        entry: &mut RequestLog,
    ) -> Result<(Response<ServeBody>, Outcome), ServeError>
    where
        B: Body<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        if route.team_slug.is_empty() || route.project_slug.is_empty() {
            return Err(ServeError::Validation(
                "Team and project slugs are required.".to_string(),
            ));
        }

        let principal = authenticate(self.auth.as_ref(), parts.uri.query(), &parts.headers)
            .await
            .map_err(|e| ServeError::Unauthorized(e.to_string()))?;
        debug!(user = ?principal.user_id, "Authenticated");

        let decoded = decode_path(route.wildcard);
        entry.url = decoded.lookup_path.clone();

        match self.limiter.check_global(&client.ip).await {
            Ok(false) => {}
            Ok(true) => {
                metrics::record_rate_limited();
                return Err(ServeError::RateLimited);
            }
            Err(e) => {
                error!(ip = %client.ip, "Rate limit check failed: {}", e);
                return Err(ServeError::Internal(
                    "Error checking global rate limit.".to_string(),
                ));
            }
        }

        let project = match self
            .resolver
            .find_project(route.team_slug, route.project_slug)
            .await
        {
            Ok(Lookup::Found(project)) => project,
            Ok(Lookup::NotFound) => {
                return Err(ServeError::NotFound(format!(
                    "Project not found or error fetching project: project '{}/{}' does not exist",
                    route.team_slug, route.project_slug
                )))
            }
            Err(e) => {
                return Err(ServeError::Internal(format!(
                    "Project not found or error fetching project: {e}"
                )))
            }
        };
        entry.project_id = Some(project.id);

        if should_forward(&project, &decoded.flags()) {
            entry.is_proxied = true;
            let response = self
                .forward(route, client, &project, &decoded, parts, body)
                .await?;
            return Ok((response, Outcome::Proxied));
        }

        let url = match self
            .resolver
            .find_url(route.team_slug, route.project_slug, &decoded.lookup_path)
            .await
        {
            Ok(Lookup::Found(url)) => url,
            Ok(Lookup::NotFound) => {
                return Err(ServeError::NotFound(format!(
                    "URL not found or error fetching URL: no url '{}' in project '{}/{}'",
                    decoded.lookup_path, route.team_slug, route.project_slug
                )))
            }
            Err(e) => {
                return Err(ServeError::Internal(format!(
                    "URL not found or error fetching URL: {e}"
                )))
            }
        };
        entry.url_id = Some(url.id);

        if url.mock_contents.is_empty() {
            return Err(ServeError::NotFound(
                "No mock content available for this URL.".to_string(),
            ));
        }

        let content = selector::select_random(&url.mock_contents)
            .cloned()
            .ok_or_else(|| ServeError::Internal("Failed to select mock content.".to_string()))?;
        debug!(url_id = url.id, content_id = content.id, "Selected mock content");

        let delay = latency::simulate(content.latency).await;

        if let Err(e) = self.resolver.record_hit(&url).await {
            warn!(url_id = url.id, "Failed to increment url request counter: {}", e);
        }

        let mut response = render(&url, &content);
        if let Some(delay) = delay {
            response.set_header_value(&X_MOCKAPI_LATENCY_MS, &delay.as_millis().to_string());
        }
        Ok((response, Outcome::Served))
    }

    async fn forward<B>(
        &self,
        route: MockRoute<'_>,
        client: &ClientInfo,
        project: &Project,
        decoded: &DecodedPath,
        parts: Parts,
        body: B,
    ) -> Result<Response<ServeBody>, ServeError>
    where
        B: Body<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        let proxy = match self.resolver.forward_proxy_for(project).await {
            Ok(Lookup::Found(proxy)) => proxy,
            Ok(Lookup::NotFound) => {
                error!(
                    project_id = project.id,
                    "Forwarding is active but the project has no forward proxy"
                );
                return Err(ServeError::Internal(
                    "Forward proxy is active but no proxy settings are configured for this project."
                        .to_string(),
                ));
            }
            Err(e) => {
                return Err(ServeError::Internal(format!(
                    "Error fetching forward proxy settings: {e}"
                )))
            }
        };

        let target = RelayTarget {
            scheme: infer_scheme(client.is_tls, &parts.headers),
            domain: &proxy.domain,
            team_slug: route.team_slug,
            project_slug: route.project_slug,
            params: decoded.flags(),
            lookup_path: &decoded.lookup_path,
            query: parts.uri.query(),
        };
        let uri = target
            .uri()
            .map_err(|e| ServeError::Internal(format!("Failed to create proxy request: {e}")))?;

        self.relay.relay(uri, parts, body).await.map_err(|e| {
            if e.is_upstream() {
                ServeError::Upstream(format!("Failed to execute proxy request: {e}"))
            } else {
                ServeError::Internal(format!("Failed to create proxy request: {e}"))
            }
        })
    }
}

/// JSON content is re-serialized and served as JSON, anything else verbatim as text.
fn render(url: &Url, content: &MockContent) -> Response<ServeBody> {
    let status = url.status.code();
    match serde_json::from_str::<serde_json::Value>(&content.data) {
        Ok(value) => match serde_json::to_vec(&value) {
            Ok(json) => build_response(status, APPLICATION_JSON, json),
            Err(_) => build_response(status, TEXT_PLAIN, content.data.clone()),
        },
        Err(_) => build_response(status, TEXT_PLAIN, content.data.clone()),
    }
}
