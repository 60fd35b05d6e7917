//! HTTP front end: listener, accept loop and top-level routing.
//!
//! | Route                                  | Handler                |
//! |----------------------------------------|------------------------|
//! | `ANY /mock/{team}/{project}[/{path}]`  | [`MockPipeline`]       |
//! | `GET /health`                          | liveness JSON          |
//! | `GET /metrics`                         | Prometheus exposition  |
//! | anything else                          | 404 `PAGE_NOT_FOUND`   |

pub mod headers;
mod network;

pub use network::create_listener;

use crate::auth::create_auth_validator;
use crate::body::{build_response, json_response, ServeBody};
use crate::config::{Config, ListenConfig, Protocol};
use crate::error::ServeError;
use crate::metrics;
use crate::pipeline::{ClientInfo, MockPipeline, MockRoute};
use crate::ratelimit::{create_counter_store, RateLimiter};
use crate::relay::ForwardRelay;
use crate::request_log::RequestLogger;
use crate::resolver::Resolver;
use crate::store::{MockRepository, RequestLogStore};
use crate::tls::create_tls_acceptor;
use anyhow::Context;
use headers::X_FORWARDED_FOR;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info};

/// Wire the pipeline's collaborators from configuration.
pub fn build_pipeline(
    config: &Config,
    repository: Arc<dyn MockRepository>,
    log_store: Arc<dyn RequestLogStore>,
) -> anyhow::Result<MockPipeline> {
    let auth = create_auth_validator(&config.auth)?;
    let counters = create_counter_store(&config.rate_limit)?;
    let limiter = RateLimiter::new(counters, &config.rate_limit);

    info!(
        "Global rate limit: {} requests per {}s per client IP",
        config.rate_limit.max_requests, config.rate_limit.window_seconds
    );

    Ok(MockPipeline::new(
        auth,
        Arc::new(limiter),
        Resolver::new(repository),
        Arc::new(ForwardRelay::from_config(&config.relay)),
        RequestLogger::new(log_store),
    ))
}

/// Top-level route of an incoming request.
#[derive(Debug, PartialEq, Eq)]
enum Route {
    Health,
    Metrics,
    Mock {
        team_slug: String,
        project_slug: String,
        wildcard: String,
    },
    NotFound,
}

fn route(method: &Method, path: &str) -> Route {
    match path {
        "/health" if method == Method::GET => return Route::Health,
        "/metrics" if method == Method::GET => return Route::Metrics,
        _ => {}
    }

    let Some(rest) = path.strip_prefix("/mock/") else {
        return Route::NotFound;
    };
    let Some((team, rest)) = rest.split_once('/') else {
        return Route::NotFound;
    };
    let (project, wildcard) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };

    Route::Mock {
        team_slug: percent_decode(team),
        project_slug: percent_decode(project),
        wildcard: percent_decode(wildcard),
    }
}

/// Fall back to the raw text when the escapes aren't valid UTF-8.
fn percent_decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn client_ip(remote_addr: SocketAddr, headers: &HeaderMap, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(&X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    remote_addr.ip().to_string()
}

fn health_response() -> Response<ServeBody> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "status": "UP",
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }),
    )
}

fn metrics_response() -> Response<ServeBody> {
    build_response(
        StatusCode::OK,
        "text/plain; version=0.0.4",
        metrics::collect_metrics(),
    )
}

fn page_not_found() -> Response<ServeBody> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({"code": "PAGE_NOT_FOUND", "message": "Page not found"}),
    )
}

/// A bound, ready-to-run mock server.
pub struct MockServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    protocol: Protocol,
    tls_acceptor: Option<TlsAcceptor>,
    trust_forwarded_for: bool,
    pipeline: Arc<MockPipeline>,
}

impl MockServer {
    /// Bind the listener (and load TLS material for https).
    pub fn bind(listen: &ListenConfig, pipeline: MockPipeline) -> anyhow::Result<Self> {
        let addr: SocketAddr = listen
            .bind_address()
            .parse()
            .with_context(|| format!("Invalid listen address '{}'", listen.bind_address()))?;
        let listener = create_listener(addr)
            .with_context(|| format!("Failed to bind {}", listen.bind_address()))?;
        let local_addr = listener.local_addr()?;

        let tls_acceptor = match listen.protocol {
            Protocol::Https => {
                let tls = listen.tls.as_ref().ok_or_else(|| {
                    anyhow::anyhow!("TLS configuration required for HTTPS listener")
                })?;
                Some(create_tls_acceptor(&tls.cert_path, &tls.key_path)?)
            }
            Protocol::Http => None,
        };

        Ok(Self {
            listener,
            local_addr,
            protocol: listen.protocol,
            tls_acceptor,
            trust_forwarded_for: listen.trust_forwarded_for,
            pipeline: Arc::new(pipeline),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until Ctrl-C.
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve until `shutdown` completes. In-flight connections finish on
    /// their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Listening on {}://{}",
            self.protocol.as_str(),
            self.local_addr
        );

        let MockServer {
            listener,
            protocol,
            tls_acceptor,
            trust_forwarded_for,
            pipeline,
            ..
        } = self;
        let connection = Arc::new(ConnectionContext {
            pipeline,
            trust_forwarded_for,
        });
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote_addr) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            error!("Accept error: {}", e);
                            continue;
                        }
                    };
                    let connection = Arc::clone(&connection);
                    let tls_acceptor = tls_acceptor.clone();

                    tokio::spawn(async move {
                        match (protocol, tls_acceptor) {
                            (Protocol::Https, Some(acceptor)) => {
                                match acceptor.accept(stream).await {
                                    Ok(tls_stream) => {
                                        let io = TokioIo::new(tls_stream);
                                        connection.serve(io, remote_addr, true).await;
                                    }
                                    Err(err) => {
                                        error!("TLS handshake failed from {}: {}", remote_addr, err);
                                    }
                                }
                            }
                            _ => {
                                let io = TokioIo::new(stream);
                                connection.serve(io, remote_addr, false).await;
                            }
                        }
                    });
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received, no longer accepting connections");
                    return Ok(());
                }
            }
        }
    }
}

/// State shared by every connection task.
struct ConnectionContext {
    pipeline: Arc<MockPipeline>,
    trust_forwarded_for: bool,
}

impl ConnectionContext {
    async fn serve<I>(self: Arc<Self>, io: TokioIo<I>, remote_addr: SocketAddr, is_tls: bool)
    where
        I: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let service = service_fn(move |req| {
            let connection = Arc::clone(&self);
            async move { connection.handle(req, remote_addr, is_tls).await }
        });

        if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
            debug!("Error serving connection from {}: {}", remote_addr, err);
        }
    }

    async fn handle(
        &self,
        req: Request<Incoming>,
        remote_addr: SocketAddr,
        is_tls: bool,
    ) -> Result<Response<ServeBody>, Infallible> {
        let response = match route(req.method(), req.uri().path()) {
            Route::Health => health_response(),
            Route::Metrics => metrics_response(),
            Route::Mock {
                team_slug,
                project_slug,
                wildcard,
            } => {
                let client = ClientInfo {
                    ip: client_ip(remote_addr, req.headers(), self.trust_forwarded_for),
                    is_tls,
                };
                // Runs to completion even if the client hangs up.
                let pipeline = Arc::clone(&self.pipeline);
                let served = tokio::spawn(async move {
                    let route = MockRoute {
                        team_slug: &team_slug,
                        project_slug: &project_slug,
                        wildcard: &wildcard,
                    };
                    pipeline.serve(route, &client, req).await
                });
                match served.await {
                    Ok(response) => response,
                    Err(e) => {
                        error!("Mock request task failed: {}", e);
                        ServeError::Internal("Internal server error.".to_string()).into_response()
                    }
                }
            }
            Route::NotFound => page_not_found(),
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn mock(team: &str, project: &str, wildcard: &str) -> Route {
        Route::Mock {
            team_slug: team.to_string(),
            project_slug: project.to_string(),
            wildcard: wildcard.to_string(),
        }
    }

    #[test]
    fn test_route_mock_paths() {
        assert_eq!(
            route(&Method::GET, "/mock/acme/widgets/status"),
            mock("acme", "widgets", "/status")
        );
        assert_eq!(
            route(&Method::POST, "/mock/acme/widgets/a/b/c"),
            mock("acme", "widgets", "/a/b/c")
        );
        assert_eq!(
            route(&Method::GET, "/mock/acme/widgets"),
            mock("acme", "widgets", "")
        );
        assert_eq!(
            route(&Method::GET, "/mock/acme/widgets/"),
            mock("acme", "widgets", "/")
        );
    }

    #[test]
    fn test_route_percent_decodes_wildcard() {
        assert_eq!(
            route(&Method::GET, "/mock/acme/widgets/eyJ9%3D/orders"),
            mock("acme", "widgets", "/eyJ9=/orders")
        );
    }

    #[test]
    fn test_route_empty_project_slug_reaches_pipeline() {
        assert_eq!(route(&Method::GET, "/mock/acme/"), mock("acme", "", ""));
    }

    #[test]
    fn test_route_system_and_unknown() {
        assert_eq!(route(&Method::GET, "/health"), Route::Health);
        assert_eq!(route(&Method::GET, "/metrics"), Route::Metrics);
        assert_eq!(route(&Method::POST, "/health"), Route::NotFound);
        assert_eq!(route(&Method::GET, "/mock/acme"), Route::NotFound);
        assert_eq!(route(&Method::GET, "/other"), Route::NotFound);
    }

    #[test]
    fn test_client_ip_forwarded_for() {
        let remote: SocketAddr = "10.0.0.9:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            &X_FORWARDED_FOR,
            HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"),
        );

        assert_eq!(client_ip(remote, &headers, false), "10.0.0.9");
        assert_eq!(client_ip(remote, &headers, true), "203.0.113.7");
        assert_eq!(client_ip(remote, &HeaderMap::new(), true), "10.0.0.9");
    }
}
