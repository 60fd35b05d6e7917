//! Forward-proxy relay.
//!
//! A project with forwarding active relays requests that ask for it to its
//! configured domain, at the same mock path on the remote instance:
//!
//! ```text
//! GET /mock/acme/gateway/<{"forward":true}>/orders?token=t
//!   -> GET {scheme}://{domain}/mock/acme/gateway/<{"forward":true,"is_forward_call":true}>/orders?token=t
//! ```
//!
//! The relayed request always carries `is_forward_call`, so it is served from
//! mock content on arrival and never relayed a second time.

mod client;
mod deadline;

pub use client::{create_http_client, HttpClient};
pub use deadline::DeadlineBody;

use crate::body::{BoxError, ServeBody};
use crate::codec::{encode_relay_path, CodecError, MockParams};
use crate::config::RelayConfig;
use crate::metrics;
use crate::model::Project;
use http_body_util::BodyExt;
use hyper::body::{Body, Bytes};
use hyper::header::HOST;
use hyper::http::request::Parts;
use hyper::{HeaderMap, Request, Response, Uri};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid relay target '{0}'")]
    InvalidTarget(String),
    #[error("failed to encode relay parameters: {0}")]
    Codec(#[from] CodecError),
    #[error("{0}")]
    Request(#[from] hyper_util::client::legacy::Error),
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

impl RelayError {
    /// Failures reaching the upstream, as opposed to building the request.
    pub fn is_upstream(&self) -> bool {
        matches!(self, RelayError::Request(_) | RelayError::Timeout(_))
    }
}

/// Relay only when the project allows it, the caller asked for it, and the
/// request is not itself a relay.
pub fn should_forward(project: &Project, params: &MockParams) -> bool {
    project.is_forward_proxy_active && params.wants_forward() && !params.is_forward_call()
}

/// `https` when the client connection is TLS or a proxy in front says so.
pub fn infer_scheme(is_tls: bool, headers: &HeaderMap) -> &'static str {
    let forwarded_https = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"));
    if is_tls || forwarded_https {
        "https"
    } else {
        "http"
    }
}

/// Where a relayed request goes.
#[derive(Debug, Clone, Copy)]
pub struct RelayTarget<'a> {
    pub scheme: &'a str,
    pub domain: &'a str,
    pub team_slug: &'a str,
    pub project_slug: &'a str,
    pub params: MockParams,
    pub lookup_path: &'a str,
    pub query: Option<&'a str>,
}

impl RelayTarget<'_> {
    pub fn uri(&self) -> Result<Uri, RelayError> {
        let wildcard = encode_relay_path(&self.params, &encode_segments(self.lookup_path))?;
        let mut target = format!(
            "{}://{}/mock/{}/{}{}",
            self.scheme,
            self.domain,
            urlencoding::encode(self.team_slug),
            urlencoding::encode(self.project_slug),
            wildcard
        );
        if let Some(query) = self.query.filter(|q| !q.is_empty()) {
            target.push('?');
            target.push_str(query);
        }
        target
            .parse::<Uri>()
            .map_err(|_| RelayError::InvalidTarget(target))
    }
}

fn encode_segments(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

pub struct ForwardRelay {
    client: HttpClient,
    timeout: Duration,
}

impl ForwardRelay {
    pub fn new(client: HttpClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            create_http_client(config),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Send the request to `uri` with the original method, headers and body,
    /// and hand the upstream response back unmodified.
    ///
    /// One timeout covers the whole exchange: waiting for the response head,
    /// then streaming the body. A body still unfinished at the deadline ends
    /// with an error.
    pub async fn relay<B>(
        &self,
        uri: Uri,
        parts: Parts,
        body: B,
    ) -> Result<Response<ServeBody>, RelayError>
    where
        B: Body<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        debug!("Relaying {} to {}", parts.method, uri);

        let mut upstream_req = Request::builder().method(parts.method).uri(uri.clone());
        for (key, value) in parts.headers.iter() {
            if key != HOST {
                upstream_req = upstream_req.header(key, value);
            }
        }
        let upstream_req = upstream_req
            .body(body.map_err(|e| -> BoxError { e.into() }).boxed())
            .map_err(|_| RelayError::InvalidTarget(uri.to_string()))?;

        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + self.timeout;
        let result = tokio::time::timeout_at(deadline, self.client.request(upstream_req)).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(Ok(response)) => {
                metrics::record_relay_duration(response.status().as_u16(), elapsed_ms);
                let timeout = self.timeout;
                Ok(response.map(|b| {
                    DeadlineBody::new(b.map_err(BoxError::from).boxed(), deadline, timeout).boxed()
                }))
            }
            Ok(Err(e)) => {
                metrics::record_relay_duration(502, elapsed_ms);
                error!("Failed to relay request to {}: {}", uri, e);
                Err(RelayError::Request(e))
            }
            Err(_) => {
                metrics::record_relay_duration(502, elapsed_ms);
                error!("Relay to {} timed out after {:?}", uri, self.timeout);
                Err(RelayError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_path;
    use http_body_util::Full;
    use hyper::header::HeaderValue;

    fn project(active: bool) -> Project {
        Project {
            id: 1,
            slug: "gateway".to_string(),
            team_id: 1,
            is_forward_proxy_active: active,
        }
    }

    fn params(forward: Option<bool>, is_forward_call: Option<bool>) -> MockParams {
        MockParams {
            forward,
            is_forward_call,
        }
    }

    #[test]
    fn test_should_forward_requires_all_three_conditions() {
        assert!(should_forward(&project(true), &params(Some(true), None)));
        assert!(should_forward(&project(true), &params(Some(true), Some(false))));

        assert!(!should_forward(&project(false), &params(Some(true), None)));
        assert!(!should_forward(&project(true), &params(None, None)));
        assert!(!should_forward(&project(true), &params(Some(false), None)));
        assert!(!should_forward(&project(true), &params(Some(true), Some(true))));
    }

    #[test]
    fn test_infer_scheme() {
        let mut headers = HeaderMap::new();
        assert_eq!(infer_scheme(false, &headers), "http");
        assert_eq!(infer_scheme(true, &headers), "https");

        headers.insert("x-forwarded-proto", HeaderValue::from_static("https"));
        assert_eq!(infer_scheme(false, &headers), "https");

        headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
        assert_eq!(infer_scheme(false, &headers), "http");
    }

    #[test]
    fn test_target_uri_marks_forward_call_and_keeps_query() {
        let target = RelayTarget {
            scheme: "http",
            domain: "upstream.test:9000",
            team_slug: "acme",
            project_slug: "gateway",
            params: params(Some(true), None),
            lookup_path: "/orders/7",
            query: Some("token=abc"),
        };
        let uri = target.uri().unwrap();
        assert_eq!(uri.scheme_str(), Some("http"));
        assert_eq!(uri.authority().unwrap().as_str(), "upstream.test:9000");
        assert_eq!(uri.query(), Some("token=abc"));

        let wildcard = uri.path().strip_prefix("/mock/acme/gateway").unwrap();
        let decoded = decode_path(wildcard);
        assert_eq!(decoded.lookup_path, "/orders/7");
        assert!(decoded.flags().is_forward_call());
        assert!(decoded.flags().wants_forward());
    }

    #[test]
    fn test_target_uri_escapes_path_segments() {
        let target = RelayTarget {
            scheme: "https",
            domain: "upstream.test",
            team_slug: "acme",
            project_slug: "gateway",
            params: MockParams::default(),
            lookup_path: "/a b",
            query: None,
        };
        let uri = target.uri().unwrap();
        assert!(uri.path().ends_with("/a%20b"));
        assert!(uri.query().is_none());
    }

    #[test]
    fn test_invalid_domain_is_rejected() {
        let target = RelayTarget {
            scheme: "http",
            domain: "bad host",
            team_slug: "acme",
            project_slug: "gateway",
            params: MockParams::default(),
            lookup_path: "/",
            query: None,
        };
        assert!(matches!(target.uri(), Err(RelayError::InvalidTarget(_))));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_an_upstream_error() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let relay = ForwardRelay::from_config(&RelayConfig::default());
        let (parts, _) = Request::get("/").body(()).unwrap().into_parts();
        let uri: Uri = format!("http://127.0.0.1:{port}/mock/a/b/").parse().unwrap();

        let err = relay
            .relay(uri, parts, Full::new(Bytes::new()))
            .await
            .unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_silent_upstream_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let client = create_http_client(&RelayConfig::default());
        let relay = ForwardRelay::new(client, Duration::from_millis(200));
        let (parts, _) = Request::get("/").body(()).unwrap().into_parts();
        let uri: Uri = format!("http://{addr}/mock/a/b/").parse().unwrap();

        let err = relay
            .relay(uri, parts, Full::new(Bytes::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_stalled_upstream_body_fails_within_timeout() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            stream
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\npartial")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = create_http_client(&RelayConfig::default());
        let relay = ForwardRelay::new(client, Duration::from_millis(300));
        let (parts, _) = Request::get("/").body(()).unwrap().into_parts();
        let uri: Uri = format!("http://{addr}/mock/a/b/").parse().unwrap();
        let started = Instant::now();

        let response = relay
            .relay(uri, parts, Full::new(Bytes::new()))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body = response.into_body().collect().await;
        assert!(body.is_err());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
