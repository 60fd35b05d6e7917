//! Response body type and builders shared by the router, pipeline and relay.

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body of every response leaving the server, served or relayed.
pub type ServeBody = BoxBody<Bytes, BoxError>;

pub const APPLICATION_JSON: &str = "application/json; charset=utf-8";
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

pub fn full(body: impl Into<Bytes>) -> ServeBody {
    Full::new(body.into())
        .map_err(|never: Infallible| match never {})
        .boxed()
}

/// Build a response with a content type.
///
/// Falls back to a bare 500 if the builder rejects its inputs, which cannot
/// happen with a valid `StatusCode` and the constant content types above.
pub fn build_response(
    status: StatusCode,
    content_type: &str,
    body: impl Into<Bytes>,
) -> Response<ServeBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .body(full(body))
        .unwrap_or_else(|_| {
            let mut response = Response::new(full("Internal Server Error"));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<ServeBody> {
    let json = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    build_response(status, APPLICATION_JSON, json)
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    status: &'static str,
    message: &'a str,
}

/// `{"status":"error","message":...}`, used for every non-2xx outcome of the pipeline.
pub fn error_response(status: StatusCode, message: &str) -> Response<ServeBody> {
    json_response(
        status,
        &ErrorEnvelope {
            status: "error",
            message,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_string(response: Response<ServeBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_error_envelope_shape() {
        let response = error_response(StatusCode::TOO_MANY_REQUESTS, "Global rate limit exceeded.");
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            APPLICATION_JSON
        );

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "Global rate limit exceeded.");
    }

    #[tokio::test]
    async fn test_build_response_sets_content_type() {
        let response = build_response(StatusCode::CREATED, TEXT_PLAIN, "hello");
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), TEXT_PLAIN);
        assert_eq!(body_string(response).await, "hello");
    }
}
