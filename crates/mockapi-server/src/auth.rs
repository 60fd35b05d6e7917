//! Bearer/query token authentication for mock requests.

use crate::config::AuthConfig;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use hyper::header::AUTHORIZATION;
use hyper::HeaderMap;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Claims carried by tokens issued by the management side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "teamID")]
    pub team_id: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

impl Claims {
    pub fn new(user_id: impl Into<String>, team_id: impl Into<String>, validity: Duration) -> Self {
        let now = Utc::now();
        let user_id = user_id.into();
        Self {
            sub: Some(user_id.clone()),
            user_id,
            team_id: team_id.into(),
            exp: (now + validity).timestamp(),
            iat: Some(now.timestamp()),
            nbf: Some(now.timestamp()),
            iss: None,
        }
    }
}

/// Identity of an authenticated caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Option<String>,
    pub team_id: Option<String>,
}

/// Authentication failures. The display text is sent to the client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid Authorization header format. Expected 'Bearer <token>'.")]
    InvalidHeader,
    #[error("Authentication token is required.")]
    MissingToken,
    #[error("Malformed token.")]
    Malformed,
    #[error("Token is expired or not yet valid.")]
    Expired,
    #[error("Invalid token: {0}")]
    Invalid(String),
}

#[async_trait]
pub trait AuthValidator: Send + Sync {
    /// Whether requests must carry a token at all.
    fn requires_token(&self) -> bool {
        true
    }

    async fn validate(&self, token: &str) -> Result<Principal, AuthError>;
}

/// HS256 validation with the shared secret.
pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn decode_claims(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature | ErrorKind::ImmatureSignature => AuthError::Expired,
                ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Utf8(_) => {
                    AuthError::Malformed
                }
                _ => AuthError::Invalid(e.to_string()),
            })
    }

    /// Issue a token, used by tests and local tooling.
    pub fn encode(secret: &[u8], claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret),
        )
    }
}

#[async_trait]
impl AuthValidator for JwtValidator {
    async fn validate(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.decode_claims(token)?;
        Ok(Principal {
            user_id: Some(claims.user_id),
            team_id: Some(claims.team_id),
        })
    }
}

/// Accepts every request.
#[derive(Debug, Default)]
pub struct DisabledAuth;

#[async_trait]
impl AuthValidator for DisabledAuth {
    fn requires_token(&self) -> bool {
        false
    }

    async fn validate(&self, _token: &str) -> Result<Principal, AuthError> {
        Ok(Principal::default())
    }
}

/// Create the validator for the configured auth mode
pub fn create_auth_validator(config: &AuthConfig) -> anyhow::Result<Arc<dyn AuthValidator>> {
    if !config.enabled {
        tracing::warn!("Authentication DISABLED: mock requests are served without a token");
        return Ok(Arc::new(DisabledAuth));
    }
    let secret = config
        .jwt_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("auth is enabled but no jwt_secret is configured"))?;
    tracing::info!("JWT authentication enabled (HS256)");
    Ok(Arc::new(JwtValidator::new(secret.as_bytes())))
}

/// Token from the `token` query parameter, else from `Authorization: Bearer`.
pub fn extract_token(query: Option<&str>, headers: &HeaderMap) -> Result<String, AuthError> {
    if let Some(token) = query.and_then(query_token) {
        return Ok(token);
    }

    let Some(header) = headers.get(AUTHORIZATION) else {
        return Err(AuthError::MissingToken);
    };
    let header = header.to_str().map_err(|_| AuthError::InvalidHeader)?;
    if header.is_empty() {
        return Err(AuthError::MissingToken);
    }

    let parts: Vec<&str> = header.split(' ').collect();
    match parts.as_slice() {
        [scheme, token] if scheme.eq_ignore_ascii_case("bearer") => {
            if token.is_empty() {
                Err(AuthError::MissingToken)
            } else {
                Ok(token.to_string())
            }
        }
        _ => Err(AuthError::InvalidHeader),
    }
}

fn query_token(query: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .map(|(_, value)| {
            urlencoding::decode(&value.replace('+', " "))
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
        .filter(|token| !token.is_empty())
}

/// Extract and validate the caller's token.
pub async fn authenticate(
    validator: &dyn AuthValidator,
    query: Option<&str>,
    headers: &HeaderMap,
) -> Result<Principal, AuthError> {
    if !validator.requires_token() {
        return Ok(Principal::default());
    }
    let token = extract_token(query, headers)?;
    validator.validate(&token).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    const TEST_SECRET: &[u8] = b"test_secret_key_1234567890";

    fn token(validity: Duration) -> String {
        JwtValidator::encode(TEST_SECRET, &Claims::new("7", "3", validity)).unwrap()
    }

    fn bearer(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_create_auth_validator() {
        let disabled = AuthConfig {
            enabled: false,
            jwt_secret: None,
        };
        assert!(!create_auth_validator(&disabled).unwrap().requires_token());

        let missing = AuthConfig {
            enabled: true,
            jwt_secret: None,
        };
        assert!(create_auth_validator(&missing).is_err());

        let enabled = AuthConfig {
            enabled: true,
            jwt_secret: Some("s3cret".to_string()),
        };
        assert!(create_auth_validator(&enabled).unwrap().requires_token());
    }

    #[test]
    fn test_query_token_takes_priority() {
        let headers = bearer("Bearer from-header");
        assert_eq!(
            extract_token(Some("a=1&token=from-query"), &headers).unwrap(),
            "from-query"
        );
    }

    #[test]
    fn test_empty_query_token_falls_back_to_header() {
        let headers = bearer("bearer abc");
        assert_eq!(extract_token(Some("token="), &headers).unwrap(), "abc");
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(
            extract_token(None, &HeaderMap::new()),
            Err(AuthError::MissingToken)
        );
        assert_eq!(
            extract_token(Some("other=1"), &HeaderMap::new()),
            Err(AuthError::MissingToken)
        );
    }

    #[test]
    fn test_malformed_header() {
        assert_eq!(
            extract_token(None, &bearer("Token abc")),
            Err(AuthError::InvalidHeader)
        );
        assert_eq!(
            extract_token(None, &bearer("Bearer a b")),
            Err(AuthError::InvalidHeader)
        );
        assert_eq!(
            AuthError::InvalidHeader.to_string(),
            "Invalid Authorization header format. Expected 'Bearer <token>'."
        );
    }

    #[tokio::test]
    async fn test_valid_token_yields_principal() {
        let validator = JwtValidator::new(TEST_SECRET);
        let headers = bearer(&format!("Bearer {}", token(Duration::hours(1))));
        let principal = authenticate(&validator, None, &headers).await.unwrap();
        assert_eq!(principal.user_id.as_deref(), Some("7"));
        assert_eq!(principal.team_id.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_expired_token() {
        let validator = JwtValidator::new(TEST_SECRET);
        let query = format!("token={}", token(Duration::hours(-1)));
        assert_eq!(
            authenticate(&validator, Some(&query), &HeaderMap::new()).await,
            Err(AuthError::Expired)
        );
    }

    #[tokio::test]
    async fn test_wrong_secret_is_invalid() {
        let validator = JwtValidator::new(b"another secret");
        let query = format!("token={}", token(Duration::hours(1)));
        let err = authenticate(&validator, Some(&query), &HeaderMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));
        assert!(err.to_string().starts_with("Invalid token: "));
    }

    #[tokio::test]
    async fn test_garbage_token_is_malformed() {
        let validator = JwtValidator::new(TEST_SECRET);
        assert_eq!(
            authenticate(&validator, Some("token=not-a-jwt"), &HeaderMap::new()).await,
            Err(AuthError::Malformed)
        );
    }

    #[tokio::test]
    async fn test_disabled_auth_needs_no_token() {
        let principal = authenticate(&DisabledAuth, None, &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(principal, Principal::default());
    }
}
