//! Parameter block carried in the first segment of a mock path.
//!
//! Clients may prefix the lookup path with `base64url(json)` to pass flags:
//!
//! ```text
//! /mock/acme/widgets/eyJmb3J3YXJkIjp0cnVlfQ==/status
//!                    ^ {"forward":true}       ^ lookup path
//! ```
//!
//! A first segment that does not decode or does not parse is not an error;
//! the whole segment is then the literal lookup path.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// URL-safe alphabet, padded on encode, padding optional on decode.
const PARAMS_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("parameter block is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("parameter block is not a JSON object: {0}")]
    Json(#[from] serde_json::Error),
}

/// Flags a caller can attach to a mock request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_forward_call: Option<bool>,
}

impl MockParams {
    pub fn wants_forward(&self) -> bool {
        self.forward.unwrap_or(false)
    }

    pub fn is_forward_call(&self) -> bool {
        self.is_forward_call.unwrap_or(false)
    }

    /// Flags for the outgoing hop: same request, but marked as already relayed.
    pub fn for_relay(&self) -> Self {
        Self {
            is_forward_call: Some(true),
            ..*self
        }
    }

    /// Encode as a path segment.
    pub fn encode(&self) -> Result<String, CodecError> {
        let json = serde_json::to_vec(self)?;
        Ok(PARAMS_ENGINE.encode(json))
    }

    /// Decode a single path segment.
    pub fn decode(segment: &str) -> Result<Self, CodecError> {
        let bytes = PARAMS_ENGINE.decode(segment)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Result of splitting the wildcard part of a mock path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPath {
    /// `None` when the first segment was not a parameter block.
    pub params: Option<MockParams>,
    /// Path used to look up the Url definition; always starts with `/`.
    pub lookup_path: String,
}

impl DecodedPath {
    /// Flags in effect, all unset when no block was present.
    pub fn flags(&self) -> MockParams {
        self.params.unwrap_or_default()
    }
}

/// Split `wildcard` (everything after the project slug) into flags and lookup path.
pub fn decode_path(wildcard: &str) -> DecodedPath {
    let trimmed = wildcard.strip_prefix('/').unwrap_or(wildcard);
    let (head, rest) = match trimmed.split_once('/') {
        Some((head, rest)) => (head, Some(rest)),
        None => (trimmed, None),
    };

    match MockParams::decode(head) {
        Ok(params) => DecodedPath {
            params: Some(params),
            lookup_path: match rest {
                Some(rest) => format!("/{rest}"),
                None => "/".to_string(),
            },
        },
        Err(e) => {
            debug!("No parameter block in '{}': {}", wildcard, e);
            DecodedPath {
                params: None,
                lookup_path: literal_path(wildcard),
            }
        }
    }
}

/// Build the wildcard for a relayed request: flags marked as forwarded, then the lookup path.
pub fn encode_relay_path(params: &MockParams, lookup_path: &str) -> Result<String, CodecError> {
    let segment = params.for_relay().encode()?;
    Ok(format!("/{segment}{}", literal_path(lookup_path)))
}

fn literal_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}
