//! Bearer token claim decoding
//!
//! Reads the payload segment of a JWT. The signature is never verified: the
//! identity provider and backend own that; the client only reads claims to
//! gate views.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::config::SessionPolicy;
use crate::error::DecodeError;

/// Role tag carried by a session. Comparison is ASCII case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this role is one of `allowed`
    pub fn is_any_of(&self, allowed: &[String]) -> bool {
        allowed.iter().any(|r| r.eq_ignore_ascii_case(&self.0))
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Claims read from a token payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Claims {
    /// Expiry, Unix seconds
    pub exp: i64,
    /// Issued-at, Unix seconds
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Full role list found at the role claim path
    pub roles: Vec<String>,
    /// Authoritative role chosen by the configured index
    pub role: Option<Role>,
    pub organization_id: Option<i64>,
}

impl Claims {
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp < now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }
}

/// Decodes token payloads according to the session policy's claim paths
#[derive(Debug, Clone)]
pub struct TokenDecoder {
    role_claim_path: String,
    role_index: usize,
    organization_claim_path: String,
}

impl TokenDecoder {
    pub fn new(policy: &SessionPolicy) -> Self {
        Self {
            role_claim_path: policy.role_claim_path.clone(),
            role_index: policy.role_index,
            organization_claim_path: policy.organization_claim_path.clone(),
        }
    }

    /// Decode a raw bearer token into claims.
    ///
    /// Expired tokens decode fine; expiry is a policy decision for the caller.
    pub fn decode(&self, raw: &str) -> Result<Claims, DecodeError> {
        let segments: Vec<&str> = raw.trim().split('.').collect();
        if segments.len() != 3 {
            return Err(DecodeError::Segments(segments.len()));
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(segments[1].trim_end_matches('='))
            .map_err(|e| DecodeError::Base64(e.to_string()))?;

        let payload: Value =
            serde_json::from_slice(&bytes).map_err(|e| DecodeError::Json(e.to_string()))?;
        if !payload.is_object() {
            return Err(DecodeError::Json("payload is not an object".to_string()));
        }

        let exp = payload
            .get("exp")
            .and_then(as_timestamp)
            .ok_or(DecodeError::MissingClaim("exp"))?;
        let iat = payload.get("iat").and_then(as_timestamp);

        let roles: Vec<String> = claim_at(&payload, &self.role_claim_path)
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let role = roles.get(self.role_index).cloned().map(Role);

        let organization_id = claim_at(&payload, &self.organization_claim_path).and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
        });

        Ok(Claims {
            exp,
            iat,
            subject: payload.get("sub").and_then(Value::as_str).map(str::to_string),
            username: payload
                .get("preferred_username")
                .and_then(Value::as_str)
                .map(str::to_string),
            roles,
            role,
            organization_id,
        })
    }
}

/// Numeric date claims are integers in practice, but floats are legal JSON
fn as_timestamp(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.trunc() as i64))
}

/// Walk a dotted path through nested JSON objects
fn claim_at<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(payload, |node, segment| node.get(segment))
}
