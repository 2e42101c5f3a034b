//! Token fixtures for tests

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use serde_json::{Value, json};

pub const CLIENT_ID: &str = "CimedClient";

/// Build an unsigned JWT around `payload`
pub fn encode_token(payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{}.{}.signature", header, body)
}

/// Token for `CimedClient` expiring `secs` from now (negative = already expired)
pub fn token_expiring_in(secs: i64, roles: &[&str]) -> String {
    let now = Utc::now().timestamp();
    encode_token(&json!({
        "exp": now + secs,
        "iat": now,
        "sub": "user-1",
        "preferred_username": "ana",
        "org": 7,
        "resource_access": { "CimedClient": { "roles": roles } }
    }))
}
