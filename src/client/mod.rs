//! Clinic backend and identity provider clients

use serde::Serialize;

pub mod acquire;
pub mod admin;
pub mod authenticated;
#[cfg(test)]
pub mod mock;

pub use acquire::{Credentials, IdentityProvider, TokenAcquirer, acquirer_for};
pub use admin::{NewUser, register_user};
pub use authenticated::AuthenticatedClient;

/// Normalized outcome of a backend request.
///
/// Failures never surface as errors; `data` is `None` and `status_text`
/// carries the best available description.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub status: u16,
    pub status_text: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T, status: u16, status_text: impl Into<String>) -> Self {
        Self {
            data: Some(data),
            status,
            status_text: status_text.into(),
        }
    }

    pub fn failure(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            data: None,
            status,
            status_text: status_text.into(),
        }
    }

    /// The fixed shape returned for a rejected (401) request
    pub fn unauthorized() -> Self {
        Self::failure(401, "Unauthorized")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unauthorized_shape() {
        let response: ApiResponse<serde_json::Value> = ApiResponse::unauthorized();

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"data": null, "status": 401, "statusText": "Unauthorized"})
        );
        assert!(!response.is_success());
    }

    #[test]
    fn test_success_is_success() {
        let response = ApiResponse::success(json!([]), 201, "Created");
        assert!(response.is_success());
        assert_eq!(response.data, Some(json!([])));
    }
}
