//! Common CLI types shared across commands

use reqwest::Method;

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty format - human-optimized rich formatting
    Pretty,
    /// Table format - one row per field (global default)
    #[default]
    Table,
    /// JSON format - structured for scripts/APIs
    Json,
}

/// HTTP method for the `api` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum HttpMethod {
    #[value(alias = "get")]
    Get,
    #[value(alias = "post")]
    Post,
    #[value(alias = "put")]
    Put,
    #[value(alias = "patch")]
    Patch,
    #[value(alias = "delete")]
    Delete,
}

impl HttpMethod {
    /// Whether the method carries a request body
    pub fn has_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    #[test]
    fn test_http_method_parses_either_case() {
        assert_eq!(HttpMethod::from_str("GET", false).unwrap(), HttpMethod::Get);
        assert_eq!(HttpMethod::from_str("delete", false).unwrap(), HttpMethod::Delete);
    }

    #[test]
    fn test_http_method_body() {
        assert!(HttpMethod::Post.has_body());
        assert!(!HttpMethod::Get.has_body());
        assert_eq!(Method::from(HttpMethod::Patch), Method::PATCH);
    }
}
