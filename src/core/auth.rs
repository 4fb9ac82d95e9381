/// API Key Gate
///
/// Static shared-secret check in front of the MCP endpoints. The key may be
/// sent as `Authorization: Bearer <key>`, as `X-API-Key: <key>`, or as a
/// `?key=<key>` query parameter; the first non-empty one is used.

use std::collections::HashMap;

use actix_web::http::header::{AUTHORIZATION, AsHeaderName};
use actix_web::{HttpRequest, web};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::core::error::AppError;

const API_KEY_HEADER: &str = "x-api-key";

/// The gate depends only on whether a key is configured. The deployment
/// environment label does not relax or tighten it.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    api_key: Option<String>,
}

impl AuthConfig {
    /// `None` leaves the endpoints open, which is meant for local development.
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }

    pub fn is_enforced(&self) -> bool {
        self.api_key.is_some()
    }

    /// Check the request against the configured key.
    ///
    /// # Errors
    /// Returns `AppError::Unauthorized` when a key is configured and the
    /// request carries no key or a different one.
    pub fn authorize(&self, req: &HttpRequest) -> Result<(), AppError> {
        let Some(expected) = &self.api_key else {
            return Ok(());
        };

        match extract_api_key(req) {
            Some(provided) if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
            provided => {
                warn!(
                    path = req.path(),
                    key_present = provided.is_some(),
                    "rejected request with invalid API key"
                );
                Err(AppError::Unauthorized)
            }
        }
    }
}

/// Pull the caller's key from the request, in header-then-query order.
pub fn extract_api_key(req: &HttpRequest) -> Option<String> {
    header_value(req, AUTHORIZATION)
        .map(|value| value.replacen("Bearer ", "", 1))
        .filter(|key| !key.is_empty())
        .or_else(|| header_value(req, API_KEY_HEADER).filter(|key| !key.is_empty()))
        .or_else(|| {
            web::Query::<HashMap<String, String>>::from_query(req.query_string())
                .ok()
                .and_then(|query| query.into_inner().remove("key"))
                .filter(|key| !key.is_empty())
        })
}

fn header_value(req: &HttpRequest, name: impl AsHeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn bearer_token_wins_over_other_sources() {
        let req = TestRequest::default()
            .uri("/mcp?key=from-query")
            .insert_header((AUTHORIZATION, "Bearer from-bearer"))
            .insert_header(("X-API-Key", "from-header"))
            .to_http_request();
        assert_eq!(extract_api_key(&req).as_deref(), Some("from-bearer"));
    }

    #[test]
    fn falls_back_to_header_then_query() {
        let req = TestRequest::default()
            .uri("/mcp?key=from-query")
            .insert_header(("X-API-Key", "from-header"))
            .to_http_request();
        assert_eq!(extract_api_key(&req).as_deref(), Some("from-header"));

        let req = TestRequest::default()
            .uri("/mcp?key=from-query")
            .insert_header((AUTHORIZATION, "Bearer "))
            .to_http_request();
        assert_eq!(extract_api_key(&req).as_deref(), Some("from-query"));

        let req = TestRequest::default().uri("/mcp").to_http_request();
        assert_eq!(extract_api_key(&req), None);
    }

    #[test]
    fn open_when_no_key_configured() {
        let auth = AuthConfig::new(None);
        let req = TestRequest::default().to_http_request();
        assert!(!auth.is_enforced());
        assert!(auth.authorize(&req).is_ok());
    }

    #[test]
    fn enforces_configured_key() {
        let auth = AuthConfig::new(Some("secret".to_string()));

        let good = TestRequest::default()
            .insert_header(("X-API-Key", "secret"))
            .to_http_request();
        assert!(auth.authorize(&good).is_ok());

        let wrong = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer secret2"))
            .to_http_request();
        assert!(matches!(auth.authorize(&wrong), Err(AppError::Unauthorized)));

        let missing = TestRequest::default().to_http_request();
        assert!(matches!(auth.authorize(&missing), Err(AppError::Unauthorized)));
    }
}
