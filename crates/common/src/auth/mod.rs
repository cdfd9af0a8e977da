//! Authentication utilities
//!
//! Provides:
//! - Store credentials (administrative service key or per-session token)
//! - Bearer token extraction
//! - Request auth context extraction

use axum::{extract::FromRequestParts, http::request::Parts};
use sha2::{Digest, Sha256};
use std::convert::Infallible;
use std::fmt;
use uuid::Uuid;

/// Credentials presented to the hosted store
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Administrative context
    Service(String),
    /// A signed-in user's access token
    Session(String),
}

impl Credentials {
    /// The value to send as `Authorization: Bearer`
    pub fn bearer(&self) -> &str {
        match self {
            Credentials::Service(key) => key,
            Credentials::Session(token) => token,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Service(key) => write!(f, "Service({})", fingerprint(key)),
            Credentials::Session(token) => write!(f, "Session({})", fingerprint(token)),
        }
    }
}

/// Short stable digest of a secret, safe to log
pub fn fingerprint(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(&hasher.finalize()[..4])
}

/// Extract the token from an `Authorization: Bearer` header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication context available to handlers
///
/// A missing token is tolerated: calls are then made without a session and
/// the upstream services decide what to allow.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Session token, if the caller sent one
    pub token: Option<String>,

    /// Request ID for tracing
    pub request_id: String,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self {
            token: None,
            request_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Session credentials for store calls made on the caller's behalf
    pub fn credentials(&self) -> Option<Credentials> {
        self.token.clone().map(Credentials::Session)
    }
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer)
            .map(String::from);

        Ok(AuthContext { token, request_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer    "), None);
        assert_eq!(extract_bearer("abc.def"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_debug_hides_secret() {
        let creds = Credentials::Session("super-secret-token".into());
        let shown = format!("{:?}", creds);
        assert!(!shown.contains("super-secret-token"));
        assert!(shown.starts_with("Session("));
        assert_eq!(creds.bearer(), "super-secret-token");
    }

    #[tokio::test]
    async fn test_extractor_tolerates_missing_token() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let ctx = AuthContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(ctx.token.is_none());
        assert!(ctx.credentials().is_none());
        assert!(!ctx.request_id.is_empty());
    }

    #[tokio::test]
    async fn test_extractor_reads_bearer_and_request_id() {
        let (mut parts, _) = Request::builder()
            .header("authorization", "Bearer tok-1")
            .header("x-request-id", "req-7")
            .body(())
            .unwrap()
            .into_parts();
        let ctx = AuthContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ctx.token(), Some("tok-1"));
        assert_eq!(ctx.request_id, "req-7");
    }
}
