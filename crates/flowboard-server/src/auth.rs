//! Bearer-token verification against the managed auth provider.
//!
//! The relay never decodes tokens itself; it asks the provider's user
//! endpoint who the token belongs to. Any failure on that path is an
//! authorization failure for the request — no retries.

use axum::http::HeaderMap;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("auth provider request failed: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
}

/// Extract the token from an `Authorization: Bearer ...` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolves bearer tokens through the auth provider's `/auth/v1/user`
/// endpoint using the project's publishable key.
#[derive(Clone)]
pub struct AuthVerifier {
    client: reqwest::Client,
    base_url: String,
    publishable_key: String,
}

impl std::fmt::Debug for AuthVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthVerifier")
            .field("base_url", &self.base_url)
            .field("publishable_key", &"[REDACTED]")
            .finish()
    }
}

impl AuthVerifier {
    pub fn new(base_url: impl Into<String>, publishable_key: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
            publishable_key: publishable_key.into(),
        }
    }

    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {token}"))
            .header("apikey", &self.publishable_key)
            .send()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(AuthError::InvalidToken);
        }
        if !response.status().is_success() {
            return Err(AuthError::Provider(format!(
                "status {}",
                response.status()
            )));
        }

        response
            .json::<AuthenticatedUser>()
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_none());

        headers.insert("authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert("authorization", "Basic abc123".parse().unwrap());
        assert!(bearer_token(&headers).is_none());
    }

    #[tokio::test]
    async fn test_authenticate_resolves_user_id() {
        let server = MockServer::start().await;
        let user_id = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("Authorization", "Bearer good-token"))
            .and(header("apikey", "publishable"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": user_id,
                "email": "user@example.com"
            })))
            .mount(&server)
            .await;

        let verifier = AuthVerifier::new(server.uri(), "publishable");
        let user = verifier.authenticate("good-token").await.unwrap();
        assert_eq!(user.id, user_id);
    }

    #[tokio::test]
    async fn test_rejected_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let verifier = AuthVerifier::new(server.uri(), "publishable");
        let err = verifier.authenticate("bad-token").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_provider_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let verifier = AuthVerifier::new(server.uri(), "publishable");
        let err = verifier.authenticate("token").await.unwrap_err();
        assert!(matches!(err, AuthError::Provider(_)));
    }
}
