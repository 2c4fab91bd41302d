//! HTTP client for the catalog API

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use showroom_core::UserRecord;
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::types::{ApiEnvelope, AuthPayload, LoginRequest, RegisterRequest};

/// Requests are abandoned after this long and surface as transport errors
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared holder of the current bearer token.
///
/// Every authenticated call reads it; the auth controller writes it on
/// login/startup restore and clears it on logout/invalidation. It is
/// injected into the client rather than living in module state, so tests
/// can observe it in isolation.
#[derive(Debug, Clone, Default)]
pub struct TokenSlot {
    inner: Arc<RwLock<Option<String>>>,
}

impl TokenSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: &str) {
        *self.inner.write().unwrap() = Some(token.to_string());
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap() = None;
    }

    pub fn get(&self) -> Option<String> {
        self.inner.read().unwrap().clone()
    }

    pub fn is_set(&self) -> bool {
        self.inner.read().unwrap().is_some()
    }
}

/// HTTP client for the catalog API
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: TokenSlot,
}

impl ApiClient {
    /// Create a client with the default request timeout
    pub fn new(base_url: &str, token: TokenSlot) -> Self {
        Self::with_timeout(base_url, token, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, token: TokenSlot, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn token_slot(&self) -> &TokenSlot {
        &self.token
    }

    /// Exchange credentials for a token and user record
    #[instrument(skip(self, request), fields(identifier = %request.identifier))]
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthPayload> {
        let envelope: ApiEnvelope<AuthPayload> = self
            .request(self.http.post(self.url("/api/auth/login")).json(request))
            .await?;
        payload(envelope, "login")
    }

    /// Create an account; on success the new identity is the active session
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthPayload> {
        let envelope: ApiEnvelope<AuthPayload> = self
            .request(self.http.post(self.url("/api/auth/register")).json(request))
            .await?;
        payload(envelope, "register")
    }

    /// Notify the server the session is ending
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let _: ApiEnvelope<serde_json::Value> = self
            .request(self.http.post(self.url("/api/auth/logout")))
            .await?;
        Ok(())
    }

    /// Fetch the identity the current token belongs to
    #[instrument(skip(self))]
    pub async fn verify(&self) -> Result<UserRecord> {
        let envelope: ApiEnvelope<UserRecord> =
            self.request(self.http.get(self.url("/api/auth/me"))).await?;
        payload(envelope, "profile")
    }

    /// Authenticated GET returning the envelope payload.
    /// Used by the catalog screens for their list/detail calls.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let envelope: ApiEnvelope<T> = self.request(self.http.get(self.url(path))).await?;
        payload(envelope, path)
    }

    /// Authenticated POST returning the envelope payload
    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let envelope: ApiEnvelope<T> = self
            .request(self.http.post(self.url(path)).json(body))
            .await?;
        payload(envelope, path)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request with the bearer token attached and classify the outcome
    async fn request<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<ApiEnvelope<T>> {
        let builder = match self.token.get() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = %status, "API response");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Unauthorized(
                extract_message(&body).unwrap_or_else(|| "token rejected".to_string()),
            ));
        }

        let envelope: ApiEnvelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                return Err(Error::Protocol(format!("undecodable response: {e}")));
            }
            Err(_) => {
                return Err(Error::Validation(format!(
                    "request failed with status {status}"
                )));
            }
        };

        if !status.is_success() || !envelope.success {
            return Err(Error::Validation(envelope.message.unwrap_or_else(|| {
                format!("request failed with status {status}")
            })));
        }

        Ok(envelope)
    }
}

/// Unwrap the envelope payload, treating a missing body as a protocol error
fn payload<T>(envelope: ApiEnvelope<T>, what: &str) -> Result<T> {
    envelope
        .data
        .ok_or_else(|| Error::Protocol(format!("{what} response missing payload")))
}

fn extract_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiEnvelope<serde_json::Value>>(body)
        .ok()
        .and_then(|envelope| envelope.message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned response per connection until dropped
    async fn stub_server(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });

        format!("http://{addr}")
    }

    fn login_request() -> LoginRequest {
        LoginRequest {
            identifier: "admin".to_string(),
            password: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_login_success() {
        let base = stub_server(
            "200 OK",
            r#"{"success": true, "data": {"user": {"id": 1, "role": "admin", "username": "a"}, "token": "tok123"}}"#,
        )
        .await;
        let client = ApiClient::new(&base, TokenSlot::new());

        let payload = client.login(&login_request()).await.unwrap();
        assert_eq!(payload.token, "tok123");
        assert!(payload.user.is_admin());
    }

    #[tokio::test]
    async fn test_rejected_credentials_classified_as_validation() {
        let base = stub_server(
            "200 OK",
            r#"{"success": false, "message": "Invalid credentials"}"#,
        )
        .await;
        let client = ApiClient::new(&base, TokenSlot::new());

        let err = client.login(&login_request()).await.unwrap_err();
        match err {
            Error::Validation(message) => assert_eq!(message, "Invalid credentials"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_401_classified_as_unauthorized() {
        let base = stub_server(
            "401 Unauthorized",
            r#"{"success": false, "message": "Token expired"}"#,
        )
        .await;
        let client = ApiClient::new(&base, TokenSlot::new());
        client.token_slot().set("stale-token");

        let err = client.verify().await.unwrap_err();
        assert!(err.is_authorization());
        match err {
            Error::Unauthorized(message) => assert_eq!(message, "Token expired"),
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ApiClient::new(&format!("http://{addr}"), TokenSlot::new());
        let err = client.verify().await.unwrap_err();

        assert!(err.is_transport());
        assert!(!err.is_authorization());
    }

    #[tokio::test]
    async fn test_timeout_is_transport() {
        // Accept connections but never respond
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = ApiClient::with_timeout(
            &format!("http://{addr}"),
            TokenSlot::new(),
            Duration::from_millis(200),
        );
        let err = client.verify().await.unwrap_err();

        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_undecodable_body_is_protocol_error() {
        let base = stub_server("200 OK", "<html>gateway</html>").await;
        let client = ApiClient::new(&base, TokenSlot::new());

        let err = client.verify().await.unwrap_err();
        match err {
            Error::Protocol(_) => {}
            other => panic!("expected Protocol, got {other:?}"),
        }
    }

    #[test]
    fn test_token_slot_shared_between_clones() {
        let slot = TokenSlot::new();
        let observer = slot.clone();

        assert!(!observer.is_set());
        slot.set("tok1");
        assert_eq!(observer.get().as_deref(), Some("tok1"));
        slot.clear();
        assert!(observer.get().is_none());
    }
}
