//! Identity endpoints behind a trait
//!
//! The seam between the auth controller and the HTTP client, allowing for
//! different implementations (live API, mock for tests).

use async_trait::async_trait;
use showroom_core::UserRecord;

use crate::client::ApiClient;
use crate::error::Result;
use crate::types::{AuthPayload, LoginRequest, RegisterRequest};

/// Identity endpoint operations
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// Exchange credentials for a token and user record
    async fn login(&self, request: &LoginRequest) -> Result<AuthPayload>;

    /// Create an account; the new identity becomes the active session
    async fn register(&self, request: &RegisterRequest) -> Result<AuthPayload>;

    /// Notify the server the session is ending (best-effort by contract;
    /// callers must not let a failure here block local cleanup)
    async fn logout(&self) -> Result<()>;

    /// Fetch the identity the current token belongs to
    async fn verify(&self) -> Result<UserRecord>;
}

#[async_trait]
impl IdentityGateway for ApiClient {
    async fn login(&self, request: &LoginRequest) -> Result<AuthPayload> {
        ApiClient::login(self, request).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthPayload> {
        ApiClient::register(self, request).await
    }

    async fn logout(&self) -> Result<()> {
        ApiClient::logout(self).await
    }

    async fn verify(&self) -> Result<UserRecord> {
        ApiClient::verify(self).await
    }
}
