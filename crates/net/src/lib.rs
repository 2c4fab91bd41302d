//! Showroom Network Library
//!
//! HTTP access to the catalog API.
//!
//! # Architecture
//!
//! - **Client**: `reqwest`-backed caller with a shared bearer-token slot
//! - **Gateway**: identity endpoints behind a trait, so the auth
//!   controller can run against a mock
//! - **Types**: JSON envelope and request/response bodies
//!
//! # Usage
//!
//! ```ignore
//! let slot = TokenSlot::new();
//! let api = ApiClient::new("https://catalog.example.com", slot.clone());
//!
//! let payload = api.login(&LoginRequest {
//!     identifier: "admin".into(),
//!     password: "secret".into(),
//! }).await?;
//! slot.set(&payload.token);
//! ```

pub mod client;
pub mod error;
pub mod gateway;
pub mod types;

pub use client::{ApiClient, TokenSlot, REQUEST_TIMEOUT};
pub use error::{Error, Result};
pub use gateway::IdentityGateway;
pub use types::{ApiEnvelope, AuthPayload, LoginRequest, RegisterRequest};
