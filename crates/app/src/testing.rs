//! Test doubles shared by the controller, guard, and retry tests

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use showroom_core::{Database, UserRecord, ADMIN_ROLE};
use showroom_net::{
    AuthPayload, Error, IdentityGateway, LoginRequest, RegisterRequest, Result, TokenSlot,
};
use tokio::sync::{mpsc, Notify};

use crate::auth::{AuthController, AuthEvent};

pub fn admin_user(username: &str) -> UserRecord {
    UserRecord {
        id: Some(1),
        username: Some(username.to_string()),
        role: Some(ADMIN_ROLE.to_string()),
        ..Default::default()
    }
}

pub fn admin_payload(token: &str, username: &str) -> AuthPayload {
    AuthPayload {
        user: admin_user(username),
        token: token.to_string(),
    }
}

/// Scripted response for one gateway endpoint
#[derive(Clone)]
enum Script {
    Auth(AuthPayload),
    User(UserRecord),
    Unauthorized(String),
    Validation(String),
    Transport,
}

impl Script {
    fn into_error(self) -> Error {
        match self {
            Script::Unauthorized(message) => Error::Unauthorized(message),
            Script::Validation(message) => Error::Validation(message),
            Script::Transport => Error::Transport("connection refused".to_string()),
            Script::Auth(_) | Script::User(_) => panic!("script is not an error"),
        }
    }
}

/// Identity gateway with scripted responses
pub struct MockGateway {
    login: Mutex<Script>,
    register: Mutex<Script>,
    verify: Mutex<Script>,
    logout_fails: bool,
    login_gate: Option<Arc<Notify>>,
    pub verify_calls: AtomicU32,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            login: Mutex::new(Script::Validation("login not scripted".to_string())),
            register: Mutex::new(Script::Validation("register not scripted".to_string())),
            verify: Mutex::new(Script::Unauthorized("verify not scripted".to_string())),
            logout_fails: false,
            login_gate: None,
            verify_calls: AtomicU32::new(0),
        }
    }

    pub fn login_ok(self, payload: AuthPayload) -> Self {
        *self.login.lock().unwrap() = Script::Auth(payload);
        self
    }

    pub fn login_validation(self, message: &str) -> Self {
        *self.login.lock().unwrap() = Script::Validation(message.to_string());
        self
    }

    pub fn login_transport(self) -> Self {
        *self.login.lock().unwrap() = Script::Transport;
        self
    }

    pub fn register_ok(self, payload: AuthPayload) -> Self {
        *self.register.lock().unwrap() = Script::Auth(payload);
        self
    }

    pub fn verify_user(self, user: UserRecord) -> Self {
        *self.verify.lock().unwrap() = Script::User(user);
        self
    }

    pub fn verify_unauthorized(self, message: &str) -> Self {
        *self.verify.lock().unwrap() = Script::Unauthorized(message.to_string());
        self
    }

    pub fn verify_transport(self) -> Self {
        *self.verify.lock().unwrap() = Script::Transport;
        self
    }

    pub fn logout_fails(mut self) -> Self {
        self.logout_fails = true;
        self
    }

    /// Make login wait on the notify before answering, so tests can
    /// observe the in-flight window
    pub fn gate_login(mut self, gate: Arc<Notify>) -> Self {
        self.login_gate = Some(gate);
        self
    }
}

#[async_trait]
impl IdentityGateway for MockGateway {
    async fn login(&self, _request: &LoginRequest) -> Result<AuthPayload> {
        if let Some(gate) = &self.login_gate {
            gate.notified().await;
        }
        match self.login.lock().unwrap().clone() {
            Script::Auth(payload) => Ok(payload),
            other => Err(other.into_error()),
        }
    }

    async fn register(&self, _request: &RegisterRequest) -> Result<AuthPayload> {
        match self.register.lock().unwrap().clone() {
            Script::Auth(payload) => Ok(payload),
            other => Err(other.into_error()),
        }
    }

    async fn logout(&self) -> Result<()> {
        if self.logout_fails {
            return Err(Error::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    async fn verify(&self) -> Result<UserRecord> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        match self.verify.lock().unwrap().clone() {
            Script::User(user) => Ok(user),
            Script::Auth(payload) => Ok(payload.user),
            other => Err(other.into_error()),
        }
    }
}

/// Controller over an in-memory database and the given gateway
pub fn controller_with(
    gateway: Arc<MockGateway>,
) -> (
    AuthController,
    mpsc::UnboundedReceiver<AuthEvent>,
    TokenSlot,
) {
    let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
    let slot = TokenSlot::new();
    let (controller, events) = AuthController::new(db, gateway, slot.clone());
    (controller, events, slot)
}
