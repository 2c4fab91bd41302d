//! Canonical in-memory authentication state
//!
//! The controller is the single source of truth for "who is signed in
//! right now". It reconciles the persisted Session Record against the
//! identity-verification endpoint on startup and mediates every
//! state-changing auth operation. Screens observe the resulting phase;
//! they never classify network failures themselves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use showroom_core::{Database, UserRecord};
use showroom_net::{AuthPayload, Error, IdentityGateway, LoginRequest, RegisterRequest, TokenSlot};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

/// Resolution state of the current identity.
///
/// `Unresolved` is load-bearing: it means "not determined yet" and must
/// block any definitive authorization decision. It is a distinct variant
/// rather than an absent user so it cannot be mistaken for anonymous.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AuthPhase {
    #[default]
    Unresolved,
    Anonymous,
    Authenticated(UserRecord),
}

/// Notifications for the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// The session was invalidated; navigate to the login entry point
    ReauthRequired,
    /// The user signed out
    SignedOut,
}

/// Outcome of a login or registration attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Authenticated(UserRecord),
    /// The server rejected the attempt; the message is user-readable
    Rejected(String),
    /// Another attempt was already in flight; this one was not sent
    Ignored,
}

pub struct AuthController {
    db: Arc<Mutex<Database>>,
    gateway: Arc<dyn IdentityGateway>,
    token_slot: TokenSlot,
    phase: Mutex<AuthPhase>,
    last_error: Mutex<Option<String>>,
    server_unreachable: AtomicBool,
    reconciled: AtomicBool,
    attempt_in_flight: AtomicBool,
    events: mpsc::UnboundedSender<AuthEvent>,
}

impl AuthController {
    pub fn new(
        db: Arc<Mutex<Database>>,
        gateway: Arc<dyn IdentityGateway>,
        token_slot: TokenSlot,
    ) -> (Self, mpsc::UnboundedReceiver<AuthEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();

        let controller = Self {
            db,
            gateway,
            token_slot,
            phase: Mutex::new(AuthPhase::Unresolved),
            last_error: Mutex::new(None),
            server_unreachable: AtomicBool::new(false),
            reconciled: AtomicBool::new(false),
            attempt_in_flight: AtomicBool::new(false),
            events,
        };

        (controller, event_rx)
    }

    /// Reconcile the persisted session with the verification endpoint.
    ///
    /// Runs once at startup; re-running with no intervening login/logout
    /// reaches the same state. An explicit token rejection evicts the
    /// session; an unreachable server does not, so a brief backend outage
    /// never logs anyone out.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) {
        let stored_token = { self.db.lock().unwrap().session().token() };

        let Some(token) = stored_token else {
            self.set_phase(AuthPhase::Anonymous);
            self.reconciled.store(true, Ordering::SeqCst);
            return;
        };

        // The verification call itself must be authenticated, so the slot
        // is filled before anything goes over the wire.
        self.token_slot.set(&token);

        match self.gateway.verify().await {
            Ok(user) => {
                let db = self.db.lock().unwrap();
                if let Err(e) = db.session().update_user(&user) {
                    warn!(error = %e, "Failed to refresh cached user snapshot");
                }
                drop(db);

                self.server_unreachable.store(false, Ordering::SeqCst);
                self.set_phase(AuthPhase::Authenticated(user));
            }
            Err(e) if e.is_authorization() => {
                info!("Stored token rejected, clearing session");
                self.clear_local_session();
                self.set_phase(AuthPhase::Anonymous);
            }
            Err(e) => {
                // Server unreachable: keep the record and run on the
                // cached snapshot until the backend comes back.
                warn!(error = %e, "Verification endpoint unreachable, using cached session");
                self.server_unreachable.store(true, Ordering::SeqCst);

                let cached = { self.db.lock().unwrap().session().user() };
                match cached {
                    Some(user) => self.set_phase(AuthPhase::Authenticated(user)),
                    // No snapshot to present; the record stays for the
                    // next reconcile attempt.
                    None => self.set_phase(AuthPhase::Anonymous),
                }
            }
        }

        self.reconciled.store(true, Ordering::SeqCst);
    }

    /// Sign in. On failure no session state changes; the message lands in
    /// `last_error` and the returned outcome.
    #[instrument(skip(self, request), fields(identifier = %request.identifier))]
    pub async fn login(&self, request: &LoginRequest) -> AuthOutcome {
        if self.attempt_in_flight.swap(true, Ordering::SeqCst) {
            return AuthOutcome::Ignored;
        }

        *self.last_error.lock().unwrap() = None;
        let outcome = match self.gateway.login(request).await {
            Ok(payload) => self.adopt_session(payload),
            Err(e) => self.reject_attempt(&e),
        };

        self.attempt_in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    /// Create an account; on success the new identity becomes the active
    /// session exactly as with login.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn register(&self, request: &RegisterRequest) -> AuthOutcome {
        if self.attempt_in_flight.swap(true, Ordering::SeqCst) {
            return AuthOutcome::Ignored;
        }

        *self.last_error.lock().unwrap() = None;
        let outcome = match self.gateway.register(request).await {
            Ok(payload) => self.adopt_session(payload),
            Err(e) => self.reject_attempt(&e),
        };

        self.attempt_in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    /// Sign out. The remote notification is best-effort; local cleanup is
    /// unconditional.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if let Err(e) = self.gateway.logout().await {
            warn!(error = %e, "Logout notification failed, clearing locally anyway");
        }

        self.clear_local_session();
        self.set_phase(AuthPhase::Anonymous);
        let _ = self.events.send(AuthEvent::SignedOut);
    }

    /// Check the current session against the verification endpoint,
    /// refreshing the cached snapshot on success.
    ///
    /// A transport failure counts as valid: a timeout is not evidence the
    /// token is bad and must never log anyone out.
    pub async fn verify_session(&self) -> bool {
        if !self.token_slot.is_set() {
            // The controller may not have reconciled yet; restore the
            // stored token so the check is authenticated.
            let stored = { self.db.lock().unwrap().session().token() };
            match stored {
                Some(token) => self.token_slot.set(&token),
                None => return false,
            }
        }

        match self.gateway.verify().await {
            Ok(user) => {
                let db = self.db.lock().unwrap();
                if let Err(e) = db.session().update_user(&user) {
                    warn!(error = %e, "Failed to refresh cached user snapshot");
                }
                drop(db);
                self.set_phase(AuthPhase::Authenticated(user));
                true
            }
            Err(e) if e.is_authorization() => false,
            Err(_) => true,
        }
    }

    /// Invalidate the local session and tell the shell to navigate to the
    /// login entry point. Returns whether a usable session remains — it
    /// never does, since there is no refresh endpoint to mint a new token.
    pub fn force_reauth(&self) -> bool {
        self.clear_local_session();
        self.set_phase(AuthPhase::Anonymous);
        let _ = self.events.send(AuthEvent::ReauthRequired);

        self.db.lock().unwrap().session().is_authenticated()
    }

    /// Prefer resolved in-memory state; fall back to durable storage only
    /// while the phase is unresolved (route guards and other early
    /// consumers run before reconciliation finishes).
    pub fn is_authenticated(&self) -> bool {
        match &*self.phase.lock().unwrap() {
            AuthPhase::Authenticated(_) => true,
            AuthPhase::Anonymous => false,
            AuthPhase::Unresolved => self.db.lock().unwrap().session().is_authenticated(),
        }
    }

    pub fn is_admin(&self) -> bool {
        match &*self.phase.lock().unwrap() {
            AuthPhase::Authenticated(user) => user.is_admin(),
            AuthPhase::Anonymous => false,
            AuthPhase::Unresolved => self.db.lock().unwrap().session().is_admin(),
        }
    }

    pub fn phase(&self) -> AuthPhase {
        self.phase.lock().unwrap().clone()
    }

    /// True until the first reconciliation completes
    pub fn is_loading(&self) -> bool {
        !self.reconciled.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    /// Distinguishes "you are logged out" from "the server is down"
    pub fn server_unreachable(&self) -> bool {
        self.server_unreachable.load(Ordering::SeqCst)
    }

    fn adopt_session(&self, payload: AuthPayload) -> AuthOutcome {
        // The token reaches the request layer before durable storage, so
        // anything reacting to "session now exists" can immediately make
        // authenticated calls.
        self.token_slot.set(&payload.token);

        let write = {
            self.db
                .lock()
                .unwrap()
                .session()
                .set_session(&payload.token, &payload.user)
        };
        if let Err(e) = write {
            warn!(error = %e, "Failed to persist session; it remains active in memory");
        }

        self.server_unreachable.store(false, Ordering::SeqCst);
        self.set_phase(AuthPhase::Authenticated(payload.user.clone()));
        AuthOutcome::Authenticated(payload.user)
    }

    fn reject_attempt(&self, e: &Error) -> AuthOutcome {
        let message = failure_message(e);
        *self.last_error.lock().unwrap() = Some(message.clone());
        AuthOutcome::Rejected(message)
    }

    fn clear_local_session(&self) {
        {
            let db = self.db.lock().unwrap();
            if let Err(e) = db.session().clear() {
                warn!(error = %e, "Failed to clear stored session");
            }
        }
        self.token_slot.clear();
    }

    fn set_phase(&self, phase: AuthPhase) {
        *self.phase.lock().unwrap() = phase;
    }
}

#[cfg(test)]
impl AuthController {
    /// Seed a stored session directly, bypassing the gateway
    pub(crate) fn seed_for_tests(&self, token: &str, user: &UserRecord) {
        self.db
            .lock()
            .unwrap()
            .session()
            .set_session(token, user)
            .unwrap();
    }
}

/// Reduce an API error to the message a person should see
fn failure_message(e: &Error) -> String {
    match e {
        Error::Unauthorized(message) | Error::Validation(message) => message.clone(),
        Error::Transport(_) => "server unavailable".to_string(),
        Error::Protocol(_) => e.to_string(),
    }
}
