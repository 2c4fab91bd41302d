//! One-shot recovery wrapper for authenticated API calls
//!
//! There is no refresh-token endpoint, so recovery cannot mint a new
//! token and silently replay the request. Instead it is a hard
//! re-authentication: clear the local session, point the user at login,
//! and surface the error. Fail fast, never loop.

use std::future::Future;

use showroom_net::Result;
use tracing::warn;

use crate::auth::AuthController;

/// Default number of recovery attempts for an authorization failure
pub const DEFAULT_AUTH_RETRIES: u32 = 1;

/// Run an authenticated API call with one chance to recover from an
/// authorization failure.
///
/// Before the first attempt the current session is checked against the
/// verification endpoint; a session already known to be invalid is
/// recovered without the call ever being made. A transport failure during
/// that check is not treated as invalid (see
/// [`AuthController::verify_session`]).
///
/// Authorization failures from the call trigger recovery at most
/// `max_retries` times; the call is replayed only if recovery left a
/// usable session behind. Any other failure propagates immediately.
pub async fn execute_with_auth_retry<T, F, Fut>(
    auth: &AuthController,
    call: F,
    max_retries: u32,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if !auth.verify_session().await {
        warn!("Session invalid before request, forcing re-authentication");
        auth.force_reauth();
        return Err(showroom_net::Error::Unauthorized(
            "session is no longer valid".to_string(),
        ));
    }

    let mut attempts = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_authorization() && attempts < max_retries => {
                attempts += 1;
                warn!(attempt = attempts, "Authorization failure, recovering");
                if !auth.force_reauth() {
                    // No usable session after recovery; nothing to replay with
                    return Err(e);
                }
            }
            Err(e) => return Err(e),
        }
    }
}
