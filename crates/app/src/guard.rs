//! Route guard for protected console sections
//!
//! Runs on entry to every protected screen. The default policy reads the
//! Session Record synchronously and does not wait for the controller's
//! reconciliation: a screen admitted off cached storage will still fail
//! its API calls if the token turns out to be invalid, and the retry
//! wrapper handles that. The brief optimistic window is deliberate; the
//! alternative would make every protected screen block on a network
//! round-trip before rendering.

use serde::Deserialize;
use showroom_core::Database;

use crate::auth::AuthPhase;

/// How strictly the guard treats an unresolved controller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuardPolicy {
    /// Admit on the stored session; verification catches up asynchronously
    #[default]
    Optimistic,
    /// Hold rendering until the controller has resolved the phase
    BlockUntilReconciled,
}

/// What the caller should do with the protected screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Render the protected section
    Allow,
    /// Render nothing; navigate to the login entry point
    RedirectToLogin,
    /// Reconciliation still running; render a neutral waiting state
    Wait,
}

/// Gate a protected admin screen.
///
/// With `Optimistic` this is a synchronous storage read, usable before
/// the controller has mounted or finished reconciling.
pub fn check_admin_access(db: &Database, policy: GuardPolicy, phase: &AuthPhase) -> GuardDecision {
    match policy {
        GuardPolicy::Optimistic => {
            if db.session().is_authenticated_admin() {
                GuardDecision::Allow
            } else {
                GuardDecision::RedirectToLogin
            }
        }
        GuardPolicy::BlockUntilReconciled => match phase {
            AuthPhase::Unresolved => GuardDecision::Wait,
            AuthPhase::Authenticated(user) if user.is_admin() => GuardDecision::Allow,
            AuthPhase::Authenticated(_) | AuthPhase::Anonymous => GuardDecision::RedirectToLogin,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::admin_user;
    use showroom_core::{Database, UserRecord};

    #[test]
    fn test_optimistic_allows_stored_admin() {
        let db = Database::open_in_memory().unwrap();
        db.session()
            .set_session("tok1", &admin_user("a"))
            .unwrap();

        let decision = check_admin_access(&db, GuardPolicy::Optimistic, &AuthPhase::Unresolved);
        assert_eq!(decision, GuardDecision::Allow);
    }

    #[test]
    fn test_optimistic_redirects_fresh_storage() {
        let db = Database::open_in_memory().unwrap();

        let decision = check_admin_access(&db, GuardPolicy::Optimistic, &AuthPhase::Unresolved);
        assert_eq!(decision, GuardDecision::RedirectToLogin);
    }

    #[test]
    fn test_optimistic_redirects_non_admin() {
        let db = Database::open_in_memory().unwrap();
        let editor = UserRecord {
            role: Some("editor".to_string()),
            ..Default::default()
        };
        db.session().set_session("tok1", &editor).unwrap();

        let decision = check_admin_access(&db, GuardPolicy::Optimistic, &AuthPhase::Unresolved);
        assert_eq!(decision, GuardDecision::RedirectToLogin);
    }

    #[test]
    fn test_optimistic_ignores_resolved_phase() {
        // The optimistic path answers from storage even when the
        // controller already resolved differently; the next API call and
        // retry wrapper reconcile the difference.
        let db = Database::open_in_memory().unwrap();
        db.session()
            .set_session("tok1", &admin_user("a"))
            .unwrap();

        let decision = check_admin_access(&db, GuardPolicy::Optimistic, &AuthPhase::Anonymous);
        assert_eq!(decision, GuardDecision::Allow);
    }

    #[test]
    fn test_blocking_policy_waits_while_unresolved() {
        let db = Database::open_in_memory().unwrap();
        db.session()
            .set_session("tok1", &admin_user("a"))
            .unwrap();

        let decision =
            check_admin_access(&db, GuardPolicy::BlockUntilReconciled, &AuthPhase::Unresolved);
        assert_eq!(decision, GuardDecision::Wait);
    }

    #[test]
    fn test_blocking_policy_answers_from_phase() {
        let db = Database::open_in_memory().unwrap();

        let allowed = check_admin_access(
            &db,
            GuardPolicy::BlockUntilReconciled,
            &AuthPhase::Authenticated(admin_user("a")),
        );
        assert_eq!(allowed, GuardDecision::Allow);

        let refused = check_admin_access(
            &db,
            GuardPolicy::BlockUntilReconciled,
            &AuthPhase::Anonymous,
        );
        assert_eq!(refused, GuardDecision::RedirectToLogin);
    }
}
