//! Showroom admin console shell
//!
//! Composition root for the session core: config, storage, the API
//! client, and the auth controller, surfaced as console commands. The
//! catalog screens are separate collaborators; only the session
//! operations live here.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use showroom_app::auth::{AuthEvent, AuthOutcome, AuthPhase};
use showroom_app::config::AppConfig;
use showroom_app::guard::{check_admin_access, GuardDecision};
use showroom_app::retry::{execute_with_auth_retry, DEFAULT_AUTH_RETRIES};
use showroom_app::state::AppState;
use showroom_net::{LoginRequest, RegisterRequest};

#[derive(Parser)]
#[command(name = "showroom", about = "Showroom catalog admin console")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the current session and server reachability
    Status,
    /// Sign in to the catalog API
    Login {
        /// Username or email
        identifier: String,
    },
    /// Create an account and sign in
    Register {
        username: String,
        email: String,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Show the verified identity (protected screen)
    Whoami,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match AppConfig::default_path() {
        Some(path) => match AppConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::default(),
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(cli, config))
}

async fn run(cli: Cli, config: AppConfig) -> ExitCode {
    let (state, mut events) = match AppState::new(config) {
        Ok(built) => built,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize application");
            return ExitCode::FAILURE;
        }
    };

    let code = match cli.command {
        Command::Status => status(&state).await,
        Command::Login { identifier } => login(&state, identifier).await,
        Command::Register { username, email } => register(&state, username, email).await,
        Command::Logout => logout(&state).await,
        Command::Whoami => whoami(&state).await,
    };

    // Turn controller events into navigation hints
    while let Ok(event) = events.try_recv() {
        match event {
            AuthEvent::ReauthRequired => {
                println!("Session invalidated. Run `showroom login` to sign in again.");
            }
            AuthEvent::SignedOut => {}
        }
    }

    code
}

async fn status(state: &AppState) -> ExitCode {
    // What a protected screen would decide right now, before any network
    let decision = {
        let db = state.db.lock().unwrap();
        check_admin_access(&db, state.config.guard.policy, &state.auth.phase())
    };
    match decision {
        GuardDecision::Allow => println!("Guard: admin section accessible"),
        GuardDecision::RedirectToLogin => println!("Guard: would redirect to login"),
        GuardDecision::Wait => println!("Guard: waiting for verification"),
    }

    state.auth.reconcile().await;

    match state.auth.phase() {
        AuthPhase::Authenticated(user) => {
            println!("Signed in as {}", user.display_name());
            if let Some(role) = &user.role {
                println!("Role: {role}");
            }
        }
        AuthPhase::Anonymous => println!("Not signed in."),
        AuthPhase::Unresolved => println!("Session state unknown."),
    }

    if state.auth.server_unreachable() {
        println!("Warning: server unavailable; showing the cached session.");
    }

    let expired = {
        let db = state.db.lock().unwrap();
        db.session()
            .is_session_expired(state.config.session.max_age_hours)
    };
    if expired && state.auth.is_authenticated() {
        println!(
            "Note: session is older than {} hours.",
            state.config.session.max_age_hours
        );
    }

    ExitCode::SUCCESS
}

async fn login(state: &AppState, identifier: String) -> ExitCode {
    let password = match prompt_password() {
        Ok(password) => password,
        Err(e) => {
            tracing::error!(error = %e, "Failed to read password");
            return ExitCode::FAILURE;
        }
    };

    let outcome = state
        .auth
        .login(&LoginRequest {
            identifier,
            password,
        })
        .await;

    report_outcome(outcome)
}

async fn register(state: &AppState, username: String, email: String) -> ExitCode {
    let password = match prompt_password() {
        Ok(password) => password,
        Err(e) => {
            tracing::error!(error = %e, "Failed to read password");
            return ExitCode::FAILURE;
        }
    };

    let outcome = state
        .auth
        .register(&RegisterRequest {
            username,
            email,
            password,
        })
        .await;

    report_outcome(outcome)
}

async fn logout(state: &AppState) -> ExitCode {
    state.auth.logout().await;
    println!("Signed out.");
    ExitCode::SUCCESS
}

async fn whoami(state: &AppState) -> ExitCode {
    let mut decision = {
        let db = state.db.lock().unwrap();
        check_admin_access(&db, state.config.guard.policy, &state.auth.phase())
    };

    // The blocking policy asks us to resolve the phase first
    if decision == GuardDecision::Wait {
        state.auth.reconcile().await;
        let db = state.db.lock().unwrap();
        decision = check_admin_access(&db, state.config.guard.policy, &state.auth.phase());
    }

    if decision != GuardDecision::Allow {
        println!("Not signed in as an admin. Run `showroom login` first.");
        return ExitCode::FAILURE;
    }

    let api = state.api.clone();
    let result = execute_with_auth_retry(
        &state.auth,
        move || {
            let api = api.clone();
            async move { api.verify().await }
        },
        DEFAULT_AUTH_RETRIES,
    )
    .await;

    match result {
        Ok(user) => {
            println!("{}", user.display_name());
            if let Some(role) = &user.role {
                println!("Role: {role}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("Could not verify identity: {e}");
            ExitCode::FAILURE
        }
    }
}

fn report_outcome(outcome: AuthOutcome) -> ExitCode {
    match outcome {
        AuthOutcome::Authenticated(user) => {
            println!("Signed in as {}", user.display_name());
            ExitCode::SUCCESS
        }
        AuthOutcome::Rejected(message) => {
            println!("Sign-in failed: {message}");
            ExitCode::FAILURE
        }
        AuthOutcome::Ignored => {
            println!("A sign-in attempt is already in progress.");
            ExitCode::FAILURE
        }
    }
}

fn prompt_password() -> io::Result<String> {
    print!("Password: ");
    io::stdout().flush()?;

    let mut password = String::new();
    io::stdin().lock().read_line(&mut password)?;
    Ok(password.trim_end_matches(['\r', '\n']).to_string())
}
