//! Application state management

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use directories::ProjectDirs;
use showroom_core::{Database, Error, Result};
use showroom_net::{ApiClient, TokenSlot};
use tokio::sync::mpsc;

use crate::auth::{AuthController, AuthEvent};
use crate::config::AppConfig;

/// Main application state
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub api: ApiClient,
    pub auth: Arc<AuthController>,
    pub config: AppConfig,
    data_dir: PathBuf,
}

impl AppState {
    /// Wire storage, the API client, and the auth controller together.
    /// Returns the auth event stream alongside the state; the shell
    /// decides how to surface re-authentication prompts.
    pub fn new(config: AppConfig) -> Result<(Self, mpsc::UnboundedReceiver<AuthEvent>)> {
        let data_dir = Self::data_path()?;
        std::fs::create_dir_all(&data_dir)?;

        let db = Arc::new(Mutex::new(Database::open(data_dir.join("showroom.db"))?));

        let token_slot = TokenSlot::new();
        let api = ApiClient::with_timeout(
            &config.api.base_url,
            token_slot.clone(),
            config.api.timeout(),
        );
        let (auth, events) = AuthController::new(db.clone(), Arc::new(api.clone()), token_slot);

        Ok((
            Self {
                db,
                api,
                auth: Arc::new(auth),
                config,
                data_dir,
            },
            events,
        ))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn data_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("io", "showroom", "showroom").ok_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine data directory",
            ))
        })?;

        Ok(dirs.data_dir().to_path_buf())
    }
}
