//! # Token Store and Credential
//!
//! The bearer token is minted by an external authentication flow and persisted
//! outside this process. A `TokenStore` knows how to read it and how to ask
//! for a fresh one; a `Credential` holds the token currently in use and is
//! passed by `&mut` into every request, so refreshes never race. Stores are
//! synchronous; `Credential::refresh` moves them off the async workers.

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;

use super::error::{AxonError, Result};

/// Source of bearer tokens.
pub trait TokenStore: Send + Sync {
    /// The persisted token, `None` if nothing has been stored yet.
    fn current_token(&self) -> Result<Option<String>>;

    /// Re-authenticates and returns the new token.
    fn update_token(&self) -> Result<String>;
}

/// Token persisted in a file, optionally renewed by an external command
/// that rewrites that file.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
    refresh_command: Option<String>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>, refresh_command: Option<String>) -> Self {
        Self {
            path: path.into(),
            refresh_command,
        }
    }

    fn read_token(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AxonError::Authentication(format!(
                "cannot read token file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn run_refresh_command(&self, command: &str) -> Result<()> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| AxonError::Authentication("refresh command is empty".to_string()))?;

        let output = Command::new(program)
            .args(parts)
            .env("SPYSPARK_TOKEN_FILE", &self.path)
            .output()
            .map_err(|e| AxonError::Authentication(format!("cannot run {}: {}", program, e)))?;

        if !output.status.success() {
            return Err(AxonError::Authentication(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn current_token(&self) -> Result<Option<String>> {
        self.read_token()
    }

    fn update_token(&self) -> Result<String> {
        if let Some(command) = &self.refresh_command {
            self.run_refresh_command(command)?;
        }
        self.read_token()?.ok_or_else(|| {
            AxonError::Authentication(format!("no token in {} after refresh", self.path.display()))
        })
    }
}

/// The token in use plus the store that can renew it.
pub struct Credential {
    token: String,
    store: Arc<dyn TokenStore>,
    refreshes: u32,
}

impl Credential {
    /// Loads the persisted token, authenticating once if none is stored.
    pub fn from_store(store: Arc<dyn TokenStore>) -> Result<Self> {
        let token = match store.current_token()? {
            Some(token) => token,
            None => store.update_token()?,
        };
        Ok(Self {
            token,
            store,
            refreshes: 0,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Value of the `authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("BEARER authToken={}", self.token)
    }

    /// Replaces the held token with a freshly minted one.
    ///
    /// The store may run an external command, so it is called on the
    /// blocking thread pool.
    pub async fn refresh(&mut self) -> Result<()> {
        let store = Arc::clone(&self.store);
        self.token = tokio::task::spawn_blocking(move || store.update_token())
            .await
            .map_err(|e| AxonError::Authentication(format!("token refresh task failed: {}", e)))??;
        self.refreshes += 1;
        Ok(())
    }

    /// Number of successful refreshes since construction.
    pub fn refresh_count(&self) -> u32 {
        self.refreshes
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"*****")
            .field("refreshes", &self.refreshes)
            .finish()
    }
}
