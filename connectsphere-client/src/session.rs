use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use connectsphere_types::{AuthResponse, UserRef};

use crate::error::{StoreError, StoreResult};

/// A logged-in user together with the bearer token proving it
///
/// Only constructible from a real user and a non-empty token, so anything
/// holding one may perform authenticated mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthedSession {
    user: UserRef,
    token: String,
}

impl AuthedSession {
    pub fn new(user: Option<UserRef>, token: Option<String>) -> StoreResult<Self> {
        match (user, token) {
            (Some(user), Some(token)) if !token.trim().is_empty() => Ok(Self {
                user,
                token: token.trim().to_string(),
            }),
            _ => Err(StoreError::NoSession),
        }
    }

    pub fn from_auth(response: AuthResponse) -> StoreResult<Self> {
        Self::new(Some(response.user), Some(response.token))
    }

    pub fn user(&self) -> &UserRef {
        &self.user
    }

    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Persists the bearer token in `~/.connectsphere/session`
///
/// Written atomically with 0600 permissions so only the owner can read it.
#[derive(Debug, Clone)]
pub struct SessionStore {
    file_path: PathBuf,
}

impl SessionStore {
    /// Store at the default location
    pub fn new() -> Result<Self> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(Self::in_dir(home_dir.join(".connectsphere")))
    }

    /// Store keeping its file in `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            file_path: dir.as_ref().join("session"),
        }
    }

    /// Load the stored token
    ///
    /// A missing, empty or obviously corrupted file reads as no session.
    pub fn load(&self) -> Result<Option<String>> {
        if !self.file_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.file_path).context("Failed to read session file")?;
        let token = content.trim();

        if token.is_empty() {
            log::warn!("Session file is empty, treating as no session");
            return Ok(None);
        }
        if token.len() < 16 || token.len() > 4096 {
            log::warn!("Session token has invalid length: {}, treating as corrupted", token.len());
            return Ok(None);
        }
        if token.chars().any(|c| c.is_control() || c.is_whitespace()) {
            log::warn!("Session file contains control characters, treating as corrupted");
            return Ok(None);
        }

        log::debug!("Loaded session token from {}", self.file_path.display());
        Ok(Some(token.to_string()))
    }

    /// Save the token: temp file, 0600, then rename over the old one
    pub fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).context("Failed to create session directory")?;
        }

        let temp_path = self.file_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).context("Failed to create temporary session file")?;
        file.write_all(token.as_bytes())
            .context("Failed to write session token")?;
        file.sync_all().context("Failed to sync session file to disk")?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))
                .context("Failed to set session file permissions")?;
        }

        fs::rename(&temp_path, &self.file_path).context("Failed to rename temporary session file")?;

        log::info!("Saved session token to {}", self.file_path.display());
        Ok(())
    }

    /// Delete the stored token; succeeds when there is none
    pub fn delete(&self) -> Result<()> {
        if self.file_path.exists() {
            fs::remove_file(&self.file_path).context("Failed to delete session file")?;
            log::info!("Deleted session file at {}", self.file_path.display());
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}
