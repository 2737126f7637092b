//! Request authentication context and the persisted login session.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

/// Bearer token shared with the HTTP client.
///
/// Set at login, cleared at logout, read by every outgoing request.
/// Clones share the same token.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
  token: Arc<RwLock<Option<String>>>,
}

impl AuthContext {
  pub fn new() -> Self {
    Self::default()
  }

  #[allow(dead_code)]
  pub fn with_token(token: impl Into<String>) -> Self {
    let ctx = Self::new();
    ctx.set_token(token);
    ctx
  }

  pub fn set_token(&self, token: impl Into<String>) {
    *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
  }

  pub fn clear(&self) {
    *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
  }

  /// Current token, if logged in.
  pub fn token(&self) -> Option<String> {
    self
      .token
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub fn is_authenticated(&self) -> bool {
    self.token().is_some()
  }
}

/// Stable, non-reversible identifier of the user behind a session.
pub fn owner_fingerprint(email: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(email.trim().to_lowercase().as_bytes());
  hex::encode(hasher.finalize())
}

/// Login session kept between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub name: String,
  pub token: String,
  /// Fingerprint of the login e-mail, see [`owner_fingerprint`]
  pub owner: String,
}

impl Session {
  pub fn new(name: String, token: String, email: &str) -> Self {
    Self {
      name,
      token,
      owner: owner_fingerprint(email),
    }
  }
}

/// JSON file holding the current session.
pub struct SessionStore {
  path: PathBuf,
}

impl SessionStore {
  pub fn new(path: PathBuf) -> Self {
    Self { path }
  }

  /// Get the default session file path
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("finsupp").join("session.json"))
  }

  pub fn load(&self) -> Result<Option<Session>> {
    if !self.path.exists() {
      return Ok(None);
    }

    let contents = std::fs::read_to_string(&self.path)
      .map_err(|e| eyre!("Failed to read session file {}: {}", self.path.display(), e))?;

    let session = serde_json::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse session file {}: {}", self.path.display(), e))?;

    Ok(Some(session))
  }

  pub fn save(&self, session: &Session) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create session directory: {}", e))?;
    }

    let contents = serde_json::to_string_pretty(session)
      .map_err(|e| eyre!("Failed to serialize session: {}", e))?;

    std::fs::write(&self.path, contents)
      .map_err(|e| eyre!("Failed to write session file {}: {}", self.path.display(), e))?;

    Ok(())
  }

  /// Delete the session file. Missing files are fine.
  pub fn remove(&self) -> Result<()> {
    match std::fs::remove_file(&self.path) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(eyre!(
        "Failed to remove session file {}: {}",
        self.path.display(),
        e
      )),
    }
  }
}
