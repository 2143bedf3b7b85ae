use crate::config::atomic_write;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tokens are treated as expired this long before their actual expiry so a
/// request cannot race the deadline.
pub const EXPIRY_BUFFER_MS: i64 = 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Absolute expiry, milliseconds since the unix epoch.
    pub expires_at: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub stored_at: i64,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn is_expired(token: &TokenSet) -> bool {
    is_expired_at(token, now_millis())
}

pub fn is_expired_at(token: &TokenSet, now_ms: i64) -> bool {
    now_ms >= token.expires_at.saturating_sub(EXPIRY_BUFFER_MS)
}

/// Persistence for the token bundle.
///
/// `load` returns `None` for anything that is not a usable token; callers
/// treat that as "not authenticated" rather than an error.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<TokenSet>>;
    fn save(&self, token: &TokenSet) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<TokenSet>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "unreadable token file");
                return Ok(None);
            }
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<TokenSet>(&content) {
            Ok(token) if !token.access_token.is_empty() => Ok(Some(token)),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "corrupt token file");
                Ok(None)
            }
        }
    }

    fn save(&self, token: &TokenSet) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(token)?;
        atomic_write(&self.path, content.as_bytes())
    }

    fn clear(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        atomic_write(&self.path, b"")
    }
}
