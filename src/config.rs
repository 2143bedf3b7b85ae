use crate::error::{Result, TickError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/callback";

/// Which TickTick deployment to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    #[default]
    Global,
    China,
}

impl Region {
    pub fn authorize_url(&self) -> &'static str {
        match self {
            Region::Global => "https://ticktick.com/oauth/authorize",
            Region::China => "https://dida365.com/oauth/authorize",
        }
    }

    pub fn token_url(&self) -> &'static str {
        match self {
            Region::Global => "https://ticktick.com/oauth/token",
            Region::China => "https://dida365.com/oauth/token",
        }
    }

    pub fn api_base(&self) -> &'static str {
        match self {
            Region::Global => "https://api.ticktick.com/open/v1",
            Region::China => "https://api.dida365.com/open/v1",
        }
    }
}

impl FromStr for Region {
    type Err = TickError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "global" => Ok(Region::Global),
            "china" => Ok(Region::China),
            _ => Err(TickError::InvalidRegion(s.to_string())),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Global => write!(f, "global"),
            Region::China => write!(f, "china"),
        }
    }
}

/// OAuth client credentials. Loaded once per process.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub region: Region,
}

/// On-disk shape of `config.json`. The region stays a string here so a bad
/// value surfaces as `InvalidRegion` rather than a parse error.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uri: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

impl Credentials {
    pub fn base_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os("TICK_CONFIG_DIR") {
            return PathBuf::from(dir);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("~"))
            .join(".config")
            .join("tick")
    }

    pub fn config_path() -> PathBuf {
        Self::base_dir().join("config.json")
    }

    pub fn token_path() -> PathBuf {
        Self::base_dir().join("token.json")
    }

    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok(), &Self::config_path())
    }

    /// Environment wins when both client id and secret are present;
    /// otherwise fall back to the config file.
    pub fn load_with<F>(env: F, path: &Path) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let (Some(client_id), Some(client_secret)) =
            (var("TICKTICK_CLIENT_ID"), var("TICKTICK_CLIENT_SECRET"))
        {
            let region = match var("TICKTICK_REGION") {
                Some(r) => r.parse()?,
                None => Region::default(),
            };
            return Ok(Self {
                client_id,
                client_secret,
                redirect_uri: var("TICKTICK_REDIRECT_URI")
                    .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
                region,
            });
        }

        if !path.exists() {
            return Err(TickError::NoConfigFound);
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Err(TickError::NoConfigFound);
        }
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| TickError::InvalidConfigFile(e.to_string()))?;
        if file.client_id.is_empty() || file.client_secret.is_empty() {
            return Err(TickError::InvalidConfigFile(
                "clientId and clientSecret must be set".to_string(),
            ));
        }
        let region = match file.region.as_deref() {
            Some(r) if !r.trim().is_empty() => r.parse()?,
            _ => Region::default(),
        };

        Ok(Self {
            client_id: file.client_id,
            client_secret: file.client_secret,
            redirect_uri: file
                .redirect_uri
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            region,
        })
    }

    pub fn save(&self) -> Result<()> {
        Self::ensure_dir()?;
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let file = ConfigFile {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            redirect_uri: Some(self.redirect_uri.clone()),
            region: Some(self.region.to_string()),
        };
        let content = serde_json::to_string_pretty(&file)?;
        atomic_write(path, content.as_bytes())
    }

    pub fn ensure_dir() -> Result<()> {
        let dir = Self::base_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

/// Write via a sibling temp file and rename, leaving the file readable by
/// the owner only.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    use std::io::Write;

    let dir = path.parent().ok_or_else(|| {
        TickError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path has no parent directory",
        ))
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    tmp.persist(path).map_err(|e| TickError::Io(e.error))?;
    Ok(())
}
