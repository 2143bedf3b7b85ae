use thiserror::Error;

#[derive(Error, Debug)]
pub enum TickError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid region '{0}' (expected 'global' or 'china')")]
    InvalidRegion(String),

    #[error("No configuration found. Run `tick auth setup` or set TICKTICK_CLIENT_ID and TICKTICK_CLIENT_SECRET.")]
    NoConfigFound,

    #[error("Invalid config file: {0}")]
    InvalidConfigFile(String),

    #[error("Not authenticated. Run `tick auth login` first.")]
    NotAuthenticated,

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Inbox project not found")]
    InboxNotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid reminder format '{0}' (expected e.g. 15m, 1h, 1d)")]
    InvalidReminderFormat(String),

    #[error("Invalid priority '{0}' (expected none, low, medium or high)")]
    InvalidPriorityValue(String),

    #[error("API request failed ({status}): {body}")]
    ApiRequestFailed { status: u16, body: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TickError>;
