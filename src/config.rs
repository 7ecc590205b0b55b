use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::core::errors::ClientError;

// === Defaults ===
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_AUTH_STORAGE_KEY: &str = "blogdash_auth";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// === Form validation ===
pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const VALIDATION_DEBOUNCE: Duration = Duration::from_millis(1000);
pub const EMAIL_PATTERN: &str =
    r"^[a-zA-Z0-9._-]+@(gmail|yahoo|outlook|hotmail|proton|icloud|msit)\.(com|net|org|edu|io|dev)$";

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn api_url() -> String {
    env_non_empty("BLOGDASH_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

pub fn auth_storage_key() -> String {
    env_non_empty("BLOGDASH_AUTH_STORAGE_KEY").unwrap_or_else(|| DEFAULT_AUTH_STORAGE_KEY.to_string())
}

pub fn storage_dir() -> PathBuf {
    if let Some(dir) = env_non_empty("BLOGDASH_STORAGE_DIR") {
        return PathBuf::from(dir);
    }
    env_non_empty("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".blogdash")
}

pub fn request_timeout() -> Duration {
    let secs = std::env::var("BLOGDASH_REQUEST_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

/// Everything the client needs from its environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: Url,
    pub storage_key: String,
    pub storage_dir: PathBuf,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(&api_url(), &auth_storage_key(), storage_dir(), request_timeout())
    }

    pub fn new(
        api_url: &str,
        storage_key: &str,
        storage_dir: impl Into<PathBuf>,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let api_url = Url::parse(api_url)
            .map_err(|err| ClientError::Config(format!("backend URL {api_url:?}: {err}")))?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "backend URL must be http or https, got {}",
                api_url.scheme()
            )));
        }
        let storage_key = storage_key.trim();
        if storage_key.is_empty() {
            return Err(ClientError::Config("storage key must not be empty".to_string()));
        }
        Ok(Self {
            api_url,
            storage_key: storage_key.to_string(),
            storage_dir: storage_dir.into(),
            request_timeout,
        })
    }
}
