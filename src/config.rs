use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://www.endomondo.com/";
pub const DEFAULT_LEGACY_URL: &str = "https://api.mobile.endomondo.com/";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_EMAIL: &str = "ENDO_EMAIL";
pub const ENV_PASSWORD: &str = "ENDO_PASSWORD";

/// Client configuration, read from `~/.config/endoclient/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub email: Option<String>,

    /// Prefer `ENDO_PASSWORD` over storing this in the file.
    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// Request timeout in seconds; `0` disables it.
    pub timeout_secs: Option<u64>,

    pub api: ApiConfig,
    pub legacy: LegacyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email: None,
            password: None,
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            api: ApiConfig::default(),
            legacy: LegacyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyConfig {
    pub base_url: String,
    pub device: DeviceProfile,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LEGACY_URL.to_string(),
            device: DeviceProfile::default(),
        }
    }
}

/// What the legacy auth handshake claims to be. The backend only pairs
/// tokens with devices it recognises, so the defaults mimic an old Android app.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    /// Defaults to a UUIDv5 of the host name.
    pub device_id: Option<String>,
    pub country: String,
    pub language: String,
    pub os: String,
    pub os_version: String,
    pub model: String,
    pub app_version: String,
    pub app_variant: String,
    pub protocol_version: String,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            device_id: None,
            country: "EN".into(),
            language: "EN".into(),
            os: "Android".into(),
            os_version: "4.1".into(),
            model: "GT-B5512".into(),
            app_version: "10.2.6".into(),
            app_variant: "M-Pro".into(),
            protocol_version: "2.4".into(),
        }
    }
}

impl DeviceProfile {
    pub fn user_agent(&self) -> String {
        format!(
            "Dalvik/1.4.0 (Linux; U; {} {}; {} Build/GINGERBREAD)",
            self.os, self.os_version, self.model
        )
    }

    /// Configured id, or a stable id derived from the host name.
    pub fn resolved_device_id(&self) -> String {
        if let Some(id) = self.device_id.as_deref().filter(|s| !s.is_empty()) {
            return id.to_string();
        }
        let host = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());
        uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_DNS, host.as_bytes()).to_string()
    }
}

impl Config {
    /// Returns the config directory path (~/.config/endoclient)
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("endoclient"))
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Loads `path` (or the default location), then applies env overrides.
    /// A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        let mut cfg = if path.is_file() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Self::from_toml(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };

        cfg.apply_env(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(email) = get(ENV_EMAIL).filter(|s| !s.is_empty()) {
            self.email = Some(email);
        }
        if let Some(password) = get(ENV_PASSWORD).filter(|s| !s.is_empty()) {
            self.password = Some(password);
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn credentials(&self) -> Result<(&str, &str)> {
        let email = self
            .email
            .as_deref()
            .with_context(|| format!("No email configured (set `email` or {ENV_EMAIL})"))?;
        let password = self
            .password
            .as_deref()
            .with_context(|| format!("No password configured (set {ENV_PASSWORD})"))?;
        Ok((email, password))
    }
}
