//! CLI configuration management.
//!
//! Reads/writes JSON at `~/.config/filerelay/config.json`. Values from the
//! file are merged over the defaults; invalid ones are ignored with a
//! warning.

use std::path::{Path, PathBuf};

use filerelay_protocol::UploadSettings;
use filerelay_relay::{DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_THRESHOLD};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the stored token.
pub const TOKEN_ENV: &str = "FILERELAY_TOKEN";

const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 500;

/// On-disk config format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    destination_base_url: String,
    #[serde(default)]
    token: String,
    #[serde(default)]
    chunk_size: usize,
    #[serde(default)]
    chunk_threshold: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    staging_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    compression: Option<String>,
    #[serde(default)]
    progress_interval_ms: u64,
}

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub destination_base_url: String,
    pub token: String,
    pub chunk_size: usize,
    pub chunk_threshold: u64,
    pub staging_dir: Option<PathBuf>,
    pub expiry: Option<String>,
    pub compression: Option<String>,
    pub progress_interval_ms: u64,
    file_path: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            destination_base_url: String::new(),
            token: String::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            staging_dir: None,
            expiry: None,
            compression: None,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            file_path: config_file_path(),
        }
    }
}

impl RelayConfig {
    /// Loads configuration from the default location.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(config_file_path())
    }

    /// Loads configuration from `file_path`. A missing file yields defaults.
    pub fn load_from(file_path: PathBuf) -> anyhow::Result<Self> {
        let mut config = RelayConfig {
            file_path: file_path.clone(),
            ..Default::default()
        };

        if !file_path.exists() {
            return Ok(config);
        }

        let content = std::fs::read_to_string(&file_path)?;
        let Ok(file) = serde_json::from_str::<ConfigFile>(&content) else {
            tracing::warn!(
                path = %file_path.display(),
                "failed to parse relay config, using defaults"
            );
            return Ok(config);
        };

        if !file.destination_base_url.is_empty() {
            config.destination_base_url = file.destination_base_url;
        }
        if !file.token.is_empty() {
            config.token = file.token;
        }
        if file.chunk_size > 0 {
            config.chunk_size = file.chunk_size;
        }
        if file.chunk_threshold > 0 {
            config.chunk_threshold = file.chunk_threshold;
        }
        if file.progress_interval_ms > 0 {
            config.progress_interval_ms = file.progress_interval_ms;
        }
        config.staging_dir = file.staging_dir;
        config.expiry = file.expiry.filter(|s| !s.is_empty());
        config.compression = file.compression.filter(|s| !s.is_empty());

        if config.chunk_size as u64 > config.chunk_threshold {
            tracing::warn!(
                chunk_size = config.chunk_size,
                threshold = config.chunk_threshold,
                "chunk size above threshold, small files will be sent in one chunk"
            );
        }

        Ok(config)
    }

    /// Saves configuration to disk, readable by the owner only.
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = ConfigFile {
            destination_base_url: self.destination_base_url.clone(),
            token: self.token.clone(),
            chunk_size: self.chunk_size,
            chunk_threshold: self.chunk_threshold,
            staging_dir: self.staging_dir.clone(),
            expiry: self.expiry.clone(),
            compression: self.compression.clone(),
            progress_interval_ms: self.progress_interval_ms,
        };

        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.file_path, &json)?;
        set_permissions_0600(&self.file_path);

        tracing::debug!(path = %self.file_path.display(), "relay configuration saved");
        Ok(())
    }

    /// Replaces the token with `value` when it is set and non-empty.
    pub fn apply_token_override(&mut self, value: Option<String>) {
        if let Some(token) = value.filter(|t| !t.is_empty()) {
            self.token = token;
        }
    }

    /// Upload options forwarded with every request.
    pub fn settings(&self) -> UploadSettings {
        UploadSettings {
            expiry: self.expiry.clone(),
            compression: self.compression.clone(),
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

fn set_permissions_0600(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

fn config_file_path() -> PathBuf {
    config_base_dir().join("filerelay").join("config.json")
}

fn config_base_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata)
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".config")
    }
}
