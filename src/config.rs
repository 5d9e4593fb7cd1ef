use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::loader::validate_base_url;

const CONFIG_FILE: &str = "config.json";

/// Get the config directory using platform-appropriate location.
///
/// - macOS: `~/Library/Application Support/analytics-host/`
/// - Linux: `~/.config/analytics-host/` (or `$XDG_CONFIG_HOME`)
/// - Windows: `%APPDATA%/analytics-host/`
///
/// Falls back to `~/.analytics-host/` if the platform dir is unavailable.
pub(crate) fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("analytics-host"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".analytics-host")
        })
}

pub(crate) fn default_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}

/// Load a JSON config file, returning Default if missing or corrupt.
/// Logs when the file exists but cannot be read or parsed, so corrupt files
/// are visible instead of silently resetting state.
pub(crate) fn load_json_config<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    let content = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not read config, using defaults");
            return T::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "corrupt config, using defaults");
            T::default()
        }
    }
}

/// Save a JSON config file atomically (temp file + rename).
/// Sets 0600 permissions on Unix.
pub(crate) fn save_json_config<T: Serialize>(path: &Path, config: &T) -> Result<(), String> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&dir)
        .map_err(|e| format!("Failed to create config directory: {e}"))?;

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {e}"))?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| CONFIG_FILE.to_string());
    let temp = dir.join(format!("{}.tmp.{}", filename, std::process::id()));

    std::fs::write(&temp, &json)
        .map_err(|e| format!("Failed to write temp config: {e}"))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&temp, perms)
            .map_err(|e| format!("Failed to set config permissions: {e}"))?;
    }

    // Atomic rename: either the old file or new file exists, never partial
    std::fs::rename(&temp, path)
        .map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            format!("Failed to commit config: {e}")
        })?;

    Ok(())
}

// ---------------------------------------------------------------------------
// HostConfig
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub bind_address: String,
    pub port: u16,
    /// Analytics server that frame URLs are resolved against.
    pub analytics_base_url: String,
    /// Path prefix of the analytics routes on that server.
    pub route_prefix: String,
    /// Ordered plugin ids; one frame is rendered per entry.
    pub plugin_ids: Vec<String>,
    /// Upper bound for a single frame load. 0 disables the bound.
    pub load_timeout_secs: u64,
}

fn default_port() -> u16 {
    8254
}

fn default_load_timeout_secs() -> u64 {
    30
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: default_port(),
            analytics_base_url: "http://localhost:8153".to_string(),
            route_prefix: "/go".to_string(),
            plugin_ids: Vec::new(),
            load_timeout_secs: default_load_timeout_secs(),
        }
    }
}

impl HostConfig {
    pub fn load_timeout(&self) -> Option<Duration> {
        (self.load_timeout_secs > 0).then(|| Duration::from_secs(self.load_timeout_secs))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        let addr = if self.bind_address.contains(':') {
            format!("[{}]:{}", self.bind_address, self.port)
        } else {
            format!("{}:{}", self.bind_address, self.port)
        };
        addr.parse()
            .map_err(|e| format!("Invalid bind address \"{addr}\": {e}"))
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_base_url(&self.analytics_base_url)?;
        self.socket_addr()?;
        validate_plugin_ids(&self.plugin_ids)
    }
}

fn validate_plugin_ids(ids: &[String]) -> Result<(), String> {
    let mut seen = HashSet::new();
    for id in ids {
        if id.trim().is_empty() {
            return Err("plugin id is empty".to_string());
        }
        if !seen.insert(id.as_str()) {
            return Err(format!("duplicate plugin id \"{id}\""));
        }
    }
    Ok(())
}

/// Parse a plugin list in the dashboard markup's `data-plugin-ids` form,
/// a JSON array of strings: `["com.example.perf","com.example.flaky"]`.
pub fn parse_plugin_ids(attr: &str) -> Result<Vec<String>, String> {
    let ids: Vec<String> = serde_json::from_str(attr.trim())
        .map_err(|e| format!("plugin ids must be a JSON array of strings: {e}"))?;
    validate_plugin_ids(&ids)?;
    Ok(ids)
}

pub(crate) fn load_host_config(path: &Path) -> HostConfig {
    load_json_config(path)
}

pub(crate) fn save_host_config(path: &Path, config: &HostConfig) -> Result<(), String> {
    save_json_config(path, config)
}
