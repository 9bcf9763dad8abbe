//! Configuration Vault – reads/writes `~/.teleop/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use teleop_kernel::{ChannelSettings, ReconnectPolicy};
use teleop_runtime::ClientConfig;

/// Persisted operator configuration stored in `~/.teleop/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// WebSocket endpoint of the vehicle.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Status endpoint polled once after every connect. Empty disables it.
    #[serde(default = "default_status_url")]
    pub status_url: String,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,

    /// `1.0` keeps a fixed retry cadence.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_keepalive_timeout_secs")]
    pub keepalive_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_movement_interval_ms")]
    pub movement_interval_ms: u64,

    #[serde(default = "default_camera_interval_ms")]
    pub camera_interval_ms: u64,

    #[serde(default = "default_deadzone")]
    pub deadzone: f32,

    #[serde(default = "default_auto_center_delay_secs")]
    pub auto_center_delay_secs: u64,

    #[serde(default = "default_toast_duration_secs")]
    pub toast_duration_secs: u64,

    #[serde(default = "default_status_poll_delay_ms")]
    pub status_poll_delay_ms: u64,
}

fn default_server_url() -> String {
    "ws://localhost:5000/ws".to_string()
}
fn default_status_url() -> String {
    "http://localhost:5000/api/status".to_string()
}
fn default_max_reconnect_attempts() -> u32 {
    10
}
fn default_reconnect_delay_ms() -> u64 {
    1000
}
fn default_reconnect_max_delay_ms() -> u64 {
    5000
}
fn default_backoff_multiplier() -> f64 {
    1.0
}
fn default_keepalive_timeout_secs() -> u64 {
    60
}
fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_movement_interval_ms() -> u64 {
    50
}
fn default_camera_interval_ms() -> u64 {
    100
}
fn default_deadzone() -> f32 {
    0.05
}
fn default_auto_center_delay_secs() -> u64 {
    5
}
fn default_toast_duration_secs() -> u64 {
    5
}
fn default_status_poll_delay_ms() -> u64 {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            status_url: default_status_url(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            keepalive_timeout_secs: default_keepalive_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            movement_interval_ms: default_movement_interval_ms(),
            camera_interval_ms: default_camera_interval_ms(),
            deadzone: default_deadzone(),
            auto_center_delay_secs: default_auto_center_delay_secs(),
            toast_duration_secs: default_toast_duration_secs(),
            status_poll_delay_ms: default_status_poll_delay_ms(),
        }
    }
}

impl Config {
    /// Runtime settings for the client loop.
    pub fn to_client_config(&self) -> ClientConfig {
        let mut movement = ChannelSettings::movement();
        movement.interval = Duration::from_millis(self.movement_interval_ms);
        movement.deadzone = self.deadzone;

        let mut camera = ChannelSettings::camera();
        camera.interval = Duration::from_millis(self.camera_interval_ms);
        camera.deadzone = self.deadzone;
        camera.auto_center_delay = Duration::from_secs(self.auto_center_delay_secs);

        ClientConfig {
            reconnect: ReconnectPolicy {
                max_attempts: self.max_reconnect_attempts.max(1),
                base_delay: Duration::from_millis(self.reconnect_delay_ms),
                max_delay: Duration::from_millis(
                    self.reconnect_max_delay_ms.max(self.reconnect_delay_ms),
                ),
                multiplier: self.backoff_multiplier,
            },
            keepalive_timeout: Duration::from_secs(self.keepalive_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            movement,
            camera,
            toast_duration: Duration::from_secs(self.toast_duration_secs),
            status_url: Some(self.status_url.clone()).filter(|url| !url.is_empty()),
            status_poll_delay: Duration::from_millis(self.status_poll_delay_ms),
            ..ClientConfig::default()
        }
    }
}

/// Return the path to `~/.teleop/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".teleop").join("config.toml")
}

/// Load the config from disk. Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `TELEOP_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TELEOP_SERVER_URL` | `server_url` |
/// | `TELEOP_STATUS_URL` | `status_url` |
/// | `TELEOP_MAX_RECONNECT_ATTEMPTS` | `max_reconnect_attempts` |
/// | `TELEOP_KEEPALIVE_TIMEOUT_SECS` | `keepalive_timeout_secs` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TELEOP_SERVER_URL") {
        cfg.server_url = v;
    }
    if let Ok(v) = std::env::var("TELEOP_STATUS_URL") {
        cfg.status_url = v;
    }
    if let Ok(v) = std::env::var("TELEOP_MAX_RECONNECT_ATTEMPTS")
        && let Ok(n) = v.parse::<u32>()
    {
        cfg.max_reconnect_attempts = n;
    }
    if let Ok(v) = std::env::var("TELEOP_KEEPALIVE_TIMEOUT_SECS")
        && let Ok(n) = v.parse::<u64>()
    {
        cfg.keepalive_timeout_secs = n;
    }
}

/// Save the config to disk, creating `~/.teleop/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
