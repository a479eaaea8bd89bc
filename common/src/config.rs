use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub plex: PlexConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub canvas: CanvasConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlexConfig {
    #[serde(default = "default_plex_host")]
    pub host: String,
    /// Required. Usually supplied through `PLEX_TOKEN` rather than the file.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_webhook_port")]
    pub webhook_port: u16,
    #[serde(default = "default_static_port")]
    pub static_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanvasConfig {
    #[serde(default = "default_canvas_width")]
    pub width: u32,
    #[serde(default = "default_canvas_height")]
    pub height: u32,
    /// When false, artwork smaller than the canvas is centered at native size.
    #[serde(default = "default_allow_upscale")]
    pub allow_upscale: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    #[serde(default = "default_placeholder_path")]
    pub placeholder: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for PlexConfig {
    fn default() -> Self {
        Self {
            host: default_plex_host(),
            token: String::new(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            webhook_port: default_webhook_port(),
            static_port: default_static_port(),
        }
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: default_canvas_width(),
            height: default_canvas_height(),
            allow_upscale: default_allow_upscale(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            placeholder: default_placeholder_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from a TOML file. A missing file yields all defaults so the
    /// process can be configured through the environment alone.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Apply overrides from a key lookup. Empty values are treated as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(host) = get("PLEX_HOST") {
            self.plex.host = host;
        }
        if let Some(token) = get("PLEX_TOKEN") {
            self.plex.token = token;
        }
        if let Some(path) = get("OUTPUT_PATH") {
            self.output.path = PathBuf::from(path);
        }
        if let Some(path) = get("PLACEHOLDER_PATH") {
            self.output.placeholder = PathBuf::from(path);
        }
        override_number(&get, "FETCH_TIMEOUT_SECS", &mut self.plex.fetch_timeout_secs);
        override_number(&get, "WEBHOOK_PORT", &mut self.server.webhook_port);
        override_number(&get, "STATIC_PORT", &mut self.server.static_port);
        override_number(&get, "CANVAS_WIDTH", &mut self.canvas.width);
        override_number(&get, "CANVAS_HEIGHT", &mut self.canvas.height);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.plex.token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "canvas must be non-empty, got {}x{}",
                self.canvas.width, self.canvas.height
            )));
        }
        if self.plex.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "plex.fetch_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn override_number<T, G>(get: &G, key: &str, slot: &mut T)
where
    T: std::str::FromStr + std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    let Some(raw) = get(key) else {
        return;
    };
    match raw.parse() {
        Ok(value) => *slot = value,
        Err(_) => warn!(key, value = %raw, fallback = %slot, "invalid number, keeping fallback"),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("PLEX_TOKEN is not set")]
    MissingToken,
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("placeholder asset {0} is unavailable: {1}")]
    Placeholder(String, String),
}

// Default value functions
fn default_plex_host() -> String {
    "http://plex.local:32400".into()
}
fn default_fetch_timeout() -> u64 {
    10
}
fn default_webhook_port() -> u16 {
    8080
}
fn default_static_port() -> u16 {
    8081
}
fn default_canvas_width() -> u32 {
    1080
}
fn default_canvas_height() -> u32 {
    1920
}
fn default_allow_upscale() -> bool {
    true
}
fn default_output_path() -> PathBuf {
    PathBuf::from("./output/now-playing.png")
}
fn default_placeholder_path() -> PathBuf {
    PathBuf::from("./transparent.png")
}
fn default_log_level() -> String {
    "info".into()
}
