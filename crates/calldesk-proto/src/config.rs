use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mpv: MpvConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub download: DownloadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpvConfig {
    /// When false the inspector runs without audio; the player stays idle.
    #[serde(default = "default_mpv_enabled")]
    pub enabled: bool,
    /// Explicit mpv binary; otherwise looked up beside the exe and on PATH.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<PathBuf>,
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    /// Extra command-line arguments passed to mpv verbatim.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Where downloaded call recordings are saved.
    #[serde(default = "platform::downloads_dir")]
    pub downloads_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for MpvConfig {
    fn default() -> Self {
        Self {
            enabled: default_mpv_enabled(),
            binary: None,
            default_volume: default_volume(),
            extra_args: Vec::new(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            downloads_dir: platform::downloads_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_download_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_mpv_enabled() -> bool {
    true
}

fn default_volume() -> f32 {
    0.8
}

fn default_log_filter() -> String {
    "info,calldesk=debug,calldesk_proto=debug,hyper_util=warn,reqwest=warn".to_string()
}

fn default_download_timeout() -> u64 {
    120
}

fn default_user_agent() -> String {
    format!("calldesk/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    /// Load from the default location, writing defaults there on first run.
    /// Never fails: a broken or unwritable config yields the defaults, and
    /// the error is handed back so the caller can log it.
    pub fn load_or_default() -> (Self, Option<anyhow::Error>) {
        Self::load_or_default_at(&Self::config_path())
    }

    pub fn load_or_default_at(path: &Path) -> (Self, Option<anyhow::Error>) {
        match Self::load_or_init(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    fn load_or_init(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }
        Self::load_from(path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.mpv.enabled);
        assert_eq!(config.mpv.binary, None);
        assert_eq!(config.download.timeout_secs, 120);
        assert!(config.logging.filter.contains("calldesk=debug"));
        assert!(config.paths.downloads_dir.ends_with("call-recordings"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml_str(
            r#"
            [mpv]
            enabled = false

            [paths]
            downloads_dir = "/srv/recordings"
            "#,
        )
        .unwrap();
        assert!(!config.mpv.enabled);
        assert_eq!(config.mpv.default_volume, 0.8);
        assert_eq!(config.paths.downloads_dir, PathBuf::from("/srv/recordings"));
        assert_eq!(config.download.timeout_secs, 120);
    }

    #[test]
    fn test_malformed_file_falls_back_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[mpv\nenabled = nope").unwrap();

        let (config, err) = Config::load_or_default_at(&path);
        assert!(config.mpv.enabled);
        let err = err.expect("malformed config reports an error");
        assert!(format!("{:#}", err).contains("parsing config"));
    }

    #[test]
    fn test_missing_file_is_written_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let (config, err) = Config::load_or_default_at(&path);
        assert!(err.is_none());
        assert_eq!(config.download.timeout_secs, 120);
        let written = Config::load_from(&path).unwrap();
        assert_eq!(written.logging.filter, config.logging.filter);
    }

    #[test]
    fn test_round_trips_through_toml() {
        let mut config = Config::default();
        config.mpv.extra_args = vec!["--audio-device=null".to_string()];
        let text = toml::to_string_pretty(&config).unwrap();
        let back = Config::from_toml_str(&text).unwrap();
        assert_eq!(back.mpv.extra_args, config.mpv.extra_args);
    }
}
