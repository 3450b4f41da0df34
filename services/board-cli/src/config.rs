//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The seed access token comes from BOARD_ACCESS_TOKEN or `token_file`,
//! never from the TOML itself.

use common::{ApiOrigin, Secret};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub dev: DevConfig,
}

/// Board API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// Origin every endpoint is resolved against; BOARD_API_URL overrides
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Session seed
#[derive(Debug, Default, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub token_file: Option<PathBuf>,
    #[serde(skip)]
    pub token: Option<Secret<String>>,
}

/// Development settings
#[derive(Debug, Deserialize)]
pub struct DevConfig {
    /// Serve the API from an in-process development backend
    #[serde(default)]
    pub mock: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            mock: false,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    60
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Token resolution order:
    /// 1. BOARD_ACCESS_TOKEN env var
    /// 2. token_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(url) = std::env::var("BOARD_API_URL") {
            config.api.base_url = url;
        }

        // The development backend supplies its own origin
        if !config.dev.mock {
            if config.api.base_url.trim().is_empty() {
                return Err(common::Error::Config(
                    "api.base_url is required (or set BOARD_API_URL)".into(),
                ));
            }
            ApiOrigin::parse(&config.api.base_url)?;
        }

        if config.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.dev.poll_interval_secs == 0 {
            return Err(common::Error::Config(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }

        let from_env = std::env::var("BOARD_ACCESS_TOKEN")
            .ok()
            .map(Secret::new)
            .filter(|token| !token.is_blank());
        if let Some(token) = from_env {
            config.session.token = Some(token);
        } else if let Some(ref token_file) = config.session.token_file {
            let token = std::fs::read_to_string(token_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read token_file {}: {e}",
                    token_file.display()
                ))
            })?;
            let token = token.trim().to_owned();
            if !token.is_empty() {
                config.session.token = Some(Secret::new(token));
            }
        }

        Ok(config)
    }

    /// Parsed API origin.
    pub fn origin(&self) -> common::Result<ApiOrigin> {
        ApiOrigin::parse(&self.api.base_url)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("board-client.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that read or mutate environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn clear_overlays() {
        unsafe {
            remove_env("BOARD_API_URL");
            remove_env("BOARD_ACCESS_TOKEN");
        }
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("board-client.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    const VALID: &str = r#"
[api]
base_url = "https://board.example.com/"
"#;

    #[test]
    fn test_load_valid_config_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overlays();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, VALID);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.dev.poll_interval_secs, 60);
        assert!(!config.dev.mock);
        assert!(config.session.token.is_none());
        assert_eq!(
            config.origin().unwrap().as_str(),
            "https://board.example.com"
        );
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/board-client.toml"));
        assert!(matches!(result, Err(common::Error::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");

        let result = Config::load(&path);
        assert!(matches!(result, Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_base_url_required_without_mock() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overlays();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\ntimeout_secs = 5\n");

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("base_url"), "got: {err}");
    }

    #[test]
    fn test_base_url_optional_with_mock() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overlays();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[dev]\nmock = true\npoll_interval_secs = 2\n");

        let config = Config::load(&path).unwrap();
        assert!(config.dev.mock);
        assert_eq!(config.dev.poll_interval_secs, 2);
    }

    #[test]
    fn test_base_url_scheme_validated() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overlays();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\nbase_url = \"ftp://board.example.com\"\n");

        let result = Config::load(&path);
        assert!(matches!(result, Err(common::Error::InvalidOrigin(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overlays();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[api]\nbase_url = \"https://board.example.com\"\ntimeout_secs = 0\n",
        );

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"), "got: {err}");
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overlays();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[api]\nbase_url = \"https://board.example.com\"\n[dev]\npoll_interval_secs = 0\n",
        );

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"), "got: {err}");
    }

    #[test]
    fn test_base_url_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overlays();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, VALID);

        unsafe { set_env("BOARD_API_URL", "http://127.0.0.1:9000") };
        let config = Config::load(&path).unwrap();
        assert_eq!(config.origin().unwrap().as_str(), "http://127.0.0.1:9000");
        clear_overlays();
    }

    #[test]
    fn test_token_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overlays();
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token");
        std::fs::write(&token_path, "T-file\n").unwrap();
        let path = write_config(
            &dir,
            &format!(
                "{VALID}\n[session]\ntoken_file = \"{}\"\n",
                token_path.display()
            ),
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.session.token.as_ref().unwrap().expose(), "T-file");
    }

    #[test]
    fn test_blank_token_file_means_signed_out() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overlays();
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token");
        std::fs::write(&token_path, "  \n").unwrap();
        let path = write_config(
            &dir,
            &format!(
                "{VALID}\n[session]\ntoken_file = \"{}\"\n",
                token_path.display()
            ),
        );

        let config = Config::load(&path).unwrap();
        assert!(config.session.token.is_none());
    }

    #[test]
    fn test_unreadable_token_file_is_config_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overlays();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &format!("{VALID}\n[session]\ntoken_file = \"/nonexistent/token\"\n"),
        );

        let result = Config::load(&path);
        assert!(matches!(result, Err(common::Error::Config(_))));
    }

    #[test]
    fn test_token_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overlays();
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token");
        std::fs::write(&token_path, "T-file").unwrap();
        let path = write_config(
            &dir,
            &format!(
                "{VALID}\n[session]\ntoken_file = \"{}\"\n",
                token_path.display()
            ),
        );

        unsafe { set_env("BOARD_ACCESS_TOKEN", "T-env") };
        let config = Config::load(&path).unwrap();
        assert_eq!(config.session.token.as_ref().unwrap().expose(), "T-env");
        clear_overlays();
    }

    #[test]
    fn test_token_is_redacted_in_debug() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_overlays();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, VALID);

        unsafe { set_env("BOARD_ACCESS_TOKEN", "T-very-secret") };
        let config = Config::load(&path).unwrap();
        clear_overlays();
        assert!(!format!("{config:?}").contains("T-very-secret"));
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("board-client.toml"));
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(
            path,
            PathBuf::from("/cli/wins.toml"),
            "CLI arg must take precedence over CONFIG_PATH env var"
        );
        unsafe { remove_env("CONFIG_PATH") };
    }
}
