use crate::api::normalize_url;
use crate::error::ConfigError;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_POLL_SECS: u64 = 10;

/// Values read from `config.toml`; every key is optional there.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    instance_url: Option<String>,
    api_token: Option<String>,
    account_slug: Option<String>,
    board_id: Option<String>,
    poll_interval_secs: Option<u64>,
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub instance_url: String,
    pub api_token: String,
    pub account_slug: Option<String>,
    pub board_id: Option<String>,
    pub poll_interval: Duration,
    pub log_file: PathBuf,
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fizzy-tui").join("config.toml"))
}

fn default_log_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(env::temp_dir)
        .join("fizzy-tui")
        .join("fizzy-tui.log")
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl Config {
    /// `.env`, then the config file, then the process environment; later
    /// sources win.
    pub fn load() -> Result<Config, ConfigError> {
        dotenv::dotenv().ok();

        let file = match config_path() {
            Some(path) if path.exists() => read_file(&path)?,
            _ => FileConfig::default(),
        };
        Config::resolve(file, |key| env::var(key).ok())
    }

    fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let pick = |key: &str, fallback: Option<String>| {
            env(key)
                .filter(|v| !v.trim().is_empty())
                .or(fallback)
                .map(|v| v.trim().to_string())
        };

        let instance_url = pick("FIZZY_URL", file.instance_url)
            .ok_or(ConfigError::Missing { key: "FIZZY_URL" })?;
        let api_token = pick("FIZZY_TOKEN", file.api_token)
            .ok_or(ConfigError::Missing { key: "FIZZY_TOKEN" })?;
        let account_slug = pick("FIZZY_ACCOUNT", file.account_slug)
            .map(|slug| slug.trim_start_matches('/').to_string())
            .filter(|slug| !slug.is_empty());
        let board_id = pick("FIZZY_BOARD", file.board_id);

        let poll_secs = match env("FIZZY_POLL_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: "FIZZY_POLL_SECS",
                message: e.to_string(),
            })?,
            None => file.poll_interval_secs.unwrap_or(DEFAULT_POLL_SECS),
        };
        if poll_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "FIZZY_POLL_SECS",
                message: "must be at least 1".to_string(),
            });
        }

        let log_file = env("FIZZY_LOG")
            .map(PathBuf::from)
            .or(file.log_file)
            .unwrap_or_else(default_log_file);

        Ok(Config {
            instance_url: normalize_url(&instance_url),
            api_token,
            account_slug,
            board_id,
            poll_interval: Duration::from_secs(poll_secs),
            log_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_only() {
        let config = Config::resolve(
            FileConfig::default(),
            env_of(&[
                ("FIZZY_URL", "app.fizzy.do"),
                ("FIZZY_TOKEN", "tok"),
                ("FIZZY_ACCOUNT", "/897362"),
            ]),
        )
        .unwrap();

        assert_eq!(config.instance_url, "https://app.fizzy.do/");
        assert_eq!(config.api_token, "tok");
        assert_eq!(config.account_slug.as_deref(), Some("897362"));
        assert_eq!(config.board_id, None);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_env_overrides_file() {
        let file: FileConfig = toml::from_str(
            r#"
            instance_url = "https://fizzy.example.com"
            api_token = "from-file"
            board_id = "03f5"
            poll_interval_secs = 30
            "#,
        )
        .unwrap();

        let config = Config::resolve(file, env_of(&[("FIZZY_TOKEN", "from-env")])).unwrap();
        assert_eq!(config.instance_url, "https://fizzy.example.com/");
        assert_eq!(config.api_token, "from-env");
        assert_eq!(config.board_id.as_deref(), Some("03f5"));
        assert_eq!(config.poll_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_token() {
        let err = Config::resolve(FileConfig::default(), env_of(&[("FIZZY_URL", "x")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { key: "FIZZY_TOKEN" }));
    }

    #[test]
    fn test_invalid_poll_interval() {
        let env = env_of(&[
            ("FIZZY_URL", "x"),
            ("FIZZY_TOKEN", "t"),
            ("FIZZY_POLL_SECS", "soon"),
        ]);
        let err = Config::resolve(FileConfig::default(), env).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "FIZZY_POLL_SECS", .. }));

        let env = env_of(&[("FIZZY_URL", "x"), ("FIZZY_TOKEN", "t"), ("FIZZY_POLL_SECS", "0")]);
        assert!(Config::resolve(FileConfig::default(), env).is_err());
    }

    #[test]
    fn test_blank_env_falls_back_to_file() {
        let file = FileConfig {
            instance_url: Some("fizzy.local".to_string()),
            api_token: Some("t".to_string()),
            ..FileConfig::default()
        };
        let config = Config::resolve(file, env_of(&[("FIZZY_URL", "  ")])).unwrap();
        assert_eq!(config.instance_url, "https://fizzy.local/");
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let dir = std::env::temp_dir().join(format!("fizzy-tui-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        fs::write(&path, "instance_url = [").unwrap();

        let err = read_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        fs::remove_dir_all(&dir).unwrap();
    }
}
