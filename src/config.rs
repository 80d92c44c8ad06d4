use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_ENV_PREFIX: &str = "MOLT";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub moltbook: MoltbookConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub ui: UIConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoltbookConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for MoltbookConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    crate::moltbook::DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("molt-tui/{} (+https://github.com/moltbook/molt-tui)", crate::VERSION)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    #[serde(default = "default_sort")]
    pub default_sort: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_refresh_interval", with = "humantime_serde")]
    pub refresh_interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_sort: default_sort(),
            page_size: default_page_size(),
            refresh_interval: default_refresh_interval(),
        }
    }
}

fn default_sort() -> String {
    "hot".into()
}

fn default_page_size() -> u32 {
    crate::moltbook::DEFAULT_PAGE_SIZE
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UIConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
        }
    }
}

fn default_theme() -> String {
    "default".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, load_env(prefix)?);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.moltbook.base_url.is_empty() && other.moltbook.base_url != default_base_url() {
        base.moltbook.base_url = other.moltbook.base_url;
    }
    if !other.moltbook.api_key.is_empty() {
        base.moltbook.api_key = other.moltbook.api_key;
    }
    if !other.moltbook.user_agent.is_empty() && other.moltbook.user_agent != default_user_agent() {
        base.moltbook.user_agent = other.moltbook.user_agent;
    }

    if !other.feed.default_sort.is_empty() && other.feed.default_sort != default_sort() {
        base.feed.default_sort = other.feed.default_sort;
    }
    if other.feed.page_size != 0 && other.feed.page_size != default_page_size() {
        base.feed.page_size = other.feed.page_size;
    }
    if other.feed.refresh_interval != default_refresh_interval() {
        base.feed.refresh_interval = other.feed.refresh_interval;
    }

    if !other.ui.theme.is_empty() && other.ui.theme != default_theme() {
        base.ui.theme = other.ui.theme;
    }

    base
}

fn load_env(prefix: &str) -> Result<Config> {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    if map.is_empty() {
        return Ok(Config::default());
    }

    let mut cfg = Config::default();

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }

    Ok(cfg)
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "moltbook.base_url" => cfg.moltbook.base_url = value,
        "moltbook.api_key" => cfg.moltbook.api_key = value,
        "moltbook.user_agent" => cfg.moltbook.user_agent = value,
        "feed.default_sort" => cfg.feed.default_sort = value,
        "feed.page_size" => {
            if let Ok(parsed) = value.parse::<u32>() {
                cfg.feed.page_size = parsed;
            }
        }
        "feed.refresh_interval" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.feed.refresh_interval = duration;
            }
        }
        "ui.theme" => cfg.ui.theme = value,
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("molt-tui").join("config.yaml"))
}

pub fn save_api_key(path: Option<PathBuf>, api_key: &str) -> Result<PathBuf> {
    let api_key = api_key.trim();
    anyhow::ensure!(!api_key.is_empty(), "config: moltbook.api_key is required");

    let path = if let Some(path) = path {
        path
    } else {
        default_config_path().context("config: unable to determine default config path")?
    };

    let mut cfg = if path.exists() {
        read_config_file(&path)?
    } else {
        Config::default()
    };

    cfg.moltbook.api_key = api_key.to_string();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("config: failed to create directory {}", parent.display()))?;
    }

    let contents = serde_yaml::to_string(&cfg).context("config: failed to serialize config")?;
    fs::write(&path, contents)
        .with_context(|| format!("config: failed to write file {}", path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    // Each test gets its own env prefix and config path so they stay
    // independent of the host machine and of each other.
    fn isolated(prefix: &str) -> LoadOptions {
        LoadOptions {
            config_file: Some(PathBuf::from("/nonexistent/molt-tui/config.yaml")),
            env_prefix: Some(prefix.to_string()),
        }
    }

    #[test]
    fn load_defaults_without_files() {
        let cfg = load(isolated("MOLT_TEST_DEFAULTS")).unwrap();
        assert_eq!(cfg.ui.theme, "default");
        assert_eq!(cfg.feed.default_sort, "hot");
        assert_eq!(cfg.feed.page_size, 25);
        assert_eq!(cfg.feed.refresh_interval, Duration::from_secs(30));
        assert_eq!(cfg.moltbook.base_url, default_base_url());
    }

    #[test]
    fn save_api_key_creates_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        save_api_key(Some(path.clone()), "molt_sk_123").unwrap();
        let saved = read_config_file(&path).unwrap();
        assert_eq!(saved.moltbook.api_key, "molt_sk_123");
    }

    #[test]
    fn env_overrides() {
        env::set_var("MOLT_ENV_TEST_FEED__REFRESH_INTERVAL", "45s");
        env::set_var("MOLT_ENV_TEST_FEED__DEFAULT_SORT", "top");
        env::set_var("MOLT_ENV_TEST_UI__THEME", "molt");
        let cfg = load(isolated("MOLT_ENV_TEST")).unwrap();
        assert_eq!(cfg.feed.refresh_interval, Duration::from_secs(45));
        assert_eq!(cfg.feed.default_sort, "top");
        assert_eq!(cfg.ui.theme, "molt");
        env::remove_var("MOLT_ENV_TEST_FEED__REFRESH_INTERVAL");
        env::remove_var("MOLT_ENV_TEST_FEED__DEFAULT_SORT");
        env::remove_var("MOLT_ENV_TEST_UI__THEME");
    }

    #[test]
    fn file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut cfg = Config::default();
        cfg.moltbook.base_url = "http://localhost:8080/api/v1/".into();
        cfg.feed.page_size = 10;
        fs::write(&path, serde_yaml::to_string(&cfg).unwrap()).unwrap();
        let loaded = load(LoadOptions {
            config_file: Some(path),
            env_prefix: Some("MOLT_TEST_UNUSED".into()),
        })
        .unwrap();
        assert_eq!(loaded.moltbook.base_url, "http://localhost:8080/api/v1/");
        assert_eq!(loaded.feed.page_size, 10);
    }
}
