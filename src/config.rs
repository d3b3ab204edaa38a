//! Configuration loading.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! `CONTRIB_CALENDAR_*` environment variables. The binary applies its flags
//! last.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::analysis::RepoFilter;
use crate::fetch::FetcherOptions;

pub const ENV_OWNER: &str = "CONTRIB_CALENDAR_OWNER";
pub const ENV_API_URL: &str = "CONTRIB_CALENDAR_API_URL";
pub const ENV_CACHE_DIR: &str = "CONTRIB_CALENDAR_CACHE_DIR";
pub const ENV_CACHE_TTL: &str = "CONTRIB_CALENDAR_CACHE_TTL_SECS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Account whose repositories are aggregated
    pub owner: String,
    pub api_base_url: String,
    pub user_agent: String,
    pub request_timeout_ms: u64,
    pub cache_dir: PathBuf,
    pub cache_namespace: String,
    pub cache_ttl_secs: u64,
    /// Emulated storage quota for the on-disk cache
    pub cache_max_bytes: usize,
    pub include_archived: bool,
    pub include_forks: bool,
    pub max_repositories: usize,
    /// Also fetch the per-day commit activity feed of each repository
    pub include_commit_activity: bool,
    pub pending_retries: u32,
    pub pending_retry_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            owner: String::new(),
            api_base_url: "https://api.github.com".to_string(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout_ms: 15_000,
            cache_dir: default_cache_dir(),
            cache_namespace: "contrib-calendar:".to_string(),
            cache_ttl_secs: 60 * 60,
            cache_max_bytes: 5 * 1024 * 1024,
            include_archived: false,
            include_forks: true,
            max_repositories: 100,
            include_commit_activity: false,
            pending_retries: 2,
            pending_retry_delay_ms: 1500,
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("contrib-calendar")
}

impl Config {
    /// Defaults, overlaid with `path` if given, overlaid with the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(owner) = lookup(ENV_OWNER) {
            self.owner = owner;
        }
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(ttl) = lookup(ENV_CACHE_TTL) {
            self.cache_ttl_secs = ttl.trim().parse().map_err(|e| ConfigError::InvalidValue {
                field: "cache_ttl_secs",
                reason: format!("{:?}: {}", ttl, e),
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.owner.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "owner",
                reason: format!("must not be empty (set it in the config file or {})", ENV_OWNER),
            });
        }
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.cache_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache_ttl_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_repositories == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_repositories",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fetcher_options(&self) -> FetcherOptions {
        FetcherOptions {
            pending_retries: self.pending_retries,
            pending_retry_delay: Duration::from_millis(self.pending_retry_delay_ms),
        }
    }

    pub fn repo_filter(&self) -> RepoFilter {
        RepoFilter {
            include_archived: self.include_archived,
            include_forks: self.include_forks,
            max_repositories: self.max_repositories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_toml_overrides_defaults() {
        let config = Config::from_toml(
            r#"
            owner = "octocat"
            cache_ttl_secs = 120
            include_archived = true
            "#,
        )
        .unwrap();
        assert_eq!(config.owner, "octocat");
        assert_eq!(config.cache_ttl(), Duration::from_secs(120));
        assert!(config.include_archived);
        assert_eq!(config.api_base_url, "https://api.github.com");
        assert_eq!(config.max_repositories, 100);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = Config::from_toml("ownr = \"typo\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_OWNER, "from-env"),
            (ENV_CACHE_DIR, "/tmp/cc-cache"),
            (ENV_CACHE_TTL, "30"),
        ]);
        let mut config = Config::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.owner, "from-env");
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cc-cache"));
        assert_eq!(config.cache_ttl_secs, 30);

        let err = config
            .apply_env(|key| (key == ENV_CACHE_TTL).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "cache_ttl_secs", .. }));
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "owner", .. })
        ));
        config.owner = "octocat".to_string();
        assert!(config.validate().is_ok());
        config.cache_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "owner = \"file-owner\"\nmax_repositories = 5\n").unwrap();
        let config = Config::from_path(&path).unwrap();
        assert_eq!(config.owner, "file-owner");
        assert_eq!(config.repo_filter().max_repositories, 5);
    }
}
