//! Host and credential resolution.
//!
//! The host comes from `BLOBCACHE_HOST`, then the `host:` key of
//! `~/.config/blobcache/config.yml`, then the built-in default. The auth
//! token comes from `BLOBCACHE_TOKEN`, then the `auth_token:` key of
//! `~/.config/blobcache/account.yml`. Missing config files are fine;
//! unreadable or unparsable ones are reported before any network call. A
//! missing token only errors when an operation actually asks for it.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_HOST: &str = "https://cache.blobcache.dev";

const HOST_ENV: &str = "BLOBCACHE_HOST";
const TOKEN_ENV: &str = "BLOBCACHE_TOKEN";

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    host: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AccountFile {
    auth_token: Option<String>,
}

/// Resolved client configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    host: String,
    token: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(config_dir().as_deref())
    }

    fn load_from(dir: Option<&Path>) -> Result<Self> {
        let file: ConfigFile = match dir {
            Some(dir) => read_yaml(&dir.join("config.yml"))?,
            None => ConfigFile::default(),
        };
        let account: AccountFile = match dir {
            Some(dir) => read_yaml(&dir.join("account.yml"))?,
            None => AccountFile::default(),
        };
        let host = env_var(HOST_ENV)
            .or(file.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let token = env_var(TOKEN_ENV).or(account.auth_token);
        tracing::debug!(%host, token_present = token.is_some(), "configuration resolved");
        Ok(Config { host, token })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// The auth token, raised lazily so unauthenticated paths (help,
    /// argument errors) never demand a login.
    pub fn auth_token(&self) -> std::result::Result<&str, blobcache_core::Error> {
        self.token
            .as_deref()
            .ok_or(blobcache_core::Error::MissingToken)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Reads an optional YAML file: absent means defaults, unparsable is an
/// error.
fn read_yaml<T>(path: &Path) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let parsed: Option<T> = serde_yaml::from_str(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            Ok(parsed.unwrap_or_default())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("blobcache"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    fn clear_env() {
        env::remove_var(HOST_ENV);
        env::remove_var(TOKEN_ENV);
    }

    #[test]
    #[serial]
    fn defaults_apply_without_env_or_files() {
        clear_env();
        let config = Config::load_from(None).unwrap();
        assert_eq!(config.host(), DEFAULT_HOST);
        assert!(matches!(
            config.auth_token(),
            Err(blobcache_core::Error::MissingToken)
        ));
    }

    #[test]
    #[serial]
    fn missing_files_fall_back_to_defaults() {
        clear_env();
        let dir = tempdir().unwrap();
        let config = Config::load_from(Some(dir.path())).unwrap();
        assert_eq!(config.host(), DEFAULT_HOST);
    }

    #[test]
    #[serial]
    fn files_supply_host_and_token() {
        clear_env();
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("config.yml"), "host: https://cache.internal\n").unwrap();
        fs::write(dir.path().join("account.yml"), "auth_token: tok-123\n").unwrap();
        let config = Config::load_from(Some(dir.path())).unwrap();
        assert_eq!(config.host(), "https://cache.internal");
        assert_eq!(config.auth_token().unwrap(), "tok-123");
    }

    #[test]
    #[serial]
    fn environment_overrides_files() {
        clear_env();
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("config.yml"), "host: https://cache.internal\n").unwrap();
        fs::write(dir.path().join("account.yml"), "auth_token: from-file\n").unwrap();
        env::set_var(HOST_ENV, "https://cache.override");
        env::set_var(TOKEN_ENV, "from-env");
        let config = Config::load_from(Some(dir.path())).unwrap();
        assert_eq!(config.host(), "https://cache.override");
        assert_eq!(config.auth_token().unwrap(), "from-env");
        clear_env();
    }

    #[test]
    #[serial]
    fn unparsable_config_is_an_error() {
        clear_env();
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("config.yml"), "host: [:::").unwrap();
        let err = Config::load_from(Some(dir.path())).unwrap_err();
        assert!(err.to_string().contains("parse"), "got: {err}");
    }

    #[test]
    #[serial]
    fn empty_files_are_tolerated() {
        clear_env();
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("config.yml"), "").unwrap();
        let config = Config::load_from(Some(dir.path())).unwrap();
        assert_eq!(config.host(), DEFAULT_HOST);
    }
}
