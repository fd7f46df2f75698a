//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults.
//! Seed tokens may come from SEED_ACCESS_TOKEN / SEED_REFRESH_TOKEN or a
//! refresh_token_file so they need not live in the TOML itself.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bearer_auth::{CredentialRecord, ManagerConfig};
use common::Secret;
use serde::Deserialize;

const ACCESS_TOKEN_ENV: &str = "SEED_ACCESS_TOKEN";
const REFRESH_TOKEN_ENV: &str = "SEED_REFRESH_TOKEN";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub instance: InstanceConfig,
    pub storage: StorageConfig,
    pub seed: SeedConfig,
}

/// External service settings
#[derive(Debug, Deserialize)]
pub struct InstanceConfig {
    /// Host of the external service; the token endpoint hangs off it
    pub host: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    pub path: PathBuf,
}

/// Bootstrap credential, written to the store only when it is empty.
#[derive(Debug, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub access_token: Option<Secret<String>>,
    pub access_expiry_secs: u64,
    #[serde(default)]
    pub refresh_token: Option<Secret<String>>,
    /// Path to a file containing the refresh token (alternative to SEED_REFRESH_TOKEN)
    #[serde(default)]
    pub refresh_token_file: Option<PathBuf>,
    pub refresh_expiry_secs: u64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub subject: String,
}

fn default_timeout() -> u64 {
    30
}

fn default_token_type() -> String {
    "bearer".into()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Refresh token resolution order:
    /// 1. SEED_REFRESH_TOKEN env var
    /// 2. refresh_token_file path from config
    /// 3. refresh_token in the file itself
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| common::Error::io(path, e))?;
        let mut config: Config = toml::from_str(&contents).map_err(|source| common::Error::Toml {
            path: path.to_path_buf(),
            source,
        })?;

        if config.instance.host.trim().is_empty() {
            return Err(common::Error::Config("instance.host must not be empty".into()));
        }

        if config.instance.timeout_secs == 0 {
            return Err(common::Error::Config(
                "instance.timeout_secs must be greater than 0".into(),
            ));
        }

        if config.storage.path.as_os_str().is_empty() {
            return Err(common::Error::Config("storage.path must not be empty".into()));
        }

        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            config.seed.access_token = Some(Secret::new(token));
        }

        if let Ok(token) = std::env::var(REFRESH_TOKEN_ENV) {
            config.seed.refresh_token = Some(Secret::new(token));
        } else if let Some(ref token_file) = config.seed.refresh_token_file {
            let token = std::fs::read_to_string(token_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read refresh_token_file {}: {e}",
                    token_file.display()
                ))
            })?;
            config.seed.refresh_token = Some(Secret::new(token.trim().to_owned()));
        }

        if config.seed.access_token.as_ref().is_none_or(Secret::is_blank) {
            return Err(common::Error::Config(format!(
                "seed.access_token is required (or set {ACCESS_TOKEN_ENV})"
            )));
        }
        if config.seed.refresh_token.as_ref().is_none_or(Secret::is_blank) {
            return Err(common::Error::Config(format!(
                "seed.refresh_token is required (or set {REFRESH_TOKEN_ENV} / refresh_token_file)"
            )));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("token-dealer.toml")
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig::new(self.storage.path.clone(), self.instance.host.trim())
            .with_refresh_timeout(Duration::from_secs(self.instance.timeout_secs))
    }

    /// The seed credential as if issued at `issued_at` (unix millis).
    pub fn seed_record(&self, issued_at: u64) -> CredentialRecord {
        let expose = |s: &Option<Secret<String>>| {
            s.as_ref().map(|s| s.expose().clone()).unwrap_or_default()
        };
        CredentialRecord {
            access_token: expose(&self.seed.access_token),
            access_expiry_secs: self.seed.access_expiry_secs,
            refresh_token: expose(&self.seed.refresh_token),
            refresh_expiry_secs: self.seed.refresh_expiry_secs,
            token_type: self.seed.token_type.clone(),
            subject: self.seed.subject.clone(),
            issued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn clear_seed_env() {
        unsafe {
            remove_env(ACCESS_TOKEN_ENV);
            remove_env(REFRESH_TOKEN_ENV);
        }
    }

    fn valid_toml() -> &'static str {
        r#"
[instance]
host = "api.example.com"

[storage]
path = "/var/lib/token-dealer/credential.json"

[seed]
access_token = "a1"
access_expiry_secs = 3600
refresh_token = "r1"
refresh_expiry_secs = 7200
subject = "u@example.com"
"#
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("token-dealer.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_valid_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_seed_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        let config = Config::load(&path).unwrap();
        assert_eq!(config.instance.host, "api.example.com");
        assert_eq!(config.instance.timeout_secs, 30);
        assert_eq!(
            config.storage.path,
            PathBuf::from("/var/lib/token-dealer/credential.json")
        );
        assert_eq!(config.seed.token_type, "bearer");

        let seed = config.seed_record(42);
        assert_eq!(seed.access_token, "a1");
        assert_eq!(seed.refresh_token, "r1");
        assert_eq!(seed.access_expiry_secs, 3600);
        assert_eq!(seed.refresh_expiry_secs, 7200);
        assert_eq!(seed.subject, "u@example.com");
        assert_eq!(seed.issued_at, 42);
    }

    #[test]
    fn test_manager_config_carries_timeout() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_seed_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &valid_toml().replace(
                "host = \"api.example.com\"",
                "host = \"api.example.com\"\ntimeout_secs = 5",
            ),
        );

        let manager_config = Config::load(&path).unwrap().manager_config();
        assert_eq!(manager_config.base_url, "api.example.com");
        assert_eq!(manager_config.refresh_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/token-dealer.toml"));
        assert!(matches!(result, Err(common::Error::Io { .. })));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");

        let result = Config::load(&path);
        assert!(matches!(result, Err(common::Error::Toml { .. })));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_seed_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &valid_toml().replace(
                "host = \"api.example.com\"",
                "host = \"api.example.com\"\ntimeout_secs = 0",
            ),
        );

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"), "got: {err}");
    }

    #[test]
    fn test_empty_host_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_seed_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &valid_toml().replace("host = \"api.example.com\"", "host = \"  \""),
        );

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("instance.host"), "got: {err}");
    }

    #[test]
    fn test_seed_tokens_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        unsafe {
            set_env(ACCESS_TOKEN_ENV, "a-env");
            set_env(REFRESH_TOKEN_ENV, "r-env");
        }
        let config = Config::load(&path).unwrap();
        clear_seed_env();

        let seed = config.seed_record(0);
        assert_eq!(seed.access_token, "a-env");
        assert_eq!(seed.refresh_token, "r-env");
    }

    #[test]
    fn test_refresh_token_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_seed_env();
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("refresh_token");
        std::fs::write(&token_path, "r-file\n").unwrap();

        let toml_content = format!(
            r#"
[instance]
host = "api.example.com"

[storage]
path = "credential.json"

[seed]
access_token = "a1"
access_expiry_secs = 3600
refresh_token_file = "{}"
refresh_expiry_secs = 7200
subject = "u@example.com"
"#,
            token_path.display()
        );
        let path = write_config(&dir, &toml_content);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.seed_record(0).refresh_token, "r-file");
    }

    #[test]
    fn test_missing_refresh_token_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_seed_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, &valid_toml().replace("refresh_token = \"r1\"\n", ""));

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("seed.refresh_token"), "got: {err}");
    }

    #[test]
    fn test_debug_does_not_leak_seed_tokens() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_seed_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        let config = Config::load(&path).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("\"a1\""), "got: {debug}");
        assert!(!debug.contains("\"r1\""), "got: {debug}");
    }

    #[test]
    fn test_resolve_path_prefers_cli() {
        assert_eq!(
            Config::resolve_path(Some("/etc/dealer.toml")),
            PathBuf::from("/etc/dealer.toml")
        );
    }
}
