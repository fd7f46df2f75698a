//! Configuration error types

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error in {}: {source}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Error {
    /// Wrap an I/O failure with the path that caused it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = Error::Config("storage.path must not be empty".into());
        assert_eq!(
            err.to_string(),
            "Configuration error: storage.path must not be empty"
        );
    }

    #[test]
    fn io_error_names_the_path() {
        let err = Error::io(
            "/etc/token-dealer.toml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        );
        let msg = err.to_string();
        assert!(
            msg.starts_with("I/O error on /etc/token-dealer.toml"),
            "got: {msg}"
        );
        assert!(msg.contains("file not found"), "got: {msg}");
    }

    #[test]
    fn toml_error_names_the_path() {
        let source = toml::from_str::<toml::Table>("not valid {{{{ toml").unwrap_err();
        let err = Error::Toml {
            path: "bad.toml".into(),
            source,
        };
        assert!(err.to_string().starts_with("TOML parse error in bad.toml"));
    }
}
