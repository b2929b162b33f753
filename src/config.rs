//! Connection settings for the collection API.
//!
//! Credentials live in a small TOML file:
//!
//! ```toml
//! base_url = "https://museumplus.example.org/MpWeb-mpInstance"
//! user = "EM_EM"
//! password = "secret"
//! ```
//!
//! `pw` is accepted as an alias for `password`. Command line flags and
//! `MPAPI_*` environment variables override file values.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Default credentials file name, looked up in the working directory.
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.toml";

/// Errors raised while loading credentials.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the credentials file failed.
    #[error("cannot read credentials file {path}: {source}")]
    Io {
        /// Credentials file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or misses keys.
    #[error("invalid credentials file {path}: {source}")]
    Parse {
        /// Credentials file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// A required value is neither in the file nor overridden.
    #[error("missing credential '{0}'")]
    Missing(&'static str),

    /// The base URL does not parse.
    #[error("invalid base url '{0}'")]
    InvalidBaseUrl(String),
}

/// Base URL and basic-auth login of an API instance.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Instance URL without the `/ria-ws/application` suffix.
    pub base_url: String,
    /// Login name.
    pub user: String,
    /// Login password.
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CredentialsFile {
    base_url: Option<String>,
    user: Option<String>,
    #[serde(alias = "pw")]
    password: Option<String>,
}

/// Values that replace file entries when set.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// Replaces `base_url`.
    pub base_url: Option<String>,
    /// Replaces `user`.
    pub user: Option<String>,
    /// Replaces `password`.
    pub password: Option<String>,
}

impl Credentials {
    /// Builds credentials from explicit values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] for an unparsable URL.
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if Url::parse(&base_url).is_err() {
            return Err(ConfigError::InvalidBaseUrl(base_url));
        }
        Ok(Self {
            base_url,
            user: user.into(),
            password: password.into(),
        })
    }

    /// Parses a credentials document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for invalid TOML or missing values.
    pub fn from_toml_str(raw: &str, overrides: &Overrides) -> Result<Self, ConfigError> {
        let file: CredentialsFile = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            source,
        })?;
        Self::resolve(file, overrides)
    }

    /// Loads credentials from `path` and applies `overrides`.
    ///
    /// A missing file is tolerated when the overrides supply every value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable or incomplete.
    pub fn load(path: &Path, overrides: &Overrides) -> Result<Self, ConfigError> {
        let file = match std::fs::read_to_string(path) {
            Ok(raw) => toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && overrides.is_complete() => {
                CredentialsFile::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::resolve(file, overrides)
    }

    fn resolve(file: CredentialsFile, overrides: &Overrides) -> Result<Self, ConfigError> {
        let pick = |over: &Option<String>, from_file: Option<String>, key: &'static str| {
            over.clone()
                .or(from_file)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let base_url = pick(&overrides.base_url, file.base_url, "base_url")?;
        let user = pick(&overrides.user, file.user, "user")?;
        let password = pick(&overrides.password, file.password, "password")?;
        Self::new(base_url, user, password)
    }
}

impl Overrides {
    fn is_complete(&self) -> bool {
        self.base_url.is_some() && self.user.is_some() && self.password.is_some()
    }
}
