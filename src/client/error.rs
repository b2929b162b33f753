//! Failures of requests against the collection web service.

use std::path::PathBuf;

use thiserror::Error;

use crate::constants::MAX_ERROR_BODY_CHARS;
use crate::validate::ValidationError;
use crate::xml::XmlError;

/// A request to the module endpoints did not produce a usable answer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server could not be reached or the connection broke off.
    #[error("network error requesting {url}: {source}")]
    Network {
        /// Endpoint of the failed request.
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// No complete answer within the configured connect or read timeout.
    #[error("timeout requesting {url}")]
    Timeout {
        /// Endpoint of the request.
        url: String,
    },

    /// The service answered with an error status other than 401/403.
    #[error("HTTP {status} requesting {url}: {body}")]
    HttpStatus {
        /// Endpoint of the request.
        url: String,
        /// Status code of the answer.
        status: u16,
        /// Leading part of the error page, usually the service's own message.
        body: String,
    },

    /// The service rejected the basic-auth login (401) or the user's rights (403).
    #[error("[AUTH] authentication failed (HTTP {status}) requesting {url}\n  Suggestion: check user and password in the credentials file")]
    AuthRequired {
        /// Endpoint of the request.
        url: String,
        /// 401 or 403.
        status: u16,
    },

    /// The configured base URL does not yield an http(s) module endpoint.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// Module endpoint built from the base URL.
        url: String,
    },

    /// An attachment could not be stored.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// Target file or directory.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The answer is not a parsable module document.
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// A search document was rejected locally and never sent.
    #[error(transparent)]
    InvalidQuery(#[from] ValidationError),

    /// The query type has no meaning for the requested module.
    #[error("query type '{query_type}' is not supported for module {module}")]
    UnsupportedQuery {
        /// Query type name.
        query_type: String,
        /// Requested module.
        module: String,
    },
}

impl ApiError {
    /// Wraps a transport failure of a request to `url`.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Classifies a reqwest failure: timeouts get their own variant.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, source)
        }
    }

    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Error answer; the body is cut to [`MAX_ERROR_BODY_CHARS`].
    pub fn http_status(url: impl Into<String>, status: u16, body: &str) -> Self {
        let mut excerpt: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
        if body.trim().chars().count() > MAX_ERROR_BODY_CHARS {
            excerpt.push_str("...");
        }
        Self::HttpStatus {
            url: url.into(),
            status,
            body: excerpt,
        }
    }

    pub fn auth_required(url: impl Into<String>, status: u16) -> Self {
        Self::AuthRequired {
            url: url.into(),
            status,
        }
    }

    /// Failed write of an attachment at `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Query type without a selection field for `module`.
    pub fn unsupported(query_type: impl Into<String>, module: impl Into<String>) -> Self {
        Self::UnsupportedQuery {
            query_type: query_type.into(),
            module: module.into(),
        }
    }

    /// HTTP status of the failed response, if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } | Self::AuthRequired { status, .. } => Some(*status),
            _ => None,
        }
    }
}
