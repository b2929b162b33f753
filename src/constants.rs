//! Namespaces, endpoint paths and defaults shared across the crate.

/// Namespace of module (record) documents.
pub const MODULE_NS: &str = "http://www.zetcom.com/ria/ws/module";

/// Namespace of search documents.
pub const SEARCH_NS: &str = "http://www.zetcom.com/ria/ws/module/search";

/// Path prefix of all module resources below the configured base URL.
pub const MODULE_PATH: &str = "/ria-ws/application/module";

/// Default number of target items per chunk.
pub const DEFAULT_CHUNK_SIZE: u32 = 1000;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (10 minutes; large searches are slow server-side).
pub const READ_TIMEOUT_SECS: u64 = 600;

/// Largest response body excerpt kept in error messages.
pub const MAX_ERROR_BODY_CHARS: usize = 300;
