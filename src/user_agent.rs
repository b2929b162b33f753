//! User-Agent string for requests against the collection API.

/// Tool label sent with every request.
const TOOL_LABEL: &str = "collection-client";

/// Default User-Agent for API requests (identifies the tool and version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("mpapi/{version} ({TOOL_LABEL})")
}
