//! Low-level HTTP access to the module endpoints.
//!
//! [`MpApi`] maps one method to one endpoint below
//! `{base_url}/ria-ws/application/module`. Requests use basic auth and XML
//! bodies; responses are parsed into [`Module`] documents. Higher-level
//! queries live in [`crate::sar`].

mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::Credentials;
use crate::constants::{CONNECT_TIMEOUT_SECS, MODULE_PATH, READ_TIMEOUT_SECS};
use crate::module::Module;
use crate::search::Search;
use crate::user_agent;

pub use error::ApiError;

const XML_CONTENT_TYPE: &str = "application/xml";
const OCTET_STREAM: &str = "application/octet-stream";

/// Client for one API instance.
///
/// Create once and reuse; the underlying connection pool is shared by clones.
#[derive(Debug, Clone)]
pub struct MpApi {
    client: Client,
    module_url: String,
    user: String,
    password: String,
}

impl MpApi {
    /// Creates a client with the default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if the base URL is unusable and
    /// [`ApiError::Network`] if the HTTP client cannot be built.
    pub fn new(credentials: &Credentials) -> Result<Self, ApiError> {
        Self::with_timeouts(credentials, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Same as [`MpApi::new`].
    #[instrument(level = "debug", skip(credentials), fields(base_url = %credentials.base_url))]
    pub fn with_timeouts(
        credentials: &Credentials,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, ApiError> {
        let base = credentials.base_url.trim_end_matches('/');
        let module_url = format!("{base}{MODULE_PATH}");
        let parsed =
            Url::parse(&module_url).map_err(|_| ApiError::invalid_url(module_url.clone()))?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::invalid_url(module_url));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(XML_CONTENT_TYPE));
        headers.insert(ACCEPT, HeaderValue::from_static(XML_CONTENT_TYPE));
        let agent = HeaderValue::from_str(&user_agent::default_user_agent())
            .map_err(|_| ApiError::invalid_url(module_url.clone()))?;
        headers.insert(USER_AGENT, agent);

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .build()
            .map_err(|e| ApiError::network(module_url.clone(), e))?;

        debug!(module_url = %module_url, "api client ready");
        Ok(Self {
            client,
            module_url,
            user: credentials.user.clone(),
            password: credentials.password.clone(),
        })
    }

    /// Login name used for requests; recorded in approval entries.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    fn endpoint(&self, segments: &[&str]) -> String {
        let mut url = self.module_url.clone();
        for segment in segments {
            url.push('/');
            url.push_str(segment);
        }
        url
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.user, Some(&self.password))
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<reqwest::Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(url, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let code = status.as_u16();
        if matches!(code, 401 | 403) {
            return Err(ApiError::auth_required(url, code));
        }
        let body = response.text().await.unwrap_or_default();
        warn!(url, status = code, "request failed");
        Err(ApiError::http_status(url, code, &body))
    }

    async fn send_for_module(
        &self,
        request: RequestBuilder,
        url: &str,
    ) -> Result<Module, ApiError> {
        let response = self.send(request, url).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::from_reqwest(url, e))?;
        Ok(Module::from_xml(&body)?)
    }

    /// Fetches a single item.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] for transport failures, error responses and
    /// malformed bodies.
    #[instrument(skip(self))]
    pub async fn get_item(&self, module: &str, id: &str) -> Result<Module, ApiError> {
        let url = self.endpoint(&[module, id]);
        self.send_for_module(self.request(Method::GET, &url), &url)
            .await
    }

    /// Runs an ad-hoc search.
    ///
    /// The document is validated locally before it is sent.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidQuery`] without contacting the server when
    /// the search is malformed.
    #[instrument(skip(self, query), fields(module = %query.module(), offset = query.offset()))]
    pub async fn search(&self, query: &Search) -> Result<Module, ApiError> {
        query.validate()?;
        let body = query.to_xml_string()?;
        let url = self.endpoint(&[query.module(), "search", ""]);
        let result = self
            .send_for_module(self.request(Method::POST, &url).body(body), &url)
            .await?;
        debug!(items = result.len(), "search returned");
        Ok(result)
    }

    /// Runs the saved query `id`, returning items of module `target`.
    ///
    /// # Errors
    ///
    /// Same as [`MpApi::search`].
    #[instrument(skip(self))]
    pub async fn run_saved_query(
        &self,
        id: &str,
        target: &str,
        limit: i64,
        offset: u64,
    ) -> Result<Module, ApiError> {
        let page = Search::saved_query_page(target, limit, offset);
        page.validate()?;
        let body = page.to_xml_string()?;
        let url = self.endpoint(&[target, "search", "savedQuery", id]);
        self.send_for_module(self.request(Method::POST, &url).body(body), &url)
            .await
    }

    /// Replaces fields of an item with the ones in `xml`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the server does not accept the update.
    #[instrument(skip(self, xml))]
    pub async fn update_item(&self, module: &str, id: &str, xml: String) -> Result<(), ApiError> {
        let url = self.endpoint(&[module, id]);
        self.send(self.request(Method::PUT, &url).body(xml), &url)
            .await?;
        info!(module, id, "updated item");
        Ok(())
    }

    /// Adds a repeatable group entry to an item.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the server does not accept the entry.
    #[instrument(skip(self, xml))]
    pub async fn create_repeatable_group(
        &self,
        module: &str,
        id: &str,
        group: &str,
        xml: String,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&[module, id, group]);
        self.send(self.request(Method::POST, &url).body(xml), &url)
            .await?;
        info!(module, id, group, "created repeatable group entry");
        Ok(())
    }

    /// Streams the attachment of an item to `path`.
    ///
    /// A partially written file is removed when the transfer fails.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] for request or file system failures.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn save_attachment(
        &self,
        module: &str,
        id: &str,
        path: &Path,
    ) -> Result<PathBuf, ApiError> {
        let url = self.endpoint(&[module, id, "attachment"]);
        let request = self
            .request(Method::GET, &url)
            .header(ACCEPT, OCTET_STREAM);
        let response = self.send(request, &url).await?;

        let file = File::create(path)
            .await
            .map_err(|e| ApiError::io(path, e))?;
        let result = stream_to_file(file, response, &url, path).await;
        match result {
            Ok(bytes) => {
                info!(bytes, "saved attachment");
                Ok(path.to_path_buf())
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(path).await;
                Err(e)
            }
        }
    }
}

async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    path: &Path,
) -> Result<u64, ApiError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ApiError::from_reqwest(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| ApiError::io(path, e))?;
        bytes_written += chunk.len() as u64;
    }
    writer.flush().await.map_err(|e| ApiError::io(path, e))?;
    Ok(bytes_written)
}
