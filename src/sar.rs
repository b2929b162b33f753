//! Search-and-retrieve: typed queries on top of [`MpApi`].
//!
//! A query type names the selection a job works on (an object group, an
//! exhibition, a location...). [`Sar`] turns a type, an id and a requested
//! module into a search so that objects, their assets and their persons can
//! be fetched with the same selection.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::client::{ApiError, MpApi};
use crate::module::Module;
use crate::search::{Operator, Search};

/// Field of the item's modification timestamp.
pub const LAST_MODIFIED: &str = "__lastModified";

/// Selection kinds understood by jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    /// Objects carrying a publication approval entry.
    Approval,
    /// Objects registered for an exhibition.
    Exhibit,
    /// Objects of an object group.
    Group,
    /// Objects at a current location.
    Location,
    /// A query saved on the server.
    SavedQuery,
}

impl QueryType {
    /// Name used in job files and file names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approval => "approval",
            Self::Exhibit => "exhibit",
            Self::Group => "group",
            Self::Location => "loc",
            Self::SavedQuery => "query",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The string is not a known query type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown query type '{0}' (expected approval, exhibit, group, loc or query)")]
pub struct UnknownQueryType(pub String);

impl FromStr for QueryType {
    type Err = UnknownQueryType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approval" => Ok(Self::Approval),
            "exhibit" => Ok(Self::Exhibit),
            "group" => Ok(Self::Group),
            "loc" => Ok(Self::Location),
            "query" => Ok(Self::SavedQuery),
            other => Err(UnknownQueryType(other.to_string())),
        }
    }
}

// Path from an item of `module` to the object field the selection matches on.
fn selection_field(query_type: QueryType, module: &str) -> Option<String> {
    let object_field = match query_type {
        QueryType::Approval => "ObjPublicationGrp.TypeVoc",
        QueryType::Exhibit => "ObjRegistrarRef.RegExhibitionRef.__id",
        QueryType::Group => "ObjObjectGroupsRef.__id",
        QueryType::Location => "ObjCurrentLocationVoc",
        QueryType::SavedQuery => return None,
    };
    match (query_type, module) {
        (_, "Object") => Some(object_field.to_string()),
        (_, "Multimedia") => Some(format!("MulObjectRef.{object_field}")),
        (_, "Person") => Some(format!("PerObjectRef.{object_field}")),
        (QueryType::Exhibit, "Exhibition") => Some("__id".to_string()),
        (QueryType::Exhibit, "Registrar") => Some("RegExhibitionRef.__id".to_string()),
        _ => None,
    }
}

/// Typed queries against one API instance.
#[derive(Debug, Clone)]
pub struct Sar {
    api: MpApi,
}

impl Sar {
    /// Wraps a client.
    #[must_use]
    pub fn new(api: MpApi) -> Self {
        Self { api }
    }

    /// The underlying client.
    #[must_use]
    pub fn api(&self) -> &MpApi {
        &self.api
    }

    /// Builds the search for items of `module` in selection `query_type`/`id`.
    ///
    /// With `since`, only items modified after that timestamp match.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::UnsupportedQuery`] for saved queries (they are run
    /// server-side) and for modules the selection cannot reach.
    pub fn build_query(
        query_type: QueryType,
        id: &str,
        module: &str,
        since: Option<&str>,
    ) -> Result<Search, ApiError> {
        let field = selection_field(query_type, module)
            .ok_or_else(|| ApiError::unsupported(query_type.as_str(), module))?;
        let mut query = Search::new(module);
        if let Some(since) = since {
            query.and();
            query.add_criterion(Operator::EqualsField, &field, id);
            query.add_criterion(Operator::Greater, LAST_MODIFIED, since);
        } else {
            query.add_criterion(Operator::EqualsField, &field, id);
        }
        Ok(query)
    }

    /// Fetches all items of `module` in a selection.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] for unsupported combinations and request failures.
    #[instrument(skip(self))]
    pub async fn get_by_type(
        &self,
        query_type: QueryType,
        id: &str,
        module: &str,
        since: Option<&str>,
    ) -> Result<Module, ApiError> {
        self.get_page(query_type, id, module, since, -1, 0).await
    }

    /// Fetches one page (`limit` items from `offset`) of a selection.
    ///
    /// # Errors
    ///
    /// Same as [`Sar::get_by_type`].
    pub async fn get_page(
        &self,
        query_type: QueryType,
        id: &str,
        module: &str,
        since: Option<&str>,
        limit: i64,
        offset: u64,
    ) -> Result<Module, ApiError> {
        if query_type == QueryType::SavedQuery {
            if let Some(since) = since {
                warn!(id, since, "saved queries are run unfiltered, since ignored");
            }
            return self.api.run_saved_query(id, module, limit, offset).await;
        }
        let mut query = Self::build_query(query_type, id, module, since)?;
        query.set_limit(limit).set_offset(offset);
        self.api.search(&query).await
    }

    /// Items of `module` linked to objects with approval entry `id`.
    ///
    /// # Errors
    ///
    /// Same as [`Sar::get_by_type`].
    pub async fn get_by_approval_grp(
        &self,
        id: &str,
        module: &str,
        since: Option<&str>,
    ) -> Result<Module, ApiError> {
        self.get_by_type(QueryType::Approval, id, module, since)
            .await
    }

    /// Items of `module` linked to exhibition `id`.
    ///
    /// # Errors
    ///
    /// Same as [`Sar::get_by_type`].
    pub async fn get_by_exhibit(
        &self,
        id: &str,
        module: &str,
        since: Option<&str>,
    ) -> Result<Module, ApiError> {
        self.get_by_type(QueryType::Exhibit, id, module, since)
            .await
    }

    /// Items of `module` linked to object group `id`.
    ///
    /// # Errors
    ///
    /// Same as [`Sar::get_by_type`].
    pub async fn get_by_group(
        &self,
        id: &str,
        module: &str,
        since: Option<&str>,
    ) -> Result<Module, ApiError> {
        self.get_by_type(QueryType::Group, id, module, since).await
    }

    /// Items of `module` linked to objects at location `id`.
    ///
    /// # Errors
    ///
    /// Same as [`Sar::get_by_type`].
    pub async fn get_by_location(
        &self,
        id: &str,
        module: &str,
        since: Option<&str>,
    ) -> Result<Module, ApiError> {
        self.get_by_type(QueryType::Location, id, module, since)
            .await
    }

    /// Fetches a single item.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on request failures.
    pub async fn get_item(&self, module: &str, id: &str) -> Result<Module, ApiError> {
        self.api.get_item(module, id).await
    }

    /// Fetches the items of `module` with the given ids in one search.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on request failures.
    pub async fn get_by_ids(&self, module: &str, ids: &[String]) -> Result<Module, ApiError> {
        let mut query = Search::new(module);
        match ids {
            [] => return Ok(Module::new()),
            [id] => {
                query.add_criterion(Operator::EqualsField, "__id", id.as_str());
            }
            _ => {
                query.or();
                for id in ids {
                    query.add_criterion(Operator::EqualsField, "__id", id.as_str());
                }
            }
        }
        self.api.search(&query).await
    }

    /// Downloads attachments of the flagged Multimedia items in `data`.
    ///
    /// Files are saved as `{dir}/{mulId}{ext}`, where the extension comes from
    /// the recorded original file name. Existing files are not downloaded
    /// again. With `since`, items last modified before that timestamp are
    /// skipped. Returns the paths of all considered attachments.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the directory cannot be created or a download fails.
    #[instrument(skip(self, data), fields(dir = %dir.display()))]
    pub async fn save_attachments(
        &self,
        data: &Module,
        dir: &Path,
        since: Option<&str>,
    ) -> Result<Vec<PathBuf>, ApiError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ApiError::io(dir, e))?;

        let mut expected = Vec::new();
        let mut downloaded = 0usize;
        for candidate in data.attachment_candidates() {
            if let (Some(since), Some(modified)) = (since, candidate.last_modified.as_deref())
                && modified < since
            {
                debug!(id = %candidate.id, modified, "attachment unchanged since");
                continue;
            }
            let path = dir.join(candidate.file_name());
            if path.exists() {
                debug!(path = %path.display(), "attachment exists already");
            } else {
                self.api
                    .save_attachment("Multimedia", &candidate.id, &path)
                    .await?;
                downloaded += 1;
            }
            expected.push(path);
        }
        info!(considered = expected.len(), downloaded, "attachments saved");
        Ok(expected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_type_names_roundtrip() {
        for name in ["approval", "exhibit", "group", "loc", "query"] {
            assert_eq!(name.parse::<QueryType>().unwrap().as_str(), name);
        }
        assert!("location".parse::<QueryType>().is_err());
    }

    #[test]
    fn test_group_query_for_multimedia_follows_object_reference() {
        let query = Sar::build_query(QueryType::Group, "162397", "Multimedia", None).unwrap();
        let xml = query.to_xml_string().unwrap();
        assert!(
            xml.contains(r#"fieldPath="MulObjectRef.ObjObjectGroupsRef.__id""#),
            "{xml}"
        );
        assert!(xml.contains(r#"operand="162397""#), "{xml}");
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_since_adds_last_modified_under_and() {
        let query =
            Sar::build_query(QueryType::Location, "4220580", "Object", Some("2021-01-01")).unwrap();
        let xml = query.to_xml_string().unwrap();
        assert!(xml.contains("<and>"), "{xml}");
        assert!(
            xml.contains(r#"<greater fieldPath="__lastModified" operand="2021-01-01" />"#)
                || xml.contains(r#"<greater fieldPath="__lastModified" operand="2021-01-01"/>"#),
            "{xml}"
        );
        assert!(query.validate().is_ok());
    }

    #[test]
    fn test_exhibit_reaches_exhibition_and_registrar() {
        assert!(Sar::build_query(QueryType::Exhibit, "20222", "Exhibition", None).is_ok());
        assert!(Sar::build_query(QueryType::Exhibit, "20222", "Registrar", None).is_ok());
        let err = Sar::build_query(QueryType::Group, "1", "Registrar", None).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedQuery { .. }), "got {err:?}");
    }

    #[test]
    fn test_saved_query_is_not_built_locally() {
        assert!(Sar::build_query(QueryType::SavedQuery, "1", "Object", None).is_err());
    }
}
