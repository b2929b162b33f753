//! Chunked retrieval of large selections.
//!
//! A selection of a few hundred thousand objects does not fit in one
//! response. [`Chunky`] pages through the target items `chunk_size` at a time
//! and completes every page with the Multimedia and Person items the page
//! references, so each chunk can be published on its own.

use tracing::{debug, info, instrument};

use crate::client::ApiError;
use crate::constants::DEFAULT_CHUNK_SIZE;
use crate::module::Module;
use crate::sar::{QueryType, Sar};
use crate::xml::{self, attr, children};

/// Modules joined into every Object chunk.
pub const RELATED_MODULES: [&str; 2] = ["Multimedia", "Person"];

/// What to page through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    /// Selection kind.
    pub query_type: QueryType,
    /// Id of the selection (group id, location id, saved query id...).
    pub id: String,
    /// Module of the paged items.
    pub target: String,
    /// Only items modified after this timestamp.
    pub since: Option<String>,
    /// Offset of the first item to fetch.
    pub offset: u64,
}

impl ChunkRequest {
    /// Pages Object items of a selection from the start.
    #[must_use]
    pub fn new(query_type: QueryType, id: impl Into<String>) -> Self {
        Self {
            query_type,
            id: id.into(),
            target: "Object".to_string(),
            since: None,
            offset: 0,
        }
    }

    /// Pages items of `target` instead of objects.
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Restricts to items modified after `since`.
    #[must_use]
    pub fn since(mut self, since: Option<String>) -> Self {
        self.since = since;
        self
    }

    /// Starts at `offset` (used to resume).
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}

/// Paged retrieval with a fixed chunk size.
#[derive(Debug, Clone)]
pub struct Chunky {
    sar: Sar,
    chunk_size: u32,
}

impl Chunky {
    /// Creates a pager; a zero chunk size falls back to the default.
    #[must_use]
    pub fn new(sar: Sar, chunk_size: u32) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self { sar, chunk_size }
    }

    /// Number of target items per chunk.
    #[must_use]
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// The query layer.
    #[must_use]
    pub fn sar(&self) -> &Sar {
        &self.sar
    }

    /// Starts paging through `request`.
    #[must_use]
    pub fn get_by_type(&self, request: ChunkRequest) -> ChunkCursor<'_> {
        ChunkCursor {
            chunky: self,
            offset: request.offset,
            request,
            done: false,
        }
    }

    /// Fetches one page of target items at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on request failures.
    pub async fn fetch_part(&self, request: &ChunkRequest, offset: u64) -> Result<Module, ApiError> {
        self.sar
            .get_page(
                request.query_type,
                &request.id,
                &request.target,
                request.since.as_deref(),
                i64::from(self.chunk_size),
                offset,
            )
            .await
    }

    /// Fetches the items of `target` referenced from `part`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on request failures.
    #[instrument(skip(self, part))]
    pub async fn related_items(&self, part: &Module, target: &str) -> Result<Module, ApiError> {
        let ids = referenced_ids(part, target);
        debug!(count = ids.len(), "related items referenced");
        self.sar.get_by_ids(target, &ids).await
    }
}

/// Iterates the chunks of one request.
#[derive(Debug)]
pub struct ChunkCursor<'a> {
    chunky: &'a Chunky,
    request: ChunkRequest,
    offset: u64,
    done: bool,
}

impl ChunkCursor<'_> {
    /// Offset of the next page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Fetches the next chunk; `None` once a page comes back empty.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on request failures. The cursor does not advance
    /// on error, so the call can be retried.
    pub async fn next_chunk(&mut self) -> Result<Option<Module>, ApiError> {
        if self.done {
            return Ok(None);
        }
        let target = self.request.target.as_str();
        let part = self.chunky.fetch_part(&self.request, self.offset).await?;
        let found = part.actual_size(target);
        if found == 0 {
            info!(offset = self.offset, "empty page, no more chunks");
            self.done = true;
            return Ok(None);
        }

        let mut chunk = part.clone();
        if target == "Object" {
            for module in RELATED_MODULES {
                chunk += self.chunky.related_items(&part, module).await?;
            }
        }
        info!(
            offset = self.offset,
            items = found,
            total = chunk.len(),
            "fetched chunk"
        );
        self.offset += u64::from(self.chunky.chunk_size);
        Ok(Some(chunk))
    }
}

/// Distinct ids of `target` items referenced by `moduleReference` elements in `part`.
#[must_use]
pub fn referenced_ids(part: &Module, target: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    xml::walk(part.root(), &mut |el| {
        if el.name != "moduleReference" || attr(el, "targetModule") != Some(target) {
            return;
        }
        for reference in children(el, "moduleReferenceItem") {
            if let Some(id) = attr(reference, "moduleItemId")
                && !ids.iter().any(|known| known == id)
            {
                ids.push(id.to_string());
            }
        }
    });
    ids
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const OBJECTS: &str = r#"<application xmlns="http://www.zetcom.com/ria/ws/module"><modules>
      <module name="Object" totalSize="2">
        <moduleItem id="1">
          <moduleReference name="ObjMultimediaRef" targetModule="Multimedia" multiplicity="N:M" size="2">
            <moduleReferenceItem moduleItemId="468698" seqNo="0"/>
            <moduleReferenceItem moduleItemId="517501" seqNo="1"/>
          </moduleReference>
          <moduleReference name="ObjPerAssociationRef" targetModule="Person" size="1">
            <moduleReferenceItem moduleItemId="77" seqNo="0"/>
          </moduleReference>
        </moduleItem>
        <moduleItem id="2">
          <moduleReference name="ObjMultimediaRef" targetModule="Multimedia" size="1">
            <moduleReferenceItem moduleItemId="468698" seqNo="0"/>
          </moduleReference>
        </moduleItem>
      </module></modules></application>"#;

    #[test]
    fn test_referenced_ids_are_distinct_per_target() {
        let part = Module::from_xml(OBJECTS).unwrap();
        assert_eq!(referenced_ids(&part, "Multimedia"), vec!["468698", "517501"]);
        assert_eq!(referenced_ids(&part, "Person"), vec!["77"]);
        assert!(referenced_ids(&part, "Exhibition").is_empty());
    }

    #[test]
    fn test_chunk_request_builder() {
        let request = ChunkRequest::new(QueryType::SavedQuery, "4711")
            .target("Multimedia")
            .since(Some("2021-01-01".to_string()))
            .offset(200);
        assert_eq!(request.target, "Multimedia");
        assert_eq!(request.offset, 200);
        assert_eq!(request.since.as_deref(), Some("2021-01-01"));
    }
}
