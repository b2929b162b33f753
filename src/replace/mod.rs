//! Search-and-act plugins.
//!
//! A [`ReplacePlugin`] selects records with a search and derives one
//! [`Action`] per matching item. [`Replacer`] runs the search, collects the
//! actions and only sends them to the server when acting is enabled, so every
//! plugin can be previewed first.

mod digip;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};
use xmltree::Element;

use crate::client::{ApiError, MpApi};
use crate::search::Search;
use crate::xml::{XmlError, attr};

pub use digip::DigiP;

/// Errors raised while running a plugin.
#[derive(Debug, Error)]
pub enum ReplaceError {
    /// A request failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// An action document could not be built.
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// No plugin has the requested name.
    #[error("unknown plugin '{0}' (available: digip)")]
    UnknownPlugin(String),
}

/// A change to apply to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Add an entry to a repeatable group.
    CreateRepeatableGroup {
        /// Module of the record.
        module: String,
        /// Record id.
        id: String,
        /// Repeatable group name.
        group: String,
        /// Request body.
        xml: String,
        /// Log line after success.
        success: String,
    },
    /// Replace fields of the record.
    UpdateItem {
        /// Module of the record.
        module: String,
        /// Record id.
        id: String,
        /// Request body.
        xml: String,
        /// Log line after success.
        success: String,
    },
}

impl Action {
    /// Id of the changed record.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::CreateRepeatableGroup { id, .. } | Self::UpdateItem { id, .. } => id,
        }
    }

    /// Sends the change.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the server rejects it.
    pub async fn apply(&self, api: &MpApi) -> Result<(), ApiError> {
        match self {
            Self::CreateRepeatableGroup {
                module,
                id,
                group,
                xml,
                success,
            } => {
                api.create_repeatable_group(module, id, group, xml.clone())
                    .await?;
                info!("{success}");
            }
            Self::UpdateItem {
                module,
                id,
                xml,
                success,
            } => {
                api.update_item(module, id, xml.clone()).await?;
                info!("{success}");
            }
        }
        Ok(())
    }
}

/// Selects records and derives changes for them.
pub trait ReplacePlugin {
    /// Name used on the command line.
    fn name(&self) -> &'static str;

    /// Module of the selected records.
    fn module(&self) -> &'static str;

    /// Search selecting the records; `limit = -1` for all.
    fn search(&self, limit: i64) -> Search;

    /// Change for one selected item, if it needs any.
    ///
    /// # Errors
    ///
    /// Returns [`ReplaceError`] if the change cannot be expressed.
    fn on_item(&self, item: &Element, user: &str) -> Result<Option<Action>, ReplaceError>;
}

/// Looks up a built-in plugin by name.
///
/// # Errors
///
/// Returns [`ReplaceError::UnknownPlugin`] for unknown names.
pub fn plugin_by_name(name: &str) -> Result<Box<dyn ReplacePlugin + Send + Sync>, ReplaceError> {
    match name.to_ascii_lowercase().as_str() {
        "digip" => Ok(Box::new(DigiP::default())),
        _ => Err(ReplaceError::UnknownPlugin(name.to_string())),
    }
}

/// Outcome of a plugin run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceReport {
    /// Plugin name.
    pub plugin: String,
    /// Items returned by the search.
    pub items: usize,
    /// Items that need a change.
    pub actions: usize,
    /// Changes sent to the server.
    pub applied: usize,
}

/// Runs plugins against one API instance.
#[derive(Debug, Clone)]
pub struct Replacer {
    api: MpApi,
    act: bool,
}

impl Replacer {
    /// With `act == false` actions are only counted and logged.
    #[must_use]
    pub fn new(api: MpApi, act: bool) -> Self {
        Self { api, act }
    }

    /// Collects the actions of `plugin` for its search results.
    ///
    /// # Errors
    ///
    /// Returns [`ReplaceError`] if the search fails or an action cannot be built.
    pub async fn plan(
        &self,
        plugin: &dyn ReplacePlugin,
        limit: i64,
    ) -> Result<(usize, Vec<Action>), ReplaceError> {
        let query = plugin.search(limit);
        let found = self.api.search(&query).await?;
        let user = self.api.user();
        let mut actions = Vec::new();
        for item in found.items(plugin.module()) {
            if let Some(action) = plugin.on_item(item, user)? {
                actions.push(action);
            } else {
                info!(id = attr(item, "id").unwrap_or_default(), "no change needed");
            }
        }
        Ok((found.actual_size(plugin.module()), actions))
    }

    /// Runs `plugin` and applies its actions when acting.
    ///
    /// # Errors
    ///
    /// Returns the first [`ReplaceError`].
    #[instrument(skip(self, plugin), fields(plugin = plugin.name(), act = self.act))]
    pub async fn run(
        &self,
        plugin: &dyn ReplacePlugin,
        limit: i64,
    ) -> Result<ReplaceReport, ReplaceError> {
        let (items, actions) = self.plan(plugin, limit).await?;
        let mut report = ReplaceReport {
            plugin: plugin.name().to_string(),
            items,
            actions: actions.len(),
            applied: 0,
        };
        for action in &actions {
            if self.act {
                action.apply(&self.api).await?;
                report.applied += 1;
            } else {
                info!(id = action.id(), "would change (not acting)");
            }
        }
        info!(
            items = report.items,
            actions = report.actions,
            applied = report.applied,
            "plugin done"
        );
        Ok(report)
    }
}
