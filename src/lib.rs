//! mpapi: client toolkit for a museum collection REST API
//!
//! The library talks to the vendor's XML web service ("RIA"): it builds
//! search requests, pages through large selections, joins and cleans the
//! returned module documents, caches them on disk and patches single records
//! before they are uploaded again. A small job language chains these steps.
//!
//! # Architecture
//!
//! - [`search`] - search request builder
//! - [`client`] - low-level HTTP client ([`MpApi`])
//! - [`sar`] - typed queries on top of the client
//! - [`chunky`] - chunked retrieval of large selections
//! - [`module`] - response documents: join, clean, zip
//! - [`record`] - single-record patcher
//! - [`dsl`] / [`mink`] - job files and the job runner
//! - [`touch`] / [`replace`] - maintenance tasks that write back to the server
//! - [`validate`] - structural checks of module and search documents

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod chunky;
pub mod client;
pub mod config;
pub mod constants;
pub mod dsl;
pub mod mink;
pub mod module;
pub mod record;
pub mod replace;
pub mod sar;
pub mod search;
pub mod touch;
pub mod validate;
pub mod xml;

mod user_agent;

// Re-export commonly used types
pub use chunky::{ChunkCursor, ChunkRequest, Chunky};
pub use client::{ApiError, MpApi};
pub use config::{ConfigError, Credentials, Overrides};
pub use dsl::{Command, DslError, Job, JobFile, parse_jobs};
pub use mink::{JobReport, Mink, MinkError, ProjectLayout};
pub use module::Module;
pub use record::{Record, RecordError};
pub use replace::{Action, DigiP, ReplacePlugin, ReplaceReport, Replacer};
pub use sar::{QueryType, Sar};
pub use search::{Operator, Search, SearchError};
pub use touch::{TouchError, TouchReport};
pub use validate::{DocumentKind, ValidationError, validate_module, validate_search};
pub use xml::XmlError;
