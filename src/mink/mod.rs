//! Job runner: executes the commands of a job file against the API.
//!
//! Every command caches what it fetched in the run's project directory and
//! reuses the cache on the next run of the same day, so an aborted job can
//! simply be started again.

mod paths;

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::chunky::{ChunkRequest, Chunky};
use crate::client::ApiError;
use crate::dsl::{CHUNK_LABEL, Command, DslError, JobFile};
use crate::module::Module;
use crate::sar::{QueryType, Sar};
use crate::validate::ValidationError;
use crate::xml::XmlError;

pub use paths::ProjectLayout;

/// Modules fetched for every getPack.
const PACK_MODULES: [&str; 3] = ["Person", "Multimedia", "Object"];

/// Additional modules fetched for exhibition selections.
const EXHIBIT_MODULES: [&str; 2] = ["Exhibition", "Registrar"];

/// Errors raised while running a job.
#[derive(Debug, Error)]
pub enum MinkError {
    /// The job file is invalid.
    #[error(transparent)]
    Dsl(#[from] DslError),

    /// A request failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A cached or fetched document could not be read or written.
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// A joined document failed validation.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// Creating directories or listing files failed.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The requested job is not defined.
    #[error("job '{job}' is not defined (known jobs: {known})")]
    UnknownJob {
        /// Requested job.
        job: String,
        /// Comma-separated defined jobs.
        known: String,
    },

    /// A command depends on data an earlier command should have fetched.
    #[error("missing input {path}; run the fetching command first")]
    MissingInput {
        /// The expected file.
        path: PathBuf,
    },
}

impl MinkError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Outcome of a job run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    /// Jobs run, including the ones started with `all`.
    pub jobs: Vec<String>,
    /// Commands executed.
    pub steps: usize,
    /// Files written (cache hits are not listed).
    pub written: Vec<PathBuf>,
}

/// Runs jobs of one job file.
#[derive(Debug)]
pub struct Mink {
    jobs: JobFile,
    base_dir: PathBuf,
    chunky: Chunky,
    date: NaiveDate,
}

impl Mink {
    /// Creates a runner writing below `base_dir`, dated today.
    #[must_use]
    pub fn new(jobs: JobFile, base_dir: impl Into<PathBuf>, chunky: Chunky) -> Self {
        Self {
            jobs,
            base_dir: base_dir.into(),
            chunky,
            date: Local::now().date_naive(),
        }
    }

    /// Uses `date` for project directory names instead of today.
    #[must_use]
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Layout of a job's run.
    #[must_use]
    pub fn layout(&self, job: &str) -> ProjectLayout {
        ProjectLayout::new(&self.base_dir, job, self.date)
    }

    fn sar(&self) -> &Sar {
        self.chunky.sar()
    }

    /// Runs the job `name`.
    ///
    /// # Errors
    ///
    /// Returns [`MinkError::UnknownJob`] for undefined jobs and the first
    /// failing command's error otherwise.
    pub async fn run_job(&self, name: &str) -> Result<JobReport, MinkError> {
        let mut report = JobReport::default();
        self.run_nested(name, &mut report).await?;
        Ok(report)
    }

    // Job files reject `all` cycles when parsed, so the recursion terminates.
    async fn run_nested(&self, name: &str, report: &mut JobReport) -> Result<(), MinkError> {
        let Some(job) = self.jobs.job(name) else {
            return Err(MinkError::UnknownJob {
                job: name.to_string(),
                known: self.jobs.names().join(", "),
            });
        };

        let layout = self.layout(name);
        let project_dir = layout.project_dir();
        std::fs::create_dir_all(&project_dir).map_err(|e| MinkError::io(&project_dir, e))?;
        info!(job = name, project_dir = %project_dir.display(), "starting job");
        report.jobs.push(name.to_string());

        for step in &job.steps {
            info!(job = name, line = step.line, command = %step.command, "running command");
            match &step.command {
                Command::All { job } => {
                    Box::pin(self.run_nested(job, report)).await?;
                }
                command => {
                    let written = self.run_command(&layout, command).await?;
                    report.written.extend(written);
                }
            }
            report.steps += 1;
        }
        info!(job = name, "job done");
        Ok(())
    }

    async fn run_command(
        &self,
        layout: &ProjectLayout,
        command: &Command,
    ) -> Result<Vec<PathBuf>, MinkError> {
        match command {
            Command::Attachments {
                query_type,
                id,
                label,
                since,
            } => {
                self.attachments(layout, *query_type, id, label, since.as_deref())
                    .await
            }
            Command::Chunk {
                query_type,
                id,
                target,
                since,
            } => {
                self.chunk(layout, *query_type, id, target, since.clone())
                    .await
            }
            Command::GetItem { module, id } => {
                let (_, written) = self.get_item(layout, module, id).await?;
                Ok(written.into_iter().collect())
            }
            Command::GetPack {
                query_type,
                id,
                label,
                since,
            } => {
                self.get_pack(layout, *query_type, id, label, since.as_deref())
                    .await
            }
            Command::Pack => Ok(self.pack(layout)?.into_iter().collect()),
            Command::All { .. } => Ok(Vec::new()),
        }
    }

    /// Fetches a single item, cached as `getItem-{module}{id}.xml`.
    ///
    /// Returns the item and the path if it was written.
    ///
    /// # Errors
    ///
    /// Returns [`MinkError`] on request or file failures.
    #[instrument(skip(self, layout))]
    pub async fn get_item(
        &self,
        layout: &ProjectLayout,
        module: &str,
        id: &str,
    ) -> Result<(Module, Option<PathBuf>), MinkError> {
        let path = layout.item_path(module, id);
        if path.exists() {
            info!(path = %path.display(), "item from cache");
            return Ok((Module::from_file(&path)?, None));
        }
        let item = self.sar().get_item(module, id).await?;
        item.to_file(&path)?;
        info!(path = %path.display(), "item saved");
        Ok((item, Some(path)))
    }

    async fn get_part(
        &self,
        layout: &ProjectLayout,
        query_type: QueryType,
        id: &str,
        label: &str,
        module: &str,
        since: Option<&str>,
    ) -> Result<(Module, Option<PathBuf>), MinkError> {
        let path = layout.part_path(label, module, query_type, id);
        if path.exists() {
            info!(module, path = %path.display(), "part from cache");
            return Ok((Module::from_file(&path)?, None));
        }
        let part = self
            .sar()
            .get_by_type(query_type, id, module, since)
            .await?;
        part.to_file(&path)?;
        info!(module, items = part.len(), path = %path.display(), "part saved");
        Ok((part, Some(path)))
    }

    /// Fetches Person, Multimedia and Object items of a selection, joins,
    /// cleans and validates them into `{label}-join-{type}{id}.xml`.
    ///
    /// # Errors
    ///
    /// Returns [`MinkError`] on request, file or validation failures.
    #[instrument(skip(self, layout))]
    pub async fn get_pack(
        &self,
        layout: &ProjectLayout,
        query_type: QueryType,
        id: &str,
        label: &str,
        since: Option<&str>,
    ) -> Result<Vec<PathBuf>, MinkError> {
        let parts_dir = layout.parts_dir();
        std::fs::create_dir_all(&parts_dir).map_err(|e| MinkError::io(&parts_dir, e))?;

        let join_path = layout.join_path(label, query_type, id);
        if join_path.exists() {
            info!(path = %join_path.display(), "join from cache");
            return Ok(Vec::new());
        }

        let mut written = Vec::new();
        let mut modules: Vec<&str> = PACK_MODULES.to_vec();
        if query_type == QueryType::Exhibit {
            modules.extend(EXHIBIT_MODULES);
        }
        let mut joined = Module::new();
        for module in modules {
            let (part, path) = self
                .get_part(layout, query_type, id, label, module, since)
                .await?;
            written.extend(path);
            joined += part;
        }
        joined.clean();
        joined.validate()?;
        joined.to_file(&join_path)?;
        info!(items = joined.len(), path = %join_path.display(), "join saved");
        written.push(join_path);
        Ok(written)
    }

    /// Pages through a selection into zipped chunk files, resuming after
    /// the chunks already on disk.
    ///
    /// # Errors
    ///
    /// Returns [`MinkError`] on request, file or validation failures.
    #[instrument(skip(self, layout))]
    pub async fn chunk(
        &self,
        layout: &ProjectLayout,
        query_type: QueryType,
        id: &str,
        target: &str,
        since: Option<String>,
    ) -> Result<Vec<PathBuf>, MinkError> {
        let (mut no, offset) = layout.fast_forward(query_type, id, self.chunky.chunk_size());
        info!(no, offset, chunk_size = self.chunky.chunk_size(), "fast forwarded");

        let request = ChunkRequest::new(query_type, id)
            .target(target)
            .since(since)
            .offset(offset);
        let mut cursor = self.chunky.get_by_type(request);
        let mut written = Vec::new();
        while let Some(mut chunk) = cursor.next_chunk().await? {
            chunk.clean();
            let zip_path = chunk.to_zip(&layout.chunk_path(query_type, id, no, "xml"))?;
            info!(path = %zip_path.display(), items = chunk.len(), "chunk saved");
            chunk.validate()?;
            written.push(zip_path);
            no += 1;
        }
        Ok(written)
    }

    /// Downloads attachments of data fetched earlier by getPack (`label`)
    /// or chunk (label `chunk`).
    ///
    /// # Errors
    ///
    /// Returns [`MinkError::MissingInput`] when the getPack parts file does
    /// not exist, or the first download error.
    #[instrument(skip(self, layout))]
    pub async fn attachments(
        &self,
        layout: &ProjectLayout,
        query_type: QueryType,
        id: &str,
        label: &str,
        since: Option<&str>,
    ) -> Result<Vec<PathBuf>, MinkError> {
        let pix_dir = layout.pix_dir(label, since.is_some());
        let mut saved = Vec::new();

        if label == CHUNK_LABEL {
            let mut no = 1;
            loop {
                let zip_path = layout.chunk_path(query_type, id, no, "zip");
                if !zip_path.exists() {
                    break;
                }
                info!(path = %zip_path.display(), "attachments from chunk");
                let data = Module::from_zip(&zip_path)?;
                saved.extend(self.sar().save_attachments(&data, &pix_dir, since).await?);
                no += 1;
            }
            if no == 1 {
                warn!(query_type = %query_type, id, "no chunk files found");
            }
        } else {
            let path = layout.part_path(label, "Multimedia", query_type, id);
            if !path.exists() {
                return Err(MinkError::MissingInput { path });
            }
            let data = Module::from_file(&path)?;
            saved.extend(self.sar().save_attachments(&data, &pix_dir, since).await?);
        }
        Ok(saved)
    }

    /// Joins all join files of the project into the pack file.
    ///
    /// An existing pack file is kept.
    ///
    /// # Errors
    ///
    /// Returns [`MinkError`] on file failures.
    pub fn pack(&self, layout: &ProjectLayout) -> Result<Option<PathBuf>, MinkError> {
        let pack_path = layout.pack_path();
        if pack_path.exists() {
            info!(path = %pack_path.display(), "pack file exists, not overwriting");
            return Ok(None);
        }
        let project_dir = layout.project_dir();
        let entries =
            std::fs::read_dir(&project_dir).map_err(|e| MinkError::io(&project_dir, e))?;
        let mut inputs: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MinkError::io(&project_dir, e))?;
            let path = entry.path();
            let is_join = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains("-join-") && n.ends_with(".xml"));
            if is_join {
                inputs.push(path);
            }
        }
        inputs.sort();

        let mut packed = Module::new();
        for input in &inputs {
            info!(path = %input.display(), "packing");
            packed += Module::from_file(input)?;
        }
        packed.to_file(&pack_path)?;
        info!(files = inputs.len(), items = packed.len(), path = %pack_path.display(), "pack saved");
        Ok(Some(pack_path))
    }
}
