use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::sar::QueryType;

/// File layout of one job run.
///
/// ```text
/// {base}/{job}/                      job dir
/// {base}/{job}/{YYYYMMDD}/           project dir: caches, chunks, join files, log
/// {base}/{job}/{YYYYMMDD}/parts/     per-module parts of getPack
/// {base}/{job}/pix_{label}/          attachments (pix_update with `since`)
/// {base}/{job}/{job}{YYYYMMDD}.xml   pack file
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    job: String,
    date: String,
    job_dir: PathBuf,
}

impl ProjectLayout {
    /// Layout of job `job` run on `date` below `base`.
    #[must_use]
    pub fn new(base: &Path, job: &str, date: NaiveDate) -> Self {
        Self {
            job: job.to_string(),
            date: date.format("%Y%m%d").to_string(),
            job_dir: base.join(job),
        }
    }

    /// Date stamp of the run (`YYYYMMDD`).
    #[must_use]
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Directory shared by all runs of the job.
    #[must_use]
    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }

    /// Directory of this run.
    #[must_use]
    pub fn project_dir(&self) -> PathBuf {
        self.job_dir.join(&self.date)
    }

    /// Cache directory of getPack parts.
    #[must_use]
    pub fn parts_dir(&self) -> PathBuf {
        self.project_dir().join("parts")
    }

    /// Run log file.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.project_dir().join(format!("{}.log", self.date))
    }

    /// Attachment directory for `label`; updates (`since`) share `pix_update`.
    #[must_use]
    pub fn pix_dir(&self, label: &str, update: bool) -> PathBuf {
        if update {
            self.job_dir.join("pix_update")
        } else {
            self.job_dir.join(format!("pix_{label}"))
        }
    }

    /// Cache file of a single item.
    #[must_use]
    pub fn item_path(&self, module: &str, id: &str) -> PathBuf {
        self.project_dir().join(format!("getItem-{module}{id}.xml"))
    }

    /// Cache file of one module of a getPack.
    #[must_use]
    pub fn part_path(&self, label: &str, module: &str, query_type: QueryType, id: &str) -> PathBuf {
        self.parts_dir()
            .join(format!("{label}-{module}-{query_type}{id}.xml"))
    }

    /// Joined and cleaned result of a getPack.
    #[must_use]
    pub fn join_path(&self, label: &str, query_type: QueryType, id: &str) -> PathBuf {
        self.project_dir()
            .join(format!("{label}-join-{query_type}{id}.xml"))
    }

    /// Chunk file number `no`; `extension` is `xml` or `zip`.
    #[must_use]
    pub fn chunk_path(&self, query_type: QueryType, id: &str, no: u64, extension: &str) -> PathBuf {
        self.project_dir()
            .join(format!("{query_type}{id}-chunk{no}.{extension}"))
    }

    /// Pack file of the run.
    #[must_use]
    pub fn pack_path(&self) -> PathBuf {
        self.job_dir.join(format!("{}{}.xml", self.job, self.date))
    }

    /// Number and offset of the chunk to fetch next.
    ///
    /// Skips over existing zipped chunks. The last existing chunk is
    /// returned again since an aborted run may have left it incomplete.
    #[must_use]
    pub fn fast_forward(&self, query_type: QueryType, id: &str, chunk_size: u32) -> (u64, u64) {
        let mut no = 1;
        while self.chunk_path(query_type, id, no, "zip").exists() {
            no += 1;
        }
        if no > 1 {
            no -= 1;
        }
        (no, (no - 1) * u64::from(chunk_size))
    }
}
