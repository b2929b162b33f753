//! Job command handler: run one job of a job file.

use std::fs::{File, OpenOptions};

use anyhow::{Context, Result, bail};
use chrono::Local;
use mpapi::{Chunky, Credentials, JobFile, Mink, MpApi, ProjectLayout, Sar};
use tracing::info;

use crate::cli::JobArgs;

/// Parses the job file and checks that the requested job exists.
pub fn load_job(args: &JobArgs) -> Result<JobFile> {
    let jobs = JobFile::from_file(&args.conf)
        .with_context(|| format!("reading job file {}", args.conf.display()))?;
    if jobs.job(&args.job).is_none() {
        bail!(
            "job '{}' is not defined in {} (known jobs: {})",
            args.job,
            args.conf.display(),
            jobs.names().join(", ")
        );
    }
    Ok(jobs)
}

/// Creates today's project directory and opens its log for appending.
pub fn open_job_log(args: &JobArgs) -> Result<File> {
    let layout = ProjectLayout::new(&args.base_dir, &args.job, Local::now().date_naive());
    let project_dir = layout.project_dir();
    std::fs::create_dir_all(&project_dir)
        .with_context(|| format!("creating {}", project_dir.display()))?;
    let log_path = layout.log_path();
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening log {}", log_path.display()))
}

pub async fn run_job_command(jobs: JobFile, args: &JobArgs, credentials: &Credentials) -> Result<()> {
    let api = MpApi::new(credentials)?;
    let chunky = Chunky::new(Sar::new(api), args.chunk_size);
    let mink = Mink::new(jobs, &args.base_dir, chunky);

    info!(job = %args.job, base_dir = %args.base_dir.display(), "job starting");
    let report = mink
        .run_job(&args.job)
        .await
        .with_context(|| format!("job '{}' failed", args.job))?;
    info!(
        jobs = report.jobs.len(),
        steps = report.steps,
        written = report.written.len(),
        "job complete"
    );
    for path in &report.written {
        println!("{}", path.display());
    }
    Ok(())
}
