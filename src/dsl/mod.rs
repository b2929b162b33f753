//! Job definition files.
//!
//! A job file lists named jobs, each a sequence of commands:
//!
//! ```text
//! # comments start with a hash
//! m39:
//!     getPack exhibit 20222 M39
//!     attachments exhibit 20222 M39
//!     pack
//!
//! nightly:
//!     chunk group 162397
//!     all m39
//! ```
//!
//! Tabs expand to four columns; the indent level of a line is
//! `(leading_columns + 4) / 4`. Job labels sit on level 1, commands on
//! level 2. The whole file is checked when it is parsed, so a typo in the
//! last job fails before the first request is made.

mod command;
mod error;

use std::path::Path;

pub use command::{CHUNK_LABEL, Command};
pub use error::DslError;

const TAB_WIDTH: usize = 4;

/// A command with the line it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// 1-based line number.
    pub line: usize,
    /// The parsed command.
    pub command: Command,
}

/// A named sequence of commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Job name (label without the colon).
    pub name: String,
    /// Line of the label.
    pub line: usize,
    /// Commands in file order.
    pub steps: Vec<Step>,
}

/// All jobs of a job file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFile {
    jobs: Vec<Job>,
}

impl JobFile {
    /// Reads and parses a job file.
    ///
    /// # Errors
    ///
    /// Returns [`DslError::Io`] if the file is unreadable, or the first syntax error.
    pub fn from_file(path: &Path) -> Result<Self, DslError> {
        let source = std::fs::read_to_string(path).map_err(|source| DslError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        parse_jobs(&source)
    }

    /// Looks up a job by name.
    #[must_use]
    pub fn job(&self, name: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.name == name)
    }

    /// Job names in file order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.jobs.iter().map(|job| job.name.as_str()).collect()
    }

    /// All jobs in file order.
    #[must_use]
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }
}

fn indent_columns(line: &str) -> usize {
    let mut columns = 0;
    for c in line.chars() {
        match c {
            ' ' => columns += 1,
            '\t' => columns = (columns / TAB_WIDTH + 1) * TAB_WIDTH,
            _ => break,
        }
    }
    columns
}

/// Parses the text of a job file.
///
/// # Errors
///
/// Returns the first [`DslError`] found.
pub fn parse_jobs(source: &str) -> Result<JobFile, DslError> {
    let mut jobs: Vec<Job> = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let content = raw.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        let level = (indent_columns(raw) + TAB_WIDTH) / TAB_WIDTH;
        let parts: Vec<&str> = content.split_whitespace().collect();
        let Some((&head, args)) = parts.split_first() else {
            continue;
        };

        match level {
            1 => {
                let Some(name) = head.strip_suffix(':').filter(|n| !n.is_empty()) else {
                    return Err(DslError::LabelWithoutColon {
                        line,
                        label: head.to_string(),
                    });
                };
                if jobs.iter().any(|job| job.name == name) {
                    return Err(DslError::DuplicateJob {
                        line,
                        job: name.to_string(),
                    });
                }
                jobs.push(Job {
                    name: name.to_string(),
                    line,
                    steps: Vec::new(),
                });
            }
            2 => {
                let command = Command::parse(line, head, args)?;
                let Some(job) = jobs.last_mut() else {
                    return Err(DslError::CommandOutsideJob {
                        line,
                        command: head.to_string(),
                    });
                };
                job.steps.push(Step { line, command });
            }
            level => return Err(DslError::TooManyIndents { line, level }),
        }
    }
    check_job_references(&jobs)?;
    Ok(JobFile { jobs })
}

// Every `all` target must be defined and no job may reach itself through `all`.
fn check_job_references(jobs: &[Job]) -> Result<(), DslError> {
    for job in jobs {
        for step in &job.steps {
            if let Command::All { job: target } = &step.command
                && !jobs.iter().any(|known| &known.name == target)
            {
                return Err(DslError::UnknownJob {
                    line: step.line,
                    job: target.clone(),
                });
            }
        }
    }
    for job in jobs {
        let mut stack = vec![job.name.as_str()];
        find_cycle(jobs, job, &mut stack)?;
    }
    Ok(())
}

fn find_cycle<'a>(jobs: &'a [Job], job: &'a Job, stack: &mut Vec<&'a str>) -> Result<(), DslError> {
    for step in &job.steps {
        let Command::All { job: target } = &step.command else {
            continue;
        };
        if stack.contains(&target.as_str()) {
            return Err(DslError::RecursiveJob {
                line: step.line,
                chain: format!("{} -> {target}", stack.join(" -> ")),
            });
        }
        let Some(next) = jobs.iter().find(|known| &known.name == target) else {
            continue;
        };
        stack.push(next.name.as_str());
        find_cycle(jobs, next, stack)?;
        stack.pop();
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::sar::QueryType;

    const JOBS: &str = "\
# sample jobs
m39:
    getPack exhibit 20222 M39   # exhibition
    attachments exhibit 20222 M39
\tpack

nightly:
    chunk group 162397
    chunk query 4711 Multimedia
    getItem Object 12
    all m39
";

    #[test]
    fn test_parse_jobs_reads_labels_and_commands() {
        let file = parse_jobs(JOBS).unwrap();
        assert_eq!(file.names(), vec!["m39", "nightly"]);

        let m39 = file.job("m39").unwrap();
        assert_eq!(m39.line, 2);
        assert_eq!(m39.steps.len(), 3);
        assert_eq!(
            m39.steps[0].command,
            Command::GetPack {
                query_type: QueryType::Exhibit,
                id: "20222".to_string(),
                label: "M39".to_string(),
                since: None,
            }
        );
        assert_eq!(m39.steps[2].command, Command::Pack);
        assert_eq!(m39.steps[2].line, 5);
    }

    #[test]
    fn test_chunk_target_defaults_to_object() {
        let file = parse_jobs(JOBS).unwrap();
        let nightly = file.job("nightly").unwrap();
        assert_eq!(
            nightly.steps[0].command.to_string(),
            "chunk group 162397 Object"
        );
        assert_eq!(
            nightly.steps[1].command,
            Command::Chunk {
                query_type: QueryType::SavedQuery,
                id: "4711".to_string(),
                target: "Multimedia".to_string(),
                since: None,
            }
        );
    }

    #[test]
    fn test_label_without_colon_is_rejected() {
        let err = parse_jobs("m39\n    pack\n").unwrap_err();
        assert!(matches!(err, DslError::LabelWithoutColon { line: 1, .. }), "{err}");
    }

    #[test]
    fn test_command_before_label_is_rejected() {
        let err = parse_jobs("    pack\nm39:\n").unwrap_err();
        assert!(matches!(err, DslError::CommandOutsideJob { line: 1, .. }), "{err}");
    }

    #[test]
    fn test_deep_indent_is_rejected() {
        let err = parse_jobs("m39:\n        pack\n").unwrap_err();
        assert!(
            matches!(err, DslError::TooManyIndents { line: 2, level: 3 }),
            "{err}"
        );
    }

    #[test]
    fn test_unknown_command_in_later_job_fails_whole_file() {
        let err = parse_jobs("a:\n    pack\nb:\n    fetchAll group 1\n").unwrap_err();
        assert_eq!(err.line(), Some(4));
        assert!(err.to_string().contains("fetchAll"), "{err}");
    }

    #[test]
    fn test_arguments_are_checked() {
        let err = parse_jobs("a:\n    getPack group 1\n").unwrap_err();
        assert!(matches!(err, DslError::MissingArgument { .. }), "{err}");

        let err = parse_jobs("a:\n    getItem Object abc\n").unwrap_err();
        assert!(err.to_string().contains("numeric"), "{err}");

        let err = parse_jobs("a:\n    chunk gruppe 1\n").unwrap_err();
        assert!(err.to_string().contains("gruppe"), "{err}");

        let err = parse_jobs("a:\n    chunk query 4711 Object 2021-01-01\n").unwrap_err();
        assert!(err.to_string().contains("saved queries"), "{err}");

        let err = parse_jobs("a:\n    pack now\n").unwrap_err();
        assert!(matches!(err, DslError::TooManyArguments { max: 0, .. }), "{err}");
    }

    #[test]
    fn test_duplicate_job_is_rejected() {
        let err = parse_jobs("a:\n    pack\na:\n    pack\n").unwrap_err();
        assert!(matches!(err, DslError::DuplicateJob { line: 3, .. }), "{err}");
    }

    #[test]
    fn test_all_with_undefined_job_is_rejected() {
        let err = parse_jobs("a:\n    getPack group 1 X\n    all nope\n").unwrap_err();
        assert!(
            matches!(err, DslError::UnknownJob { line: 3, ref job } if job == "nope"),
            "{err}"
        );
    }

    #[test]
    fn test_all_cycles_are_rejected() {
        let err = parse_jobs("a:\n    all b\nb:\n    pack\n    all a\n").unwrap_err();
        assert!(
            matches!(err, DslError::RecursiveJob { line: 5, ref chain } if chain == "a -> b -> a"),
            "{err}"
        );

        let err = parse_jobs("solo:\n    all solo\n").unwrap_err();
        assert!(matches!(err, DslError::RecursiveJob { line: 2, .. }), "{err}");
    }

    #[test]
    fn test_shared_nested_job_is_not_a_cycle() {
        let file = parse_jobs("a:\n    all c\nb:\n    all a\n    all c\nc:\n    pack\n").unwrap();
        assert_eq!(file.names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_indent_columns_expands_tabs() {
        assert_eq!(indent_columns("\tpack"), 4);
        assert_eq!(indent_columns("  \tpack"), 4);
        assert_eq!(indent_columns("    pack"), 4);
        assert_eq!(indent_columns("pack"), 0);
    }
}
