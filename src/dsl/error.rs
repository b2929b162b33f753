use std::path::PathBuf;

use thiserror::Error;

/// Errors found while reading a job file.
///
/// Every syntax error carries the 1-based line number.
#[derive(Debug, Error)]
pub enum DslError {
    /// A top-level line is not of the form `name:`.
    #[error("line {line}: job label has to end with a colon: '{label}'")]
    LabelWithoutColon {
        /// Line number.
        line: usize,
        /// Offending label.
        label: String,
    },

    /// The same job is defined twice.
    #[error("line {line}: job '{job}' is defined twice")]
    DuplicateJob {
        /// Line number of the second definition.
        line: usize,
        /// Job name.
        job: String,
    },

    /// The command name is not known.
    #[error("line {line}: unknown command '{command}'")]
    UnknownCommand {
        /// Line number.
        line: usize,
        /// Offending command.
        command: String,
    },

    /// Lines may be indented at most one level below a job label.
    #[error("line {line}: too many indents (level {level})")]
    TooManyIndents {
        /// Line number.
        line: usize,
        /// Computed indent level.
        level: usize,
    },

    /// A command appears before the first job label.
    #[error("line {line}: command '{command}' outside of a job")]
    CommandOutsideJob {
        /// Line number.
        line: usize,
        /// Offending command.
        command: String,
    },

    /// A required argument is missing.
    #[error("line {line}: {command} expects {expected}")]
    MissingArgument {
        /// Line number.
        line: usize,
        /// Command name.
        command: &'static str,
        /// Usage of the command.
        expected: &'static str,
    },

    /// More arguments than the command takes.
    #[error("line {line}: {command} takes at most {max} arguments")]
    TooManyArguments {
        /// Line number.
        line: usize,
        /// Command name.
        command: &'static str,
        /// Maximum argument count.
        max: usize,
    },

    /// An argument has the wrong shape.
    #[error("line {line}: {command}: {reason}")]
    InvalidArgument {
        /// Line number.
        line: usize,
        /// Command name.
        command: &'static str,
        /// What is wrong.
        reason: String,
    },

    /// `all` names a job that the file does not define.
    #[error("line {line}: all: job '{job}' is not defined")]
    UnknownJob {
        /// Line of the `all` command.
        line: usize,
        /// Missing job.
        job: String,
    },

    /// `all` commands form a cycle.
    #[error("line {line}: job cycle: {chain}")]
    RecursiveJob {
        /// Line of the `all` command closing the cycle.
        line: usize,
        /// Jobs on the cycle, ending with the repeated one.
        chain: String,
    },

    /// The job file cannot be read.
    #[error("cannot read job file {path}: {source}")]
    Io {
        /// Job file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl DslError {
    /// Line of the error, if it is a syntax error.
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::LabelWithoutColon { line, .. }
            | Self::DuplicateJob { line, .. }
            | Self::UnknownCommand { line, .. }
            | Self::TooManyIndents { line, .. }
            | Self::CommandOutsideJob { line, .. }
            | Self::MissingArgument { line, .. }
            | Self::TooManyArguments { line, .. }
            | Self::InvalidArgument { line, .. }
            | Self::UnknownJob { line, .. }
            | Self::RecursiveJob { line, .. } => Some(*line),
            Self::Io { .. } => None,
        }
    }
}
