use std::fmt;

use crate::sar::QueryType;

use super::DslError;

/// Label that makes `attachments` read chunk files instead of a parts file.
pub const CHUNK_LABEL: &str = "chunk";

/// One command of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `all <job>`: run another job.
    All {
        /// Name of the job to run.
        job: String,
    },
    /// `attachments <type> <id> <label> [since]`: download attachments of fetched data.
    Attachments {
        /// Selection kind.
        query_type: QueryType,
        /// Selection id.
        id: String,
        /// Label of an earlier `getPack`, or `chunk`.
        label: String,
        /// Only items modified since.
        since: Option<String>,
    },
    /// `chunk <type> <id> [target] [since]`: page through a selection.
    Chunk {
        /// Selection kind.
        query_type: QueryType,
        /// Selection id.
        id: String,
        /// Paged module, `Object` by default.
        target: String,
        /// Only items modified since.
        since: Option<String>,
    },
    /// `getItem <module> <id>`: fetch one item.
    GetItem {
        /// Module name.
        module: String,
        /// Item id.
        id: String,
    },
    /// `getPack <type> <id> <label> [since]`: fetch and join a selection.
    GetPack {
        /// Selection kind.
        query_type: QueryType,
        /// Selection id.
        id: String,
        /// Label used in file names.
        label: String,
        /// Only items modified since.
        since: Option<String>,
    },
    /// `pack`: join all join files of the project.
    Pack,
}

impl Command {
    /// All command names, in alphabetical order.
    pub const NAMES: [&'static str; 6] = ["all", "attachments", "chunk", "getItem", "getPack", "pack"];

    /// Name of the command as written in job files.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::All { .. } => "all",
            Self::Attachments { .. } => "attachments",
            Self::Chunk { .. } => "chunk",
            Self::GetItem { .. } => "getItem",
            Self::GetPack { .. } => "getPack",
            Self::Pack => "pack",
        }
    }

    /// Parses a command and its arguments.
    pub(super) fn parse(line: usize, name: &str, args: &[&str]) -> Result<Self, DslError> {
        let parser = |command, usage| NamedArgs {
            line,
            args,
            command,
            usage,
        };
        match name {
            "all" => {
                let parser = parser("all", "<job>");
                parser.arity(1, 1)?;
                Ok(Self::All {
                    job: parser.required(0)?,
                })
            }
            "attachments" => {
                let parser = parser("attachments", "<type> <id> <label> [since]");
                parser.arity(3, 4)?;
                Ok(Self::Attachments {
                    query_type: parser.query_type(0)?,
                    id: parser.id(1)?,
                    label: parser.required(2)?,
                    since: parser.optional(3),
                })
            }
            "chunk" => {
                let parser = parser("chunk", "<type> <id> [target] [since]");
                parser.arity(2, 4)?;
                let query_type = parser.query_type(0)?;
                let since = parser.optional(3);
                if query_type == QueryType::SavedQuery && since.is_some() {
                    return Err(parser.invalid("saved queries cannot be filtered by date"));
                }
                Ok(Self::Chunk {
                    query_type,
                    id: parser.id(1)?,
                    target: parser.optional(2).unwrap_or_else(|| "Object".to_string()),
                    since,
                })
            }
            "getItem" => {
                let parser = parser("getItem", "<module> <id>");
                parser.arity(2, 2)?;
                Ok(Self::GetItem {
                    module: parser.required(0)?,
                    id: parser.id(1)?,
                })
            }
            "getPack" => {
                let parser = parser("getPack", "<type> <id> <label> [since]");
                parser.arity(3, 4)?;
                let query_type = parser.query_type(0)?;
                if query_type == QueryType::SavedQuery {
                    return Err(parser.invalid("saved queries are paged with chunk"));
                }
                Ok(Self::GetPack {
                    query_type,
                    id: parser.id(1)?,
                    label: parser.required(2)?,
                    since: parser.optional(3),
                })
            }
            "pack" => {
                parser("pack", "no arguments").arity(0, 0)?;
                Ok(Self::Pack)
            }
            other => Err(DslError::UnknownCommand {
                line,
                command: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All { job } => write!(f, "all {job}"),
            Self::Attachments {
                query_type,
                id,
                label,
                since,
            }
            | Self::GetPack {
                query_type,
                id,
                label,
                since,
            } => {
                write!(f, "{} {query_type} {id} {label}", self.name())?;
                since.iter().try_for_each(|s| write!(f, " {s}"))
            }
            Self::Chunk {
                query_type,
                id,
                target,
                since,
            } => {
                write!(f, "chunk {query_type} {id} {target}")?;
                since.iter().try_for_each(|s| write!(f, " {s}"))
            }
            Self::GetItem { module, id } => write!(f, "getItem {module} {id}"),
            Self::Pack => write!(f, "pack"),
        }
    }
}

struct NamedArgs<'a> {
    line: usize,
    args: &'a [&'a str],
    command: &'static str,
    usage: &'static str,
}

impl NamedArgs<'_> {
    fn invalid(&self, reason: impl Into<String>) -> DslError {
        DslError::InvalidArgument {
            line: self.line,
            command: self.command,
            reason: reason.into(),
        }
    }

    fn arity(&self, min: usize, max: usize) -> Result<(), DslError> {
        if self.args.len() < min {
            return Err(DslError::MissingArgument {
                line: self.line,
                command: self.command,
                expected: self.usage,
            });
        }
        if self.args.len() > max {
            return Err(DslError::TooManyArguments {
                line: self.line,
                command: self.command,
                max,
            });
        }
        Ok(())
    }

    fn required(&self, index: usize) -> Result<String, DslError> {
        self.args
            .get(index)
            .map(|arg| (*arg).to_string())
            .ok_or(DslError::MissingArgument {
                line: self.line,
                command: self.command,
                expected: self.usage,
            })
    }

    fn optional(&self, index: usize) -> Option<String> {
        self.args.get(index).map(|arg| (*arg).to_string())
    }

    fn query_type(&self, index: usize) -> Result<QueryType, DslError> {
        self.required(index)?
            .parse()
            .map_err(|e: crate::sar::UnknownQueryType| self.invalid(e.to_string()))
    }

    fn id(&self, index: usize) -> Result<String, DslError> {
        let id = self.required(index)?;
        if id.parse::<u64>().is_ok() {
            Ok(id)
        } else {
            Err(self.invalid(format!("id must be numeric, found '{id}'")))
        }
    }
}
