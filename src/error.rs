//! Typed failures raised while driving external tools.

use std::time::Duration;
use thiserror::Error;

/// Why a single tool invocation did not succeed.
///
/// Everything here aborts the enclosing fixture. Which variant is raised
/// depends on the tool's success policy (see [`crate::checks`]).
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{name}: failed to start: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{name}: timed out after {}s", timeout.as_secs())]
    Timeout { name: String, timeout: Duration },

    #[error("{name}: {message} ({})", describe_exit(*code))]
    Failed {
        name: String,
        code: Option<i32>,
        message: String,
    },

    #[error("{name}: {reason}")]
    UnexpectedOutput { name: String, reason: String },

    #[error("{name}: fixture authoring error: {reason}")]
    FixtureAuthoring { name: String, reason: String },

    #[error("{name}: {context}: {source}")]
    Io {
        name: String,
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Verdict of an output validator that inspected a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputRejection {
    /// The output shows the converter (or the compared images) misbehaved.
    Unexpected(String),
    /// The output shows the fixture itself is unusable.
    FixtureAuthoring(String),
}

impl OutputRejection {
    pub(crate) fn into_tool_error(self, name: &str) -> ToolError {
        match self {
            Self::Unexpected(reason) => ToolError::UnexpectedOutput {
                name: name.to_string(),
                reason,
            },
            Self::FixtureAuthoring(reason) => ToolError::FixtureAuthoring {
                name: name.to_string(),
                reason,
            },
        }
    }
}

impl ToolError {
    /// Logical name of the tool that failed.
    pub fn tool(&self) -> &str {
        match self {
            Self::Spawn { name, .. }
            | Self::Timeout { name, .. }
            | Self::Failed { name, .. }
            | Self::UnexpectedOutput { name, .. }
            | Self::FixtureAuthoring { name, .. }
            | Self::Io { name, .. } => name,
        }
    }

    /// True when the failure points at the fixture rather than the converter.
    pub fn is_fixture_authoring(&self) -> bool {
        matches!(self, Self::FixtureAuthoring { .. })
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}
