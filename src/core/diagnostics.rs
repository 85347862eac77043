use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IssueSeverity {
    #[serde(rename = "information")]
    Information,
    #[serde(rename = "warning")]
    Warning,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "fatal")]
    Fatal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum IssueType {
    #[serde(rename = "structure")]
    Structure,
    #[serde(rename = "invalid")]
    Invalid,
}

/// One problem found while reading or writing content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: IssueSeverity,
    pub kind: IssueType,
    pub line: usize,
    pub column: usize,
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        severity: IssueSeverity,
        kind: IssueType,
        line: usize,
        column: usize,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            line,
            column,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Error, IssueType::Structure, 0, 0, path, message)
    }

    pub fn fatal(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Fatal, IssueType::Structure, 0, 0, path, message)
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn is_error_or_worse(&self) -> bool {
        self.severity >= IssueSeverity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} [{}:{}] {}: {}",
            self.severity, self.line, self.column, self.path, self.message
        )
    }
}
