pub mod config;
pub mod diagnostics;

pub use config::{LinkResolver, OutputStyle, ParserConfig, ParserConfigBuilder, ValidationPolicy};
pub use diagnostics::{Diagnostic, IssueSeverity, IssueType};
