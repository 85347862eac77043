//! # OctoFHIR Element Model
//!
//! A schema-driven element model for FHIR content with a hardened XML parser
//! and composer. The shape of every node is taken at runtime from
//! StructureDefinitions held in a [`SchemaRepository`], so resources, data
//! types and logical models (such as CDA) are read the same way.
//!
//! ## Features
//!
//! - **Choice resolution**: `value[x]` fields resolved from element name suffixes,
//!   `xsi:type`, or a declared default type
//! - **Wire representations**: element, attribute, text, CDA narrative and `xsi:type` fields
//! - **Validation policy**: `None`, `Quick` (abort on first error) or `Everything`
//!   (collect all diagnostics with line and column)
//! - **Hardened ingest**: no DOCTYPE, no external entities
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use octofhir_elementmodel::*;
//!
//! # fn example() -> Result<()> {
//! let mut repository = MemoryRepository::new();
//! repository.load_directory(std::path::Path::new("definitions"))?;
//! let parser = XmlParser::new(Arc::new(repository));
//!
//! let config = ParserConfig::with_policy(ValidationPolicy::Everything);
//! let outcome = parser.parse(br#"<Patient xmlns="http://hl7.org/fhir"/>"#, &config)?;
//! for issue in &outcome.diagnostics {
//!     println!("{issue}");
//! }
//! if let Some(patient) = outcome.element {
//!     let xml = parser.compose_to_string(&patient, OutputStyle::Pretty, &config)?;
//!     println!("{xml}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod convert;
pub mod core;
pub mod elementmodel;
pub mod error;
pub mod storage;
pub mod types;
pub mod xml;

pub use crate::core::*;
pub use elementmodel::*;
pub use error::Result;
pub use error::ElementModelError;
pub use storage::*;
pub use types::*;
pub use xml::{XmlParser, XmlSink, XmlWriter};
