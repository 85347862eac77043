//! The element model: instance trees bound at runtime to structure definitions.

pub mod base;
pub mod element;
pub mod property;

pub use base::{ElementModelParser, ParseOutcome, ParseSession};
pub use element::{DecorationType, Element, ElementDecoration, Location, SpecialElement};
pub use property::{Property, Representation, strip_prefix};
