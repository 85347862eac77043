use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::elementmodel::Property;

/// How diagnostics raised during a parse are propagated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ValidationPolicy {
    /// Only fatal problems abort; everything else is discarded.
    #[default]
    #[serde(rename = "none")]
    None,
    /// Errors and fatal problems abort on the first occurrence.
    #[serde(rename = "quick")]
    Quick,
    /// Every diagnostic is collected, nothing aborts, and nodes carry source locations.
    #[serde(rename = "everything")]
    Everything,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum OutputStyle {
    #[default]
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "pretty")]
    Pretty,
}

/// Supplies documentation links emitted alongside composed content.
pub trait LinkResolver: Send + Sync {
    fn resolve_type(&self, type_name: &str) -> Option<String>;
    fn resolve_property(&self, property: &Property) -> Option<String>;
    fn resolve_page(&self, name: &str) -> Option<String>;
}

#[derive(Clone, Default)]
pub struct ParserConfig {
    pub policy: ValidationPolicy,
    pub link_resolver: Option<Arc<dyn LinkResolver>>,
    pub show_decorations: bool,
    /// Accept `xsi:schemaLocation` on FHIR-namespace elements.
    pub allow_xsi_location: bool,
}

impl fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserConfig")
            .field("policy", &self.policy)
            .field("link_resolver", &self.link_resolver.is_some())
            .field("show_decorations", &self.show_decorations)
            .field("allow_xsi_location", &self.allow_xsi_location)
            .finish()
    }
}

impl ParserConfig {
    pub fn builder() -> ParserConfigBuilder {
        ParserConfigBuilder::default()
    }

    pub fn with_policy(policy: ValidationPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Source locations are recorded and the prolog is inspected only when collecting everything.
    pub fn tracks_locations(&self) -> bool {
        self.policy == ValidationPolicy::Everything
    }
}

#[derive(Default)]
pub struct ParserConfigBuilder {
    config: ParserConfig,
}

impl ParserConfigBuilder {
    pub fn policy(mut self, policy: ValidationPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn link_resolver(mut self, resolver: Arc<dyn LinkResolver>) -> Self {
        self.config.link_resolver = Some(resolver);
        self
    }

    pub fn show_decorations(mut self, show: bool) -> Self {
        self.config.show_decorations = show;
        self
    }

    pub fn allow_xsi_location(mut self, allow: bool) -> Self {
        self.config.allow_xsi_location = allow;
        self
    }

    pub fn build(self) -> ParserConfig {
        self.config
    }
}
