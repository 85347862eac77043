use std::sync::Arc;

use crate::Result;
use crate::types::StructureDefinition;

/// Source of the structure definitions that drive parsing and composing.
///
/// Implementations are consulted synchronously during a parse and must be
/// shareable between threads; a parser holds one behind an `Arc`.
pub trait SchemaRepository: Send + Sync {
    /// Every known definition, in repository order.
    fn all_structures(&self) -> Vec<Arc<StructureDefinition>>;

    /// Definitions eligible for lookup by canonical URL or type name.
    fn structures(&self) -> Vec<Arc<StructureDefinition>> {
        self.all_structures()
    }

    fn fetch_structure(&self, url: &str) -> Option<Arc<StructureDefinition>>;

    /// Returns a definition with a populated snapshot, generating it when absent.
    fn generate_snapshot(
        &self,
        definition: &Arc<StructureDefinition>,
    ) -> Result<Arc<StructureDefinition>>;
}
