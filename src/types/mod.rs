pub mod structure_definition;
pub mod type_definitions;

pub use structure_definition::{
    ElementDefinition, ElementDefinitionBase, ElementDefinitionType, Extension, HasExtensions,
    PropertyRepresentation, StructureDefinition, StructureDefinitionDifferential,
    StructureDefinitionSnapshot, TypeDerivationRule,
};
pub use type_definitions::FhirTypeDefinitions;

pub const FHIR_NS: &str = "http://hl7.org/fhir";
pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const V3_NS: &str = "urn:hl7-org:v3";

pub const STRUCTURE_DEFINITION_BASE: &str = "http://hl7.org/fhir/StructureDefinition/";

pub const EXT_NAMESPACE: &str =
    "http://hl7.org/fhir/StructureDefinition/elementdefinition-namespace";
pub const EXT_DEFAULT_TYPE: &str =
    "http://hl7.org/fhir/StructureDefinition/elementdefinition-defaulttype";
pub const EXT_DATE_FORMAT: &str =
    "http://www.healthintersections.com.au/fhir/StructureDefinition/elementdefinition-dateformat";

/// Id (or base path) of the CDA `ED` text field whose name depends on `@representation`.
pub const ED_DATA_ID: &str = "ED.data[x]";
