use std::fmt;
use std::sync::Arc;

use crate::error::{ElementModelError, Result};
use crate::storage::SchemaRepository;
use crate::types::{
    ElementDefinition, FHIR_NS, FhirTypeDefinitions, HasExtensions, EXT_DEFAULT_TYPE,
    EXT_NAMESPACE, PropertyRepresentation, STRUCTURE_DEFINITION_BASE, StructureDefinition,
};

/// Wire representation of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    Element,
    Attribute,
    Text,
    CdaText,
    TypeAttr,
}

/// Binds a position in an instance tree to one field definition.
///
/// A property never mutates the structure it points into. Choice fields with
/// element representation are expanded into one property per concrete type,
/// carrying the concrete name (`valueQuantity`) and type (`Quantity`).
#[derive(Clone)]
pub struct Property {
    structure: Arc<StructureDefinition>,
    element: usize,
    type_name: String,
    name_override: Option<String>,
    wildcard: bool,
}

impl Property {
    /// Binds a field of `structure` by snapshot index.
    pub fn new(structure: Arc<StructureDefinition>, element: usize) -> Result<Self> {
        let Some(definition) = structure.element(element) else {
            return Err(ElementModelError::definition(format!(
                "StructureDefinition {} has no element at index {}",
                structure.type_name, element
            )));
        };
        let type_name = if element == 0 || !definition.path.contains('.') {
            structure.type_name.clone()
        } else {
            Self::declared_type(&structure, definition)
        };
        Ok(Self {
            structure,
            element,
            type_name,
            name_override: None,
            wildcard: false,
        })
    }

    /// The root field of a structure, i.e. the resource or data type itself.
    pub fn root(structure: Arc<StructureDefinition>) -> Result<Self> {
        Self::new(structure, 0)
    }

    /// A concrete variant of a choice field.
    pub fn with_choice(&self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            structure: Arc::clone(&self.structure),
            element: self.element,
            type_name: type_name.into(),
            name_override: Some(name.into()),
            wildcard: false,
        }
    }

    fn declared_type(structure: &StructureDefinition, definition: &ElementDefinition) -> String {
        let mut codes = distinct_codes(definition);
        if codes.is_empty() {
            if let Some(target) = definition
                .content_reference
                .as_deref()
                .and_then(|r| structure.find_element(r))
                .and_then(|i| structure.element(i))
            {
                codes = distinct_codes(target);
            }
            if codes.is_empty() {
                return "BackboneElement".to_string();
            }
        }
        if codes.len() == 1 && codes[0] != "*" {
            codes[0].to_string()
        } else {
            String::new()
        }
    }

    pub fn structure(&self) -> &Arc<StructureDefinition> {
        &self.structure
    }

    pub fn definition(&self) -> &ElementDefinition {
        &self.structure.snapshot_elements()[self.element]
    }

    /// The field name as written on the wire.
    pub fn name(&self) -> &str {
        if let Some(name) = &self.name_override {
            return name;
        }
        let tail = self.definition().name();
        if self.wildcard {
            tail
        } else {
            tail.strip_suffix("[x]").unwrap_or(tail)
        }
    }

    /// The last segment of the definition path, `[x]` included.
    pub fn schema_name(&self) -> &str {
        self.definition().name()
    }

    /// Resolved type code; empty while a choice is unresolved.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    pub fn has_representation(&self, representation: PropertyRepresentation) -> bool {
        self.definition().has_representation(representation)
    }

    pub fn representation(&self) -> Representation {
        let definition = self.definition();
        if definition.has_representation(PropertyRepresentation::XmlAttr) {
            Representation::Attribute
        } else if definition.has_representation(PropertyRepresentation::XmlText) {
            Representation::Text
        } else if definition.has_representation(PropertyRepresentation::TypeAttr) {
            Representation::TypeAttr
        } else if definition.has_representation(PropertyRepresentation::CdaText) {
            Representation::CdaText
        } else {
            Representation::Element
        }
    }

    pub fn is_choice(&self) -> bool {
        let definition = self.definition();
        definition.is_choice_path() || distinct_codes(definition).len() > 1 || self.wildcard
    }

    pub fn is_resource(&self) -> bool {
        let codes = distinct_codes(self.definition());
        if codes.is_empty() {
            !self.definition().path.contains('.') && self.structure.kind == "resource"
        } else {
            codes.len() == 1 && FhirTypeDefinitions::is_resource_base(codes[0])
        }
    }

    pub fn is_primitive(&self, type_name: &str) -> bool {
        FhirTypeDefinitions::is_primitive(type_name)
    }

    pub fn is_list(&self) -> bool {
        let definition = self.definition();
        let max = definition
            .max
            .as_deref()
            .or(definition.base.as_ref().map(|b| b.max.as_str()));
        matches!(max, Some(m) if m != "1" && m != "0")
    }

    /// Expected XML namespace: the field's namespace extension, then the
    /// structure's, then the FHIR namespace.
    pub fn namespace(&self) -> &str {
        self.definition()
            .read_string_extension(EXT_NAMESPACE)
            .or_else(|| self.structure.namespace_override())
            .unwrap_or(FHIR_NS)
    }

    /// Properties of the immediate children of this field.
    ///
    /// Inline children are used when the definition has any; otherwise the
    /// structure of the field's type is fetched from `repository`.
    pub fn child_properties(
        &self,
        repository: &dyn SchemaRepository,
        element_name: &str,
        type_hint: Option<&str>,
    ) -> Result<Vec<Property>> {
        let (structure, parent) = self.children_source(repository)?;
        let mut children = structure.children_of(parent);
        let mut structure = structure;

        if children.is_empty() && parent != 0 {
            let type_name = self.child_type(element_name, type_hint)?;
            if type_name == "xhtml" {
                return Ok(Vec::new());
            }
            let url = self.type_url(&type_name)?;
            let fetched = repository.fetch_structure(&url).ok_or_else(|| {
                ElementModelError::definition(format!(
                    "Unable to find type '{}' for name '{}' on property {}",
                    type_name,
                    element_name,
                    self.definition().path
                ))
            })?;
            structure = repository.generate_snapshot(&fetched)?;
            children = structure.children_of(0);
        }

        let mut properties = Vec::with_capacity(children.len());
        for index in children {
            let property = Property::new(Arc::clone(&structure), index)?;
            property.expand_into(&mut properties);
        }
        Ok(properties)
    }

    /// Structure and element whose inline children describe this field,
    /// following `#Path` or `url#Path` content references.
    fn children_source(
        &self,
        repository: &dyn SchemaRepository,
    ) -> Result<(Arc<StructureDefinition>, usize)> {
        let Some(reference) = self.definition().content_reference.as_deref() else {
            return Ok((Arc::clone(&self.structure), self.element));
        };
        let (url, _) = reference.split_once('#').unwrap_or(("", reference));
        let structure = if url.is_empty() {
            Arc::clone(&self.structure)
        } else {
            let fetched = repository.fetch_structure(url).ok_or_else(|| {
                ElementModelError::definition(format!(
                    "Unable to resolve content reference {reference}"
                ))
            })?;
            repository.generate_snapshot(&fetched)?
        };
        let index = structure.find_element(reference).ok_or_else(|| {
            ElementModelError::definition(format!(
                "Unable to resolve content reference {} on {}",
                reference,
                self.definition().path
            ))
        })?;
        Ok((structure, index))
    }

    fn child_type(&self, element_name: &str, type_hint: Option<&str>) -> Result<String> {
        if !self.type_name.is_empty() {
            return Ok(self.type_name.clone());
        }
        let definition = self.definition();
        let codes = distinct_codes(definition);
        if codes.len() == 1 && codes[0] != "*" {
            return Ok(codes[0].to_string());
        }
        if let Some(hint) = type_hint.filter(|h| !h.is_empty()) {
            return Ok(strip_prefix(hint).to_string());
        }
        if self.has_representation(PropertyRepresentation::TypeAttr) {
            if let Some(default) = definition.read_string_extension(EXT_DEFAULT_TYPE) {
                return Ok(default.to_string());
            }
        } else if let Some(suffix) = self.choice_suffix(element_name) {
            return Ok(suffix);
        }
        Err(ElementModelError::definition(format!(
            "Unable to determine the type of {} for element {}",
            definition.path, element_name
        )))
    }

    /// Type code named by the suffix of a choice instance, e.g. `Quantity`
    /// for `valueQuantity`, or `string` for `valueString`.
    pub fn choice_suffix(&self, element_name: &str) -> Option<String> {
        let base = self.schema_name().strip_suffix("[x]")?;
        let suffix = element_name.strip_prefix(base)?;
        if suffix.is_empty() {
            return None;
        }
        let lowered = low_first(suffix);
        if FhirTypeDefinitions::is_primitive(&lowered) {
            Some(lowered)
        } else {
            Some(suffix.to_string())
        }
    }

    fn type_url(&self, type_name: &str) -> Result<String> {
        let declared = self
            .definition()
            .element_type
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|t| {
                t.code == type_name
                    || t.code.rsplit_once('/').is_some_and(|(_, tail)| tail == type_name)
            });
        if let Some(profile) = declared
            .and_then(|t| t.profile.as_ref())
            .and_then(|p| p.first())
        {
            return Ok(profile.clone());
        }
        let code = match declared {
            Some(declared) => declared.code.as_str(),
            None if self.is_wildcard_definition() => type_name,
            None => {
                return Err(ElementModelError::definition(format!(
                    "Unable to find type {} for element with path {}",
                    type_name,
                    self.definition().path
                )));
            }
        };
        if code.contains(':') {
            Ok(code.to_string())
        } else {
            Ok(format!("{STRUCTURE_DEFINITION_BASE}{code}"))
        }
    }

    fn is_wildcard_definition(&self) -> bool {
        distinct_codes(self.definition()).contains(&"*")
    }

    /// Pushes this property, or one property per concrete type when it is an
    /// element-represented choice.
    fn expand_into(self, properties: &mut Vec<Property>) {
        let definition = self.definition();
        let codes = distinct_codes(definition);
        let element_choice = definition.is_choice_path()
            && self.representation() == Representation::Element
            && !codes.is_empty();
        if !element_choice {
            properties.push(self);
            return;
        }
        let Some(base) = definition.name().strip_suffix("[x]").map(str::to_string) else {
            properties.push(self);
            return;
        };
        let mut variants = Vec::with_capacity(codes.len());
        let mut wildcard = false;
        for code in &codes {
            if *code == "*" {
                wildcard = true;
            } else {
                let name = format!("{}{}", base, FhirTypeDefinitions::capitalize(code));
                variants.push(self.with_choice(name, *code));
            }
        }
        properties.extend(variants);
        if wildcard {
            properties.push(Property {
                wildcard: true,
                type_name: String::new(),
                ..self
            });
        }
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("structure", &self.structure.url_str())
            .field("path", &self.definition().path)
            .field("name", &self.name())
            .field("type", &self.type_name)
            .finish()
    }
}

fn distinct_codes(definition: &ElementDefinition) -> Vec<&str> {
    let mut codes: Vec<&str> = Vec::new();
    for code in definition.type_codes() {
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

fn low_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Drops a namespace prefix from a qualified type name (`v3:PQ` -> `PQ`).
pub fn strip_prefix(qualified: &str) -> &str {
    qualified.split_once(':').map_or(qualified, |(_, local)| local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryRepository;
    use crate::types::Extension;
    use url::Url;

    fn observation() -> Arc<StructureDefinition> {
        Arc::new(
            StructureDefinition::new("Observation", "resource")
                .with_url(Url::parse("http://hl7.org/fhir/StructureDefinition/Observation").unwrap())
                .with_snapshot(vec![
                    ElementDefinition::new("Observation"),
                    ElementDefinition::new("Observation.status")
                        .with_type("code")
                        .with_cardinality(1, "1"),
                    ElementDefinition::new("Observation.value[x]")
                        .with_type("Quantity")
                        .with_type("string")
                        .with_cardinality(0, "1"),
                    ElementDefinition::new("Observation.extra[x]").with_type("*"),
                    ElementDefinition::new("Observation.note")
                        .with_type("string")
                        .with_cardinality(0, "*"),
                ]),
        )
    }

    #[test]
    fn test_root_property() {
        let root = Property::root(observation()).unwrap();
        assert_eq!(root.name(), "Observation");
        assert_eq!(root.type_name(), "Observation");
        assert!(root.is_resource());
        assert!(!root.is_choice());
        assert_eq!(root.namespace(), FHIR_NS);
    }

    #[test]
    fn test_choice_expansion() {
        let repo = MemoryRepository::new();
        let root = Property::root(observation()).unwrap();
        let children = root.child_properties(&repo, "Observation", None).unwrap();
        let names: Vec<_> = children.iter().map(|p| p.name().to_string()).collect();
        assert_eq!(
            names,
            vec!["status", "valueQuantity", "valueString", "extra[x]", "note"]
        );
        assert_eq!(children[1].type_name(), "Quantity");
        assert_eq!(children[2].type_name(), "string");
        assert!(children[1].is_choice());
        assert!(children[3].is_wildcard());
        assert!(children[4].is_list());
        assert!(!children[0].is_list());
    }

    #[test]
    fn test_choice_suffix() {
        let root = Property::root(observation()).unwrap();
        let value = Property::new(root.structure().clone(), 2).unwrap();
        assert_eq!(value.choice_suffix("valueString").as_deref(), Some("string"));
        assert_eq!(value.choice_suffix("valueQuantity").as_deref(), Some("Quantity"));
        assert_eq!(value.choice_suffix("value"), None);
        assert_eq!(value.choice_suffix("other"), None);
    }

    #[test]
    fn test_missing_type_structure() {
        let repo = MemoryRepository::new();
        let status = Property::new(observation(), 1).unwrap();
        let err = status.child_properties(&repo, "status", None).unwrap_err();
        assert!(matches!(err, ElementModelError::Definition { .. }));
    }

    #[test]
    fn test_namespace_precedence() {
        let sd = Arc::new(
            StructureDefinition::new("Sample", "logical")
                .with_extension(Extension::string(EXT_NAMESPACE, "urn:hl7-org:v3"))
                .with_snapshot(vec![
                    ElementDefinition::new("Sample"),
                    ElementDefinition::new("Sample.code").with_type("CD"),
                    ElementDefinition::new("Sample.local")
                        .with_type("ST")
                        .with_extension(Extension::string(EXT_NAMESPACE, "urn:local")),
                ]),
        );
        assert_eq!(Property::new(sd.clone(), 1).unwrap().namespace(), "urn:hl7-org:v3");
        assert_eq!(Property::new(sd, 2).unwrap().namespace(), "urn:local");
    }

    #[test]
    fn test_invalid_index() {
        assert!(Property::new(observation(), 42).is_err());
    }

    #[test]
    fn test_strip_prefix() {
        assert_eq!(strip_prefix("v3:PQ"), "PQ");
        assert_eq!(strip_prefix("PQ"), "PQ");
    }
}
