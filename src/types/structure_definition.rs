use serde::{Deserialize, Serialize};
use url::Url;

use super::{EXT_NAMESPACE, STRUCTURE_DEFINITION_BASE};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructureDefinition {
    #[serde(rename = "resourceType", default = "structure_definition_resource_type")]
    pub resource_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default)]
    pub kind: String,

    #[serde(rename = "abstract", default, skip_serializing_if = "Option::is_none")]
    pub abstract_: Option<bool>,

    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(rename = "baseDefinition", default, skip_serializing_if = "Option::is_none")]
    pub base_definition: Option<Url>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation: Option<TypeDerivationRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<Vec<Extension>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<StructureDefinitionSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub differential: Option<StructureDefinitionDifferential>,
}

fn structure_definition_resource_type() -> String {
    "StructureDefinition".to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TypeDerivationRule {
    Specialization,
    Constraint,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructureDefinitionSnapshot {
    pub element: Vec<ElementDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructureDefinitionDifferential {
    pub element: Vec<ElementDefinition>,
}

/// How a field is carried on the XML wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PropertyRepresentation {
    #[serde(rename = "xmlAttr")]
    XmlAttr,
    #[serde(rename = "xmlText")]
    XmlText,
    #[serde(rename = "typeAttr")]
    TypeAttr,
    #[serde(rename = "cdaText")]
    CdaText,
    #[serde(rename = "xhtml")]
    Xhtml,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub representation: Option<Vec<PropertyRepresentation>>,

    #[serde(rename = "sliceName", default, skip_serializing_if = "Option::is_none")]
    pub slice_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<ElementDefinitionBase>,

    #[serde(rename = "contentReference", default, skip_serializing_if = "Option::is_none")]
    pub content_reference: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<Vec<ElementDefinitionType>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<Vec<Extension>>,

    #[serde(rename = "isModifier", default, skip_serializing_if = "Option::is_none")]
    pub is_modifier: Option<bool>,

    #[serde(rename = "isSummary", default, skip_serializing_if = "Option::is_none")]
    pub is_summary: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementDefinitionBase {
    pub path: String,
    pub min: u32,
    pub max: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementDefinitionType {
    pub code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Vec<String>>,

    #[serde(rename = "targetProfile", default, skip_serializing_if = "Option::is_none")]
    pub target_profile: Option<Vec<String>>,
}

/// The subset of FHIR extension values the codec reads from definitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Extension {
    pub url: String,

    #[serde(rename = "valueString", default, skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,
    #[serde(rename = "valueUri", default, skip_serializing_if = "Option::is_none")]
    pub value_uri: Option<String>,
    #[serde(rename = "valueUrl", default, skip_serializing_if = "Option::is_none")]
    pub value_url: Option<String>,
    #[serde(rename = "valueCode", default, skip_serializing_if = "Option::is_none")]
    pub value_code: Option<String>,
    #[serde(rename = "valueCanonical", default, skip_serializing_if = "Option::is_none")]
    pub value_canonical: Option<String>,
    #[serde(rename = "valueBoolean", default, skip_serializing_if = "Option::is_none")]
    pub value_boolean: Option<bool>,
}

impl Extension {
    pub fn string(url: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            value_string: Some(value.into()),
            value_uri: None,
            value_url: None,
            value_code: None,
            value_canonical: None,
            value_boolean: None,
        }
    }

    pub fn string_value(&self) -> Option<&str> {
        self.value_string
            .as_deref()
            .or(self.value_uri.as_deref())
            .or(self.value_url.as_deref())
            .or(self.value_code.as_deref())
            .or(self.value_canonical.as_deref())
    }
}

/// Read access to the extensions carried by a definition.
pub trait HasExtensions {
    fn extensions(&self) -> &[Extension];

    fn has_extension(&self, url: &str) -> bool {
        self.extensions().iter().any(|e| e.url == url)
    }

    fn read_string_extension(&self, url: &str) -> Option<&str> {
        self.extensions()
            .iter()
            .find(|e| e.url == url)
            .and_then(Extension::string_value)
    }
}

impl HasExtensions for StructureDefinition {
    fn extensions(&self) -> &[Extension] {
        self.extension.as_deref().unwrap_or_default()
    }
}

impl HasExtensions for ElementDefinition {
    fn extensions(&self) -> &[Extension] {
        self.extension.as_deref().unwrap_or_default()
    }
}

impl StructureDefinition {
    pub fn new(type_name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            resource_type: structure_definition_resource_type(),
            id: None,
            url: None,
            version: None,
            name: None,
            title: None,
            status: None,
            kind: kind.into(),
            abstract_: None,
            type_name: type_name.into(),
            base_definition: None,
            derivation: None,
            extension: None,
            snapshot: None,
            differential: None,
        }
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    pub fn with_derivation(mut self, derivation: TypeDerivationRule) -> Self {
        self.derivation = Some(derivation);
        self
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extension.get_or_insert_with(Vec::new).push(extension);
        self
    }

    pub fn with_snapshot(mut self, elements: Vec<ElementDefinition>) -> Self {
        self.snapshot = Some(StructureDefinitionSnapshot { element: elements });
        self
    }

    pub fn with_differential(mut self, elements: Vec<ElementDefinition>) -> Self {
        self.differential = Some(StructureDefinitionDifferential { element: elements });
        self
    }

    pub fn url_str(&self) -> Option<&str> {
        self.url.as_ref().map(Url::as_str)
    }

    pub fn is_specialization(&self) -> bool {
        self.derivation == Some(TypeDerivationRule::Specialization)
    }

    /// True for the core data element definitions (`.../StructureDefinition/de-*`).
    pub fn is_data_element(&self) -> bool {
        self.url_str()
            .is_some_and(|u| u.starts_with(&format!("{STRUCTURE_DEFINITION_BASE}de-")))
    }

    pub fn namespace_override(&self) -> Option<&str> {
        self.read_string_extension(EXT_NAMESPACE)
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.as_ref().is_some_and(|s| !s.element.is_empty())
    }

    pub fn snapshot_elements(&self) -> &[ElementDefinition] {
        self.snapshot
            .as_ref()
            .map(|s| s.element.as_slice())
            .unwrap_or_default()
    }

    pub fn element(&self, index: usize) -> Option<&ElementDefinition> {
        self.snapshot_elements().get(index)
    }

    /// Indices of the direct, non-slice children of the element at `parent`.
    pub fn children_of(&self, parent: usize) -> Vec<usize> {
        let Some(parent) = self.element(parent) else {
            return Vec::new();
        };
        let prefix = format!("{}.", parent.path);
        self.snapshot_elements()
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                e.slice_name.is_none()
                    && e.path
                        .strip_prefix(&prefix)
                        .is_some_and(|rest| !rest.is_empty() && !rest.contains('.'))
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Locates an element by id, falling back to path, for `#Path` content references.
    pub fn find_element(&self, reference: &str) -> Option<usize> {
        let key = reference.rsplit_once('#').map_or(reference, |(_, r)| r);
        let elements = self.snapshot_elements();
        elements
            .iter()
            .position(|e| e.id.as_deref() == Some(key))
            .or_else(|| elements.iter().position(|e| e.path == key))
    }

    /// Copy of this definition whose snapshot is its differential.
    pub fn promote_differential(&self) -> crate::Result<Self> {
        let Some(differential) = &self.differential else {
            return Err(crate::ElementModelError::definition(format!(
                "StructureDefinition {} has neither snapshot nor differential",
                self.url_str().unwrap_or(&self.type_name)
            )));
        };
        let mut promoted = self.clone();
        promoted.snapshot = Some(StructureDefinitionSnapshot {
            element: differential.element.clone(),
        });
        Ok(promoted)
    }
}

impl ElementDefinition {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: Some(path.clone()),
            path,
            representation: None,
            slice_name: None,
            short: None,
            definition: None,
            min: None,
            max: None,
            base: None,
            content_reference: None,
            element_type: None,
            extension: None,
            is_modifier: None,
            is_summary: None,
        }
    }

    pub fn with_type(mut self, code: impl Into<String>) -> Self {
        self.element_type
            .get_or_insert_with(Vec::new)
            .push(ElementDefinitionType {
                code: code.into(),
                profile: None,
                target_profile: None,
            });
        self
    }

    pub fn with_cardinality(mut self, min: u32, max: impl Into<String>) -> Self {
        self.min = Some(min);
        self.max = Some(max.into());
        self
    }

    pub fn with_representation(mut self, representation: PropertyRepresentation) -> Self {
        self.representation
            .get_or_insert_with(Vec::new)
            .push(representation);
        self
    }

    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extension.get_or_insert_with(Vec::new).push(extension);
        self
    }

    pub fn with_content_reference(mut self, reference: impl Into<String>) -> Self {
        self.content_reference = Some(reference.into());
        self
    }

    /// Last path segment, e.g. `value[x]` for `Observation.value[x]`.
    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    pub fn is_choice_path(&self) -> bool {
        self.path.ends_with("[x]")
    }

    pub fn type_codes(&self) -> Vec<&str> {
        self.element_type
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|t| t.code.as_str())
            .collect()
    }

    pub fn has_representation(&self, representation: PropertyRepresentation) -> bool {
        self.representation
            .as_deref()
            .is_some_and(|r| r.contains(&representation))
    }

    pub fn base_path(&self) -> Option<&str> {
        self.base.as_ref().map(|b| b.path.as_str())
    }
}
