use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::convert::XhtmlElement;
use crate::elementmodel::{Property, Representation};
use crate::types::FhirTypeDefinitions;

/// Source position of a node, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// Kind of containment boundary an element sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialElement {
    Contained,
    BundleEntry,
    BundleOutcome,
    Parameter,
}

impl SpecialElement {
    /// Classifies the boundary from the field that holds the embedded resource.
    pub fn from_property(container: &Property) -> Self {
        let owner = container.structure().type_name.as_str();
        match (owner, container.name()) {
            ("Parameters", _) => SpecialElement::Parameter,
            ("Bundle", "resource") => SpecialElement::BundleEntry,
            ("Bundle", "outcome") => SpecialElement::BundleOutcome,
            _ => SpecialElement::Contained,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecorationType {
    Type,
    Slice,
    Hint,
    Warning,
    Error,
}

/// Presentation hint attached to an element and surfaced by decorating sinks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDecoration {
    pub kind: DecorationType,
    pub link: Option<String>,
    pub text: String,
}

impl ElementDecoration {
    pub fn new(kind: DecorationType, link: Option<String>, text: impl Into<String>) -> Self {
        Self {
            kind,
            link,
            text: text.into(),
        }
    }
}

/// A node of the instance tree, bound to the field it represents.
#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    /// Concrete type when it differs from, or refines, the property's type.
    pub type_name: Option<String>,
    /// Type named explicitly on the wire (`xsi:type` or a choice suffix).
    pub explicit_type: Option<String>,
    pub value: Option<String>,
    pub children: Vec<Element>,
    pub property: Property,
    /// The container field, kept when the element was rebound at a containment boundary.
    pub element_property: Option<Property>,
    pub comments: Vec<String>,
    pub location: Option<Location>,
    pub special: Option<SpecialElement>,
    pub index: Option<usize>,
    pub xhtml: Option<XhtmlElement>,
    pub decorations: Vec<ElementDecoration>,
}

impl Element {
    pub fn new(name: impl Into<String>, property: Property) -> Self {
        Self {
            name: name.into(),
            type_name: None,
            explicit_type: None,
            value: None,
            children: Vec::new(),
            property,
            element_property: None,
            comments: Vec::new(),
            location: None,
            special: None,
            index: None,
            xhtml: None,
            decorations: Vec::new(),
        }
    }

    pub fn with_value(
        name: impl Into<String>,
        property: Property,
        type_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let mut element = Self::new(name, property);
        element.type_name = Some(type_name.into());
        element.value = Some(value.into());
        element
    }

    pub fn located(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    pub fn with_xhtml(mut self, xhtml: XhtmlElement) -> Self {
        self.xhtml = Some(xhtml);
        self
    }

    /// Effective type: the element's own type, else the property's.
    pub fn fhir_type(&self) -> &str {
        self.type_name
            .as_deref()
            .unwrap_or_else(|| self.property.type_name())
    }

    pub fn set_type(&mut self, type_name: impl Into<String>) {
        self.type_name = Some(type_name.into());
    }

    pub fn is_primitive(&self) -> bool {
        FhirTypeDefinitions::is_primitive(self.fhir_type())
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn has_value(&self) -> bool {
        self.value.as_deref().is_some_and(|v| !v.is_empty())
    }

    /// Rebinds the element at a containment boundary.
    pub fn update_property(
        &mut self,
        property: Property,
        special: SpecialElement,
        element_property: Property,
    ) {
        self.property = property;
        self.special = Some(special);
        self.element_property = Some(element_property);
    }

    /// Numbers every descendant by its occurrence among same-named siblings.
    pub fn number_children(&mut self) {
        let mut seen: HashMap<String, usize> = HashMap::new();
        for child in &mut self.children {
            let count = seen.entry(child.name.clone()).or_insert(0);
            child.index = Some(*count);
            *count += 1;
            child.number_children();
        }
    }

    /// True when this element or a descendant is bound to a field carried in `xsi:type`.
    pub fn needs_type_attr(&self) -> bool {
        self.property.representation() == Representation::TypeAttr
            || self.children.iter().any(Element::needs_type_attr)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_value(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(|c| c.value.as_deref())
    }

    /// Compares names, types, values, comments and children, ignoring
    /// source locations and bindings.
    pub fn content_equals(&self, other: &Element) -> bool {
        self.name == other.name
            && self.fhir_type() == other.fhir_type()
            && self.value == other.value
            && self.comments == other.comments
            && self.special == other.special
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.content_equals(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ElementDefinition, StructureDefinition};
    use std::sync::Arc;

    fn bundle_property(name: &str) -> Property {
        let sd = Arc::new(StructureDefinition::new("Bundle", "resource").with_snapshot(vec![
            ElementDefinition::new("Bundle"),
            ElementDefinition::new("Bundle.entry").with_type("BackboneElement"),
            ElementDefinition::new(format!("Bundle.entry.{name}")).with_type("Resource"),
        ]));
        Property::new(sd, 2).unwrap()
    }

    #[test]
    fn test_special_from_property() {
        assert_eq!(
            SpecialElement::from_property(&bundle_property("resource")),
            SpecialElement::BundleEntry
        );
        assert_eq!(
            SpecialElement::from_property(&bundle_property("outcome")),
            SpecialElement::BundleOutcome
        );
        assert_eq!(
            SpecialElement::from_property(&bundle_property("other")),
            SpecialElement::Contained
        );
    }

    #[test]
    fn test_number_children() {
        let property = bundle_property("resource");
        let mut root = Element::new("Bundle", property.clone());
        for name in ["entry", "id", "entry", "entry"] {
            root.children.push(Element::new(name, property.clone()));
        }
        root.number_children();
        let indices: Vec<_> = root.children.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![Some(0), Some(0), Some(1), Some(2)]);
        assert_eq!(root.children_named("entry").count(), 3);
    }

    #[test]
    fn test_type_and_value() {
        let property = bundle_property("resource");
        let element = Element::with_value("active", property.clone(), "boolean", "true");
        assert!(element.is_primitive());
        assert!(element.has_value());
        assert_eq!(element.fhir_type(), "boolean");

        let empty = Element::with_value("active", property, "boolean", "");
        assert!(!empty.has_value());
    }
}
