//! Schema-driven XML reader for the element model.

use std::io::{Read, Write};
use std::sync::Arc;

use crate::convert::{XhtmlElement, cda_to_xhtml, convert_from_external};
use crate::core::{IssueSeverity, IssueType, OutputStyle, ParserConfig, ValidationPolicy};
use crate::elementmodel::{
    Element, ElementModelParser, ParseOutcome, ParseSession, Property, SpecialElement,
    strip_prefix,
};
use crate::error::{ElementModelError, Result};
use crate::storage::SchemaRepository;
use crate::types::{
    ED_DATA_ID, EXT_DATE_FORMAT, EXT_DEFAULT_TYPE, FHIR_NS, HasExtensions, PropertyRepresentation,
    V3_NS, XHTML_NS, XSI_NS,
};
use crate::xml::dom::{XmlAttribute, XmlDocument, XmlElement, XmlNode};
use crate::xml::header::{check_header, valid_attr_value};

/// Reads and writes element-model instances as XML.
///
/// The parser holds nothing but the repository; policy and diagnostics live
/// in a per-call session, so one parser can serve many threads.
#[derive(Clone)]
pub struct XmlParser {
    repository: Arc<dyn SchemaRepository>,
}

impl XmlParser {
    pub fn new(repository: Arc<dyn SchemaRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<dyn SchemaRepository> {
        &self.repository
    }

    /// Parses a document, deriving its definition from the root element's
    /// namespace and name.
    pub fn parse(&self, input: &[u8], config: &ParserConfig) -> Result<ParseOutcome> {
        self.run(input, config, None)
    }

    pub fn parse_reader<R: Read>(&self, mut reader: R, config: &ParserConfig) -> Result<ParseOutcome> {
        let mut input = Vec::new();
        reader.read_to_end(&mut input)?;
        self.parse(&input, config)
    }

    /// Parses a document whose root element is an instance of `type_name`,
    /// whatever the element is called.
    pub fn parse_as(
        &self,
        input: &[u8],
        type_name: &str,
        config: &ParserConfig,
    ) -> Result<ParseOutcome> {
        self.run(input, config, Some(type_name))
    }

    fn run(
        &self,
        input: &[u8],
        config: &ParserConfig,
        root_type: Option<&str>,
    ) -> Result<ParseOutcome> {
        let mut context = ParseContext {
            session: ParseSession::new(config, self.repository.as_ref()),
            version: None,
        };

        if config.tracks_locations() {
            let header = check_header(input);
            if let Some(problem) = header.problem {
                context.session.report(
                    0,
                    0,
                    "XML",
                    IssueType::Invalid,
                    problem,
                    IssueSeverity::Error,
                )?;
            }
            context.version = Some(header.version);
        }

        let document = match XmlDocument::parse(input, config.tracks_locations()) {
            Ok(document) => document,
            Err(e) => {
                context.session.report(
                    0,
                    0,
                    "(syntax)",
                    IssueType::Invalid,
                    e.detail(),
                    IssueSeverity::Fatal,
                )?;
                return Ok(ParseOutcome {
                    element: None,
                    diagnostics: context.session.into_diagnostics(),
                });
            }
        };

        let element = context.parse_document(&document, root_type)?;
        Ok(ParseOutcome {
            element,
            diagnostics: context.session.into_diagnostics(),
        })
    }
}

impl ElementModelParser for XmlParser {
    fn parse(&self, input: &[u8], config: &ParserConfig) -> Result<ParseOutcome> {
        XmlParser::parse(self, input, config)
    }

    fn compose(
        &self,
        element: &Element,
        output: &mut dyn Write,
        style: OutputStyle,
        config: &ParserConfig,
    ) -> Result<()> {
        XmlParser::compose(self, element, output, style, config)
    }
}

struct ParseContext<'a> {
    session: ParseSession<'a>,
    /// XML version sniffed from the prolog in diagnostics mode.
    version: Option<String>,
}

impl ParseContext<'_> {
    fn parse_document(
        &mut self,
        document: &XmlDocument,
        root_type: Option<&str>,
    ) -> Result<Option<Element>> {
        let (Some(root), Some(position)) = (document.root(), document.root_position()) else {
            return Ok(None);
        };
        self.check_processing_instructions(document, root)?;

        let (line, column) = position_of(root);
        let path = format!("/{}{}", path_prefix(root.namespace.as_deref()), root.local_name);
        let definition = match root_type {
            Some(type_name) => {
                self.session
                    .resolve_root_definition(line, column, Some(FHIR_NS), Some(type_name))?
            }
            None => self.session.resolve_root_definition(
                line,
                column,
                root.namespace.as_deref(),
                Some(&root.local_name),
            )?,
        };
        let Some(definition) = definition else {
            return Ok(None);
        };

        let mut result =
            Element::new(root.local_name.clone(), Property::root(definition)?).located(root.location);
        self.check_element(root, &path, &result.property)?;
        result.set_type(root_type.unwrap_or(root.local_name.as_str()));
        self.parse_children(&path, root, &document.nodes, position, &mut result)?;
        result.number_children();
        Ok(Some(result))
    }

    fn check_processing_instructions(
        &mut self,
        document: &XmlDocument,
        root: &XmlElement,
    ) -> Result<()> {
        if self.session.policy() != ValidationPolicy::Everything
            || root.namespace.as_deref() != Some(FHIR_NS)
        {
            return Ok(());
        }
        let count = document
            .nodes
            .iter()
            .filter(|n| matches!(n, XmlNode::ProcessingInstruction(_)))
            .count();
        for _ in 0..count {
            self.session.report(
                0,
                0,
                "(document)",
                IssueType::Invalid,
                "No processing instructions allowed in resources",
                IssueSeverity::Error,
            )?;
        }
        Ok(())
    }

    fn check_element(&mut self, node: &XmlElement, path: &str, property: &Property) -> Result<()> {
        if self.session.policy() != ValidationPolicy::Everything {
            return Ok(());
        }
        let (line, column) = position_of(node);
        if node.is_empty() && node.namespace.as_deref() == Some(FHIR_NS) {
            self.session.report(
                line,
                column,
                path,
                IssueType::Invalid,
                "Element must have some content",
                IssueSeverity::Error,
            )?;
        }
        let expected = property.namespace();
        if node.namespace.as_deref() != Some(expected) {
            self.session.report(
                line,
                column,
                path,
                IssueType::Invalid,
                format!("Wrong namespace - expected '{expected}'"),
                IssueSeverity::Error,
            )?;
        }
        Ok(())
    }

    /// Descends into `node`, which sits at `position` among `siblings`,
    /// appending what it finds to `element` in document order.
    fn parse_children(
        &mut self,
        path: &str,
        node: &XmlElement,
        siblings: &[XmlNode],
        position: usize,
        element: &mut Element,
    ) -> Result<()> {
        reap_comments(node, siblings, position, element);
        let properties = element.property.child_properties(
            self.session.repository(),
            &element.name,
            node.xsi_type(),
        )?;
        let (line, column) = position_of(node);

        let text = node.direct_text();
        let text = text.trim();
        if !text.is_empty() {
            match text_property(&properties) {
                Some(property) => {
                    let child = if is_ed_data(property) {
                        if node.attribute("representation") == Some("B64") {
                            Element::with_value("dataBase64Binary", property.clone(), "base64Binary", text)
                        } else {
                            Element::with_value("dataString", property.clone(), "string", text)
                        }
                    } else {
                        Element::with_value(property.name(), property.clone(), property.type_name(), text)
                    };
                    element.children.push(child.located(node.location));
                }
                None => self.session.report(
                    line,
                    column,
                    path,
                    IssueType::Structure,
                    "Text should not be present",
                    IssueSeverity::Error,
                )?,
            }
        }

        for attr in &node.attributes {
            if !valid_attr_value(self.version.as_deref(), &attr.value) {
                self.session.report(
                    line,
                    column,
                    path,
                    IssueType::Structure,
                    format!(
                        "The attribute '{}' contains an illegal character",
                        attr.qualified_name()
                    ),
                    IssueSeverity::Error,
                )?;
            }
            if attr.is_namespace_declaration() {
                continue;
            }
            let qualified = attr.qualified_name();
            match attribute_property(&properties, &qualified) {
                Some(property) => {
                    let value = self.external_value(property, &attr.value, line, column, path)?;
                    if property.name() == "value" && element.is_primitive() {
                        element.value = Some(value);
                    } else {
                        element.children.push(
                            Element::with_value(property.name(), property.clone(), property.type_name(), value)
                                .located(node.location),
                        );
                    }
                }
                None if self.attribute_allowed(node, attr, element) => {}
                None => {
                    let names: Vec<&str> = properties.iter().map(Property::name).collect();
                    self.session.report(
                        line,
                        column,
                        path,
                        IssueType::Structure,
                        format!(
                            "Undefined attribute '@{}' on {} for type {} (properties = [{}])",
                            qualified,
                            node.qualified_name(),
                            element.fhir_type(),
                            names.join(", ")
                        ),
                        IssueSeverity::Error,
                    )?;
                }
            }
        }

        for (index, child) in node.children.iter().enumerate() {
            match child {
                XmlNode::Element(child_node) => {
                    self.parse_child_element(path, node, index, child_node, &properties, element)?;
                }
                XmlNode::CData(_) => self.session.report(
                    line,
                    column,
                    path,
                    IssueType::Structure,
                    "CDATA is not allowed",
                    IssueSeverity::Error,
                )?,
                XmlNode::ProcessingInstruction(_) => self.session.report(
                    line,
                    column,
                    path,
                    IssueType::Structure,
                    "Node type 7 is not allowed",
                    IssueSeverity::Error,
                )?,
                XmlNode::Text(_) | XmlNode::Comment(_) => {}
            }
        }
        Ok(())
    }

    fn parse_child_element(
        &mut self,
        path: &str,
        parent: &XmlElement,
        index: usize,
        child: &XmlElement,
        properties: &[Property],
        element: &mut Element,
    ) -> Result<()> {
        let (line, column) = position_of(child);
        let Some(property) = element_property(properties, &child.local_name) else {
            return self.session.report(
                line,
                column,
                path,
                IssueType::Structure,
                format!("Undefined element '{}'", child.local_name),
                IssueSeverity::Error,
            );
        };

        if !property.is_choice() && property.type_name() == "xhtml" {
            let xhtml = if property.has_representation(PropertyRepresentation::CdaText) {
                cda_to_xhtml(child)?
            } else {
                XhtmlElement::from_dom(child)
            };
            let markup = xhtml.compose()?;
            element.children.push(
                Element::with_value(property.name(), property.clone(), "xhtml", markup)
                    .with_xhtml(xhtml)
                    .located(child.location),
            );
            return Ok(());
        }

        let npath = format!(
            "{}/{}{}",
            path,
            path_prefix(child.namespace.as_deref()),
            child.local_name
        );
        let mut n = Element::new(child.local_name.clone(), property.clone()).located(child.location);
        self.check_element(child, &npath, &n.property)?;

        let mut descend = true;
        if property.is_choice() {
            if property.has_representation(PropertyRepresentation::TypeAttr) {
                match child.xsi_type() {
                    Some(xsi_type) => {
                        let type_name = strip_prefix(xsi_type);
                        n.set_type(type_name);
                        n.explicit_type = Some(type_name.to_string());
                    }
                    None => match property.definition().read_string_extension(EXT_DEFAULT_TYPE) {
                        Some(default) => n.set_type(default),
                        None => {
                            self.session.report(
                                line,
                                column,
                                path,
                                IssueType::Structure,
                                format!("No type found on '{}'", child.local_name),
                                IssueSeverity::Error,
                            )?;
                            descend = false;
                        }
                    },
                }
            } else if let Some(type_name) = concrete_choice_type(property, &child.local_name) {
                n.set_type(type_name.clone());
                n.explicit_type = Some(type_name);
            }
        }

        if descend {
            if property.is_resource() {
                self.parse_resource(&npath, child, &parent.children, index, &mut n, property)?;
            } else {
                self.parse_children(&npath, child, &parent.children, index, &mut n)?;
            }
        }
        element.children.push(n);
        Ok(())
    }

    /// Rebinds `parent` to the definition of the resource held inside `container`.
    fn parse_resource(
        &mut self,
        path: &str,
        container: &XmlElement,
        siblings: &[XmlNode],
        position: usize,
        parent: &mut Element,
        element_property: &Property,
    ) -> Result<()> {
        let Some((index, resource)) =
            container
                .children
                .iter()
                .enumerate()
                .find_map(|(i, n)| match n {
                    XmlNode::Element(e) => Some((i, e)),
                    _ => None,
                })
        else {
            let (line, column) = position_of(container);
            return self.session.report(
                line,
                column,
                path,
                IssueType::Structure,
                format!("Element '{}' must contain a resource", container.local_name),
                IssueSeverity::Error,
            );
        };

        let (line, column) = position_of(resource);
        let Some(definition) =
            self.session
                .resolve_definition_by_name(line, column, Some(&resource.local_name))?
        else {
            return Ok(());
        };

        let special = SpecialElement::from_property(&parent.property);
        parent.update_property(Property::root(definition)?, special, element_property.clone());
        parent.set_type(resource.local_name.clone());
        tracing::debug!(
            "Rebound {} at {} to {} ({:?})",
            parent.name,
            path,
            resource.local_name,
            special
        );

        let rpath = format!(
            "{}/{}{}",
            path,
            path_prefix(resource.namespace.as_deref()),
            resource.local_name
        );
        self.parse_children(&rpath, resource, &container.children, index, parent)?;

        let mut leading = preceding_comments(siblings, position);
        leading.append(&mut parent.comments);
        parent.comments = leading;
        Ok(())
    }

    /// Converts an attribute value declared in an external date format.
    /// A value that does not parse is reported and kept as written.
    fn external_value(
        &mut self,
        property: &Property,
        value: &str,
        line: usize,
        column: usize,
        path: &str,
    ) -> Result<String> {
        let Some(format) = property.definition().read_string_extension(EXT_DATE_FORMAT) else {
            return Ok(value.to_string());
        };
        match convert_from_external(format, value) {
            Ok(converted) => Ok(converted),
            Err(ElementModelError::Conversion { message }) => {
                self.session.report(
                    line,
                    column,
                    path,
                    IssueType::Invalid,
                    message,
                    IssueSeverity::Error,
                )?;
                Ok(value.to_string())
            }
            Err(e) => Err(e),
        }
    }

    fn attribute_allowed(&self, node: &XmlElement, attr: &XmlAttribute, element: &Element) -> bool {
        let is_xsi = attr.namespace.as_deref() == Some(XSI_NS);
        let location_allowed = if node.namespace.as_deref() == Some(FHIR_NS) {
            is_xsi
                && attr.local_name == "schemaLocation"
                && self.session.config().allow_xsi_location
        } else {
            attr.local_name == "schemaLocation"
        };
        location_allowed || (is_xsi && attr.local_name == "type" && element.needs_type_attr())
    }
}

fn position_of(node: &XmlElement) -> (usize, usize) {
    node.location.map_or((0, 0), |l| (l.line, l.column))
}

/// Prefix used for a namespace in diagnostic paths.
fn path_prefix(namespace: Option<&str>) -> &'static str {
    match namespace {
        None | Some("") => "",
        Some(FHIR_NS) => "f:",
        Some(XHTML_NS) => "h:",
        Some(V3_NS) => "v3:",
        Some(_) => "?:",
    }
}

fn is_ed_data(property: &Property) -> bool {
    let definition = property.definition();
    definition.id.as_deref() == Some(ED_DATA_ID)
        || definition.base.as_ref().is_some_and(|b| b.path == ED_DATA_ID)
}

fn concrete_choice_type(property: &Property, element_name: &str) -> Option<String> {
    if property.type_name().is_empty() {
        property.choice_suffix(element_name)
    } else {
        Some(property.type_name().to_string())
    }
}

/// Candidate for a child element, longest field name first so that
/// `valueQuantity` wins over `value[x]`. Equal lengths keep schema order.
fn element_property<'p>(properties: &'p [Property], node_name: &str) -> Option<&'p Property> {
    let mut sorted: Vec<&Property> = properties.iter().collect();
    sorted.sort_by(|a, b| b.name().len().cmp(&a.name().len()));
    sorted
        .into_iter()
        .filter(|p| {
            !p.has_representation(PropertyRepresentation::XmlAttr)
                && !p.has_representation(PropertyRepresentation::XmlText)
        })
        .find(|p| {
            let name = p.name();
            name == node_name
                || name.strip_suffix("[x]").is_some_and(|base| {
                    node_name.len() > base.len() && node_name.starts_with(base)
                })
        })
}

fn attribute_property<'p>(properties: &'p [Property], qualified: &str) -> Option<&'p Property> {
    properties
        .iter()
        .find(|p| p.name() == qualified && p.has_representation(PropertyRepresentation::XmlAttr))
}

fn text_property(properties: &[Property]) -> Option<&Property> {
    properties
        .iter()
        .find(|p| p.has_representation(PropertyRepresentation::XmlText))
}

/// Comments between the previous element sibling and the node at `position`.
fn preceding_comments(siblings: &[XmlNode], position: usize) -> Vec<String> {
    let before = siblings.get(..position).unwrap_or_default();
    let mut comments: Vec<String> = before
        .iter()
        .rev()
        .take_while(|n| !matches!(n, XmlNode::Element(_)))
        .filter_map(|n| match n {
            XmlNode::Comment(c) => Some(c.clone()),
            _ => None,
        })
        .collect();
    comments.reverse();
    comments
}

/// Attaches to `element` the comments that precede `node` and the comments
/// that follow its last child element.
fn reap_comments(node: &XmlElement, siblings: &[XmlNode], position: usize, element: &mut Element) {
    let mut leading = preceding_comments(siblings, position);
    leading.append(&mut element.comments);
    element.comments = leading;

    if let Some(last) = node
        .children
        .iter()
        .rposition(|n| matches!(n, XmlNode::Element(_)))
    {
        element
            .comments
            .extend(node.children[last..].iter().filter_map(|n| match n {
                XmlNode::Comment(c) => Some(c.clone()),
                _ => None,
            }));
    }
}
