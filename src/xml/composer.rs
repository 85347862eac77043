//! Writes element-model trees back to XML.

use std::io::Write;

use crate::convert::{XhtmlElement, convert_to_external, xhtml_to_cda};
use crate::core::{OutputStyle, ParserConfig};
use crate::elementmodel::{Element, Property, Representation};
use crate::error::{ElementModelError, Result};
use crate::types::{EXT_DATE_FORMAT, HasExtensions, XSI_NS};
use crate::xml::parser::XmlParser;
use crate::xml::writer::{XmlSink, XmlWriter};

impl XmlParser {
    /// Writes `element` as a document with an XML declaration.
    pub fn compose<W: Write>(
        &self,
        element: &Element,
        output: W,
        style: OutputStyle,
        config: &ParserConfig,
    ) -> Result<()> {
        let writer = match style {
            OutputStyle::Normal => XmlWriter::new(output),
            OutputStyle::Pretty => XmlWriter::pretty(output),
        };
        let mut writer = writer.with_declaration(true);
        self.compose_to_sink(element, &mut writer, config)
    }

    pub fn compose_to_string(
        &self,
        element: &Element,
        style: OutputStyle,
        config: &ParserConfig,
    ) -> Result<String> {
        let mut output = Vec::new();
        self.compose(element, &mut output, style, config)?;
        String::from_utf8(output)
            .map_err(|e| ElementModelError::format(format!("Composed output is not UTF-8: {e}")))
    }

    /// Writes `element` to any sink. The root property's namespace becomes
    /// the default namespace; `xsi` is declared only when some node carries
    /// its type in `xsi:type`.
    pub fn compose_to_sink(
        &self,
        element: &Element,
        sink: &mut dyn XmlSink,
        config: &ParserConfig,
    ) -> Result<()> {
        sink.start()?;
        sink.set_default_namespace(element.property.namespace())?;
        if element.needs_type_attr() {
            sink.namespace(XSI_NS, "xsi")?;
        }
        compose_element(sink, config, element, &element.name, true)?;
        sink.end()
    }
}

fn compose_element(
    sink: &mut dyn XmlSink,
    config: &ParserConfig,
    element: &Element,
    name: &str,
    root: bool,
) -> Result<()> {
    if config.show_decorations {
        for decoration in &element.decorations {
            sink.decorate(decoration)?;
        }
    }
    for comment in &element.comments {
        sink.comment(comment)?;
    }

    let representation = element.property.representation();
    let value = element.value.as_deref().unwrap_or_default();

    if representation == Representation::Text {
        link_property(sink, config, &element.property)?;
        sink.enter(name)?;
        sink.text(value)?;
        return sink.exit(name);
    }

    if !element.has_children() && !element.has_value() {
        if representation == Representation::TypeAttr {
            if let Some(explicit) = &element.explicit_type {
                sink.attribute("xsi:type", explicit)?;
            }
        }
        return sink.element(name);
    }

    if element.is_primitive() {
        compose_primitive(sink, config, element, name, representation, value)
    } else {
        compose_complex(sink, config, element, name, representation, root)
    }
}

fn compose_primitive(
    sink: &mut dyn XmlSink,
    config: &ParserConfig,
    element: &Element,
    name: &str,
    representation: Representation,
    value: &str,
) -> Result<()> {
    if element.fhir_type() == "xhtml" {
        if representation == Representation::CdaText {
            let xhtml = match &element.xhtml {
                Some(xhtml) => xhtml.clone(),
                None => XhtmlElement::parse(value)?,
            };
            return xhtml_to_cda(sink, name, &xhtml);
        }
        sink.escaped_text(value)?;
        return sink.anchor("end-xhtml");
    }

    write_type_attribute(sink, element, representation)?;
    if element.has_value() {
        link_type(sink, config, element.fhir_type())?;
        sink.attribute("value", value)?;
    }
    write_attribute_children(sink, config, element)?;
    link_property(sink, config, &element.property)?;

    let content: Vec<&Element> = element.children.iter().filter(|c| !is_attribute(c)).collect();
    if content.is_empty() {
        return sink.element(name);
    }
    sink.enter(name)?;
    for child in content {
        compose_element(sink, config, child, &child.name, false)?;
    }
    sink.exit(name)
}

fn compose_complex(
    sink: &mut dyn XmlSink,
    config: &ParserConfig,
    element: &Element,
    name: &str,
    representation: Representation,
    root: bool,
) -> Result<()> {
    write_type_attribute(sink, element, representation)?;
    write_attribute_children(sink, config, element)?;
    link_property(sink, config, &element.property)?;

    let boundary = !root && element.special.is_some();
    if !boundary && element.children.iter().all(is_attribute) {
        return sink.element(name);
    }

    sink.enter(name)?;
    if boundary {
        link_property(sink, config, &element.property)?;
        sink.enter(element.fhir_type())?;
    }
    for child in &element.children {
        match child.property.representation() {
            Representation::Attribute => {}
            Representation::Text => {
                link_property(sink, config, &element.property)?;
                sink.text(child.value.as_deref().unwrap_or_default())?;
            }
            _ => compose_element(sink, config, child, &child.name, false)?,
        }
    }
    if boundary {
        sink.exit(element.fhir_type())?;
    }
    sink.exit(name)
}

fn is_attribute(element: &Element) -> bool {
    element.property.representation() == Representation::Attribute
}

fn write_type_attribute(
    sink: &mut dyn XmlSink,
    element: &Element,
    representation: Representation,
) -> Result<()> {
    let type_name = element.fhir_type();
    if representation == Representation::TypeAttr && !type_name.is_empty() {
        sink.attribute("xsi:type", type_name)?;
    }
    Ok(())
}

/// Attribute-represented children, converted back to their external date
/// format where the field declares one.
fn write_attribute_children(
    sink: &mut dyn XmlSink,
    config: &ParserConfig,
    element: &Element,
) -> Result<()> {
    for child in element.children.iter().filter(|c| is_attribute(c)) {
        link_type(sink, config, child.fhir_type())?;
        let value = child.value.as_deref().unwrap_or_default();
        match child
            .property
            .definition()
            .read_string_extension(EXT_DATE_FORMAT)
        {
            Some(format) => sink.attribute(&child.name, &convert_to_external(format, value)?)?,
            None => sink.attribute(&child.name, value)?,
        }
    }
    Ok(())
}

fn link_property(sink: &mut dyn XmlSink, config: &ParserConfig, property: &Property) -> Result<()> {
    match &config.link_resolver {
        Some(resolver) => sink.link(resolver.resolve_property(property).as_deref()),
        None => Ok(()),
    }
}

fn link_type(sink: &mut dyn XmlSink, config: &ParserConfig, type_name: &str) -> Result<()> {
    match &config.link_resolver {
        Some(resolver) => sink.link(resolver.resolve_type(type_name).as_deref()),
        None => Ok(()),
    }
}
