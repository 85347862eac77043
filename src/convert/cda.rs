//! Mapping between CDA narrative blocks and XHTML.

use crate::convert::{XhtmlElement, XhtmlNode};
use crate::error::{ElementModelError, Result};
use crate::xml::dom::{XmlElement, XmlNode};
use crate::xml::writer::XmlSink;

const SHARED_ELEMENTS: &[&str] = &[
    "table", "thead", "tbody", "tfoot", "tr", "th", "td", "caption", "col", "colgroup", "br",
    "sub", "sup",
];

fn cda_to_html_name(element: &XmlElement) -> Result<String> {
    let name = element.local_name.as_str();
    let mapped = match name {
        "paragraph" => "p",
        "content" => "span",
        "item" => "li",
        "linkHtml" => "a",
        "list" => {
            if element.attribute("listType") == Some("ordered") {
                "ol"
            } else {
                "ul"
            }
        }
        "footnote" | "footnoteRef" | "renderMultiMedia" => "span",
        other if SHARED_ELEMENTS.contains(&other) => other,
        other => {
            return Err(ElementModelError::conversion(format!(
                "Unknown CDA narrative element '{other}'"
            )));
        }
    };
    Ok(mapped.to_string())
}

fn html_to_cda_name(name: &str) -> &str {
    match name {
        "p" => "paragraph",
        "span" => "content",
        "li" => "item",
        "a" => "linkHtml",
        "ul" | "ol" => "list",
        other => other,
    }
}

/// Converts a CDA narrative block into an XHTML `div`.
pub fn cda_to_xhtml(block: &XmlElement) -> Result<XhtmlElement> {
    let mut div = XhtmlElement::new("div");
    div.attributes = cda_attributes(block);
    div.children = cda_children(block)?;
    Ok(div)
}

fn cda_attributes(element: &XmlElement) -> Vec<(String, String)> {
    element
        .attributes
        .iter()
        .filter(|a| !a.is_namespace_declaration() && a.namespace.is_none())
        .filter_map(|a| match a.local_name.as_str() {
            "listType" => None,
            "styleCode" => Some(("class".to_string(), a.value.clone())),
            "ID" => Some(("id".to_string(), a.value.clone())),
            other => Some((other.to_string(), a.value.clone())),
        })
        .collect()
}

fn cda_children(element: &XmlElement) -> Result<Vec<XhtmlNode>> {
    let mut children = Vec::with_capacity(element.children.len());
    for node in &element.children {
        match node {
            XmlNode::Element(child) => {
                let mut html = XhtmlElement::new(cda_to_html_name(child)?);
                html.attributes = cda_attributes(child);
                html.children = cda_children(child)?;
                children.push(XhtmlNode::Element(html));
            }
            XmlNode::Text(t) | XmlNode::CData(t) => children.push(XhtmlNode::Text(t.clone())),
            XmlNode::Comment(c) => children.push(XhtmlNode::Comment(c.clone())),
            XmlNode::ProcessingInstruction(_) => {}
        }
    }
    Ok(children)
}

/// Writes an XHTML `div` to the sink as a CDA narrative block named `name`.
pub fn xhtml_to_cda(sink: &mut dyn XmlSink, name: &str, div: &XhtmlElement) -> Result<()> {
    write_cda_attributes(sink, div)?;
    if div.children.is_empty() {
        return sink.element(name);
    }
    sink.enter(name)?;
    write_cda_children(sink, &div.children)?;
    sink.exit(name)
}

fn write_cda_attributes(sink: &mut dyn XmlSink, element: &XhtmlElement) -> Result<()> {
    if element.name == "ol" {
        sink.attribute("listType", "ordered")?;
    }
    for (key, value) in &element.attributes {
        let key = match key.as_str() {
            "class" => "styleCode",
            "id" => "ID",
            "xmlns" => continue,
            other => other,
        };
        sink.attribute(key, value)?;
    }
    Ok(())
}

fn write_cda_children(sink: &mut dyn XmlSink, children: &[XhtmlNode]) -> Result<()> {
    for child in children {
        match child {
            XhtmlNode::Element(e) => {
                let name = html_to_cda_name(&e.name);
                write_cda_attributes(sink, e)?;
                if e.children.is_empty() {
                    sink.element(name)?;
                } else {
                    sink.enter(name)?;
                    write_cda_children(sink, &e.children)?;
                    sink.exit(name)?;
                }
            }
            XhtmlNode::Text(t) => sink.text(t)?,
            XhtmlNode::Comment(c) => sink.comment(c)?,
        }
    }
    Ok(())
}
