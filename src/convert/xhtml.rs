use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use serde::{Deserialize, Serialize};

use crate::error::{ElementModelError, Result};
use crate::types::XHTML_NS;
use crate::xml::dom::{XmlDocument, XmlElement, XmlNode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum XhtmlNode {
    Element(XhtmlElement),
    Text(String),
    Comment(String),
}

/// A narrative fragment held alongside its serialized markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XhtmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XhtmlNode>,
}

impl XhtmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Builds the fragment from a DOM element, dropping namespace declarations.
    pub fn from_dom(element: &XmlElement) -> Self {
        let attributes = element
            .attributes
            .iter()
            .filter(|a| !a.is_namespace_declaration())
            .map(|a| (a.qualified_name(), a.value.clone()))
            .collect();
        let children = element
            .children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Element(e) => Some(XhtmlNode::Element(Self::from_dom(e))),
                XmlNode::Text(t) | XmlNode::CData(t) => Some(XhtmlNode::Text(t.clone())),
                XmlNode::Comment(c) => Some(XhtmlNode::Comment(c.clone())),
                XmlNode::ProcessingInstruction(_) => None,
            })
            .collect();
        Self {
            name: element.local_name.clone(),
            attributes,
            children,
        }
    }

    pub fn parse(markup: &str) -> Result<Self> {
        let document = XmlDocument::parse_str(markup, false)?;
        let root = document
            .root()
            .ok_or_else(|| ElementModelError::conversion("Narrative markup has no element"))?;
        Ok(Self::from_dom(root))
    }

    /// Serializes the fragment; the outermost element declares the XHTML namespace.
    pub fn compose(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write(&mut writer, true)?;
        String::from_utf8(writer.into_inner())
            .map_err(|e| ElementModelError::conversion(format!("Narrative is not UTF-8: {e}")))
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>, root: bool) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        if root && self.attribute("xmlns").is_none() {
            start.push_attribute(("xmlns", XHTML_NS));
        }
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }
        writer.write_event(Event::Start(start))?;
        for child in &self.children {
            match child {
                XhtmlNode::Element(e) => e.write(writer, false)?,
                XhtmlNode::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
                XhtmlNode::Comment(c) => {
                    writer.write_event(Event::Comment(BytesText::from_escaped(c.as_str())))?
                }
            }
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_compose() {
        let xhtml =
            XhtmlElement::parse(r#"<div xmlns="http://www.w3.org/1999/xhtml"><p class="x">a &amp; b</p><br/></div>"#)
                .unwrap();
        assert_eq!(xhtml.name, "div");
        assert!(xhtml.attribute("xmlns").is_none());
        assert_eq!(
            xhtml.compose().unwrap(),
            r#"<div xmlns="http://www.w3.org/1999/xhtml"><p class="x">a &amp; b</p><br/></div>"#
        );
    }

    #[test]
    fn test_namespace_added() {
        let mut div = XhtmlElement::new("div");
        div.children.push(XhtmlNode::Text("hi".to_string()));
        assert_eq!(
            div.compose().unwrap(),
            r#"<div xmlns="http://www.w3.org/1999/xhtml">hi</div>"#
        );
    }
}
