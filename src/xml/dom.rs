//! A small namespace-aware DOM built from `quick_xml` events.
//!
//! Ingest is hardened: document type declarations are refused, and the only
//! entity references resolved are the five predefined ones and character
//! references. Anything else is a syntax error.

use quick_xml::NsReader;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;

use crate::elementmodel::Location;
use crate::error::{ElementModelError, Result};
use crate::types::XSI_NS;

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";
const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";

/// Deepest element nesting accepted on ingest.
pub const MAX_DEPTH: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    pub prefix: Option<String>,
    pub local_name: String,
    pub namespace: Option<String>,
    pub value: String,
}

impl XmlAttribute {
    /// Name as written, e.g. `xsi:type`.
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local_name),
            None => self.local_name.clone(),
        }
    }

    pub fn is_namespace_declaration(&self) -> bool {
        self.namespace.as_deref() == Some(XMLNS_NS)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub prefix: Option<String>,
    pub local_name: String,
    pub namespace: Option<String>,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlNode>,
    pub location: Option<Location>,
}

impl XmlElement {
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.local_name),
            None => self.local_name.clone(),
        }
    }

    /// Value of an attribute without a namespace.
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    pub fn attribute_ns(&self, namespace: &str, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == Some(namespace) && a.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// `xsi:type`, when present and non-empty.
    pub fn xsi_type(&self) -> Option<&str> {
        self.attribute_ns(XSI_NS, "type").filter(|t| !t.is_empty())
    }

    pub fn element_children(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn first_element_child(&self) -> Option<&XmlElement> {
        self.element_children().next()
    }

    /// Concatenation of the text nodes directly under this element.
    pub fn direct_text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                XmlNode::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// All character data below this element.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// No attributes other than namespace declarations, no text, no child elements.
    pub fn is_empty(&self) -> bool {
        self.attributes.iter().all(XmlAttribute::is_namespace_declaration)
            && self.text_content().trim().is_empty()
            && self.first_element_child().is_none()
    }
}

fn collect_text(nodes: &[XmlNode], out: &mut String) {
    for node in nodes {
        match node {
            XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
            XmlNode::Element(e) => collect_text(&e.children, out),
            _ => {}
        }
    }
}

/// A parsed document: the top-level nodes, exactly one of which is an element.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub nodes: Vec<XmlNode>,
}

impl XmlDocument {
    /// Parses a document from bytes. A UTF-8 byte order mark is skipped.
    pub fn parse(input: &[u8], track_locations: bool) -> Result<Self> {
        let input = input.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(input);
        let text = std::str::from_utf8(input)
            .map_err(|e| ElementModelError::format(format!("Invalid UTF-8 content: {e}")))?;
        Self::parse_str(text, track_locations)
    }

    pub fn parse_str(input: &str, track_locations: bool) -> Result<Self> {
        DomBuilder::new(input, track_locations).build()
    }

    pub fn root(&self) -> Option<&XmlElement> {
        self.nodes.iter().find_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Position of the document element among the top-level nodes.
    pub fn root_position(&self) -> Option<usize> {
        self.nodes.iter().position(|n| matches!(n, XmlNode::Element(_)))
    }
}

/// Maps byte offsets to 1-based line and column.
struct LineIndex<'a> {
    source: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { source, starts }
    }

    fn locate(&self, offset: usize) -> Location {
        let line = self.starts.partition_point(|s| *s <= offset).max(1);
        let start = self.starts[line - 1];
        let column = self
            .source
            .get(start..offset)
            .map_or(offset - start, |s| s.chars().count())
            + 1;
        Location { line, column }
    }
}

fn syntax(message: impl std::fmt::Display) -> ElementModelError {
    ElementModelError::format(message.to_string())
}

/// Resolves a general entity reference body (`lt`, `#10`, `#x9`).
fn resolve_entity(raw: &str) -> Result<String> {
    if let Some(resolved) = resolve_xml_entity(raw) {
        return Ok(resolved.to_string());
    }
    if let Some(rest) = raw.strip_prefix('#') {
        let code = match rest.strip_prefix('x').or_else(|| rest.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => rest.parse::<u32>(),
        }
        .map_err(|_| syntax(format!("Invalid character reference &{raw};")))?;
        let ch = char::from_u32(code)
            .ok_or_else(|| syntax(format!("Invalid character reference &{raw};")))?;
        return Ok(ch.to_string());
    }
    Err(syntax(format!("The entity \"{raw}\" was referenced, but not declared")))
}

struct DomBuilder<'a> {
    reader: NsReader<&'a [u8]>,
    lines: Option<LineIndex<'a>>,
    stack: Vec<XmlElement>,
    top: Vec<XmlNode>,
}

impl<'a> DomBuilder<'a> {
    fn new(input: &'a str, track_locations: bool) -> Self {
        let mut reader = NsReader::from_str(input);
        reader.config_mut().trim_text(false);
        Self {
            reader,
            lines: track_locations.then(|| LineIndex::new(input)),
            stack: Vec::new(),
            top: Vec::new(),
        }
    }

    fn build(mut self) -> Result<XmlDocument> {
        let mut buf = Vec::new();
        loop {
            let offset = self.reader.buffer_position() as usize;
            let location = self.lines.as_ref().map(|l| l.locate(offset));
            let (resolve, event) = self
                .reader
                .read_resolved_event_into(&mut buf)
                .map_err(syntax)?;
            let namespace = namespace_of(resolve)?;

            match event {
                Event::Start(ref start) => {
                    self.check_depth()?;
                    let element = self.open(start, namespace, location)?;
                    self.stack.push(element);
                }
                Event::Empty(ref start) => {
                    self.check_depth()?;
                    let element = self.open(start, namespace, location)?;
                    self.append(XmlNode::Element(element))?;
                }
                Event::End(_) => {
                    let Some(open) = self.stack.pop() else {
                        return Err(syntax("Unexpected end tag"));
                    };
                    self.append(XmlNode::Element(open))?;
                }
                Event::Text(ref text) => {
                    let content = text.decode().map_err(syntax)?;
                    self.append_text(&content)?;
                }
                Event::GeneralRef(ref reference) => {
                    let raw = reference.decode().map_err(syntax)?;
                    let content = resolve_entity(&raw)?;
                    self.append_text(&content)?;
                }
                Event::CData(ref data) => {
                    let content = String::from_utf8_lossy(data).into_owned();
                    self.append(XmlNode::CData(content))?;
                }
                Event::Comment(ref comment) => {
                    let content = String::from_utf8_lossy(comment).into_owned();
                    self.append(XmlNode::Comment(content))?;
                }
                Event::PI(ref pi) => {
                    let content = String::from_utf8_lossy(pi).into_owned();
                    self.append(XmlNode::ProcessingInstruction(content))?;
                }
                Event::DocType(_) => {
                    return Err(syntax(
                        "DOCTYPE is disallowed when the feature \"disallow-doctype-decl\" is set to true",
                    ));
                }
                Event::Decl(_) => {}
                Event::Eof => break,
            }
            buf.clear();
        }

        if let Some(open) = self.stack.last() {
            return Err(syntax(format!(
                "XML document structures must start and end within the same entity (unclosed <{}>)",
                open.qualified_name()
            )));
        }
        if !self.top.iter().any(|n| matches!(n, XmlNode::Element(_))) {
            return Err(syntax("Premature end of file"));
        }
        Ok(XmlDocument { nodes: self.top })
    }

    fn open(
        &self,
        start: &BytesStart<'_>,
        namespace: Option<String>,
        location: Option<Location>,
    ) -> Result<XmlElement> {
        let name = start.name();
        let prefix = name
            .prefix()
            .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());
        let local_name = String::from_utf8_lossy(name.local_name().as_ref()).into_owned();

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(syntax)?;
            let key = attr.key;
            let attr_prefix = key
                .prefix()
                .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());
            let attr_local = String::from_utf8_lossy(key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value().map_err(syntax)?.into_owned();

            let is_declaration =
                key.as_ref() == b"xmlns" || attr_prefix.as_deref() == Some("xmlns");
            let attr_namespace = if is_declaration {
                Some(XMLNS_NS.to_string())
            } else if attr_prefix.as_deref() == Some("xml") {
                Some(XML_NS.to_string())
            } else if attr_prefix.is_some() {
                let (resolve, _) = self.reader.resolve_attribute(key);
                match namespace_of(resolve)? {
                    Some(ns) => Some(ns),
                    None => {
                        return Err(syntax(format!(
                            "The prefix \"{}\" for attribute \"{}\" is not bound",
                            attr_prefix.as_deref().unwrap_or_default(),
                            String::from_utf8_lossy(key.as_ref())
                        )));
                    }
                }
            } else {
                None
            };
            attributes.push(XmlAttribute {
                prefix: attr_prefix,
                local_name: attr_local,
                namespace: attr_namespace,
                value,
            });
        }

        Ok(XmlElement {
            prefix,
            local_name,
            namespace,
            attributes,
            children: Vec::new(),
            location,
        })
    }

    fn check_depth(&self) -> Result<()> {
        if self.stack.len() >= MAX_DEPTH {
            return Err(syntax(format!(
                "Element nesting exceeds the limit of {MAX_DEPTH} levels"
            )));
        }
        Ok(())
    }

    fn append(&mut self, node: XmlNode) -> Result<()> {
        match self.stack.last_mut() {
            Some(open) => open.children.push(node),
            None => {
                if matches!(node, XmlNode::Element(_))
                    && self.top.iter().any(|n| matches!(n, XmlNode::Element(_)))
                {
                    return Err(syntax(
                        "The markup in the document following the root element must be well-formed",
                    ));
                }
                self.top.push(node);
            }
        }
        Ok(())
    }

    /// Adjacent text and resolved references merge into one text node.
    fn append_text(&mut self, content: &str) -> Result<()> {
        let Some(open) = self.stack.last_mut() else {
            if content.trim().is_empty() {
                return Ok(());
            }
            return Err(syntax("Content is not allowed in prolog or trailing section"));
        };
        if let Some(XmlNode::Text(existing)) = open.children.last_mut() {
            existing.push_str(content);
        } else {
            open.children.push(XmlNode::Text(content.to_string()));
        }
        Ok(())
    }
}

fn namespace_of(resolve: ResolveResult<'_>) -> Result<Option<String>> {
    match resolve {
        ResolveResult::Bound(ns) => Ok(Some(String::from_utf8_lossy(ns.as_ref()).into_owned())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(syntax(format!(
            "The prefix \"{}\" for element is not bound",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}
