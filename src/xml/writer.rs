use std::borrow::Cow;
use std::io::Write;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::elementmodel::ElementDecoration;
use crate::error::Result;

/// Receiver of composed XML.
///
/// Namespace declarations and attributes are queued and attach to the next
/// element opened with [`enter`](XmlSink::enter) or [`element`](XmlSink::element).
pub trait XmlSink {
    fn start(&mut self) -> Result<()>;
    fn end(&mut self) -> Result<()>;
    fn set_default_namespace(&mut self, namespace: &str) -> Result<()>;
    fn namespace(&mut self, namespace: &str, prefix: &str) -> Result<()>;
    fn attribute(&mut self, name: &str, value: &str) -> Result<()>;
    fn enter(&mut self, name: &str) -> Result<()>;
    fn exit(&mut self, name: &str) -> Result<()>;
    /// An element with no content.
    fn element(&mut self, name: &str) -> Result<()>;
    fn text(&mut self, text: &str) -> Result<()>;
    /// Markup written through unchanged.
    fn escaped_text(&mut self, markup: &str) -> Result<()>;
    fn comment(&mut self, text: &str) -> Result<()>;

    fn link(&mut self, _href: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn anchor(&mut self, _name: &str) -> Result<()> {
        Ok(())
    }

    fn decorate(&mut self, _decoration: &ElementDecoration) -> Result<()> {
        Ok(())
    }
}

/// [`XmlSink`] writing to any [`Write`] through `quick_xml`.
pub struct XmlWriter<W: Write> {
    writer: Writer<W>,
    declaration: bool,
    pending: Vec<(String, String)>,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(output: W) -> Self {
        Self {
            writer: Writer::new(output),
            declaration: false,
            pending: Vec::new(),
        }
    }

    /// Indents nested elements by two spaces.
    pub fn pretty(output: W) -> Self {
        Self {
            writer: Writer::new_with_indent(output, b' ', 2),
            declaration: false,
            pending: Vec::new(),
        }
    }

    /// Emits `<?xml version="1.0" encoding="UTF-8"?>` on [`start`](XmlSink::start).
    pub fn with_declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn open_tag(&mut self, name: &str) -> BytesStart<'static> {
        let mut start = BytesStart::new(name.to_string());
        for (key, value) in self.pending.drain(..) {
            start.push_attribute((key.as_str(), value.as_str()));
        }
        start
    }
}

impl<W: Write> XmlSink for XmlWriter<W> {
    fn start(&mut self) -> Result<()> {
        if self.declaration {
            self.writer
                .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        }
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.writer.get_mut().flush()?;
        Ok(())
    }

    fn set_default_namespace(&mut self, namespace: &str) -> Result<()> {
        self.pending
            .push(("xmlns".to_string(), namespace.to_string()));
        Ok(())
    }

    fn namespace(&mut self, namespace: &str, prefix: &str) -> Result<()> {
        self.pending
            .push((format!("xmlns:{prefix}"), namespace.to_string()));
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.pending.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn enter(&mut self, name: &str) -> Result<()> {
        let start = self.open_tag(name);
        self.writer.write_event(Event::Start(start))?;
        Ok(())
    }

    fn exit(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn element(&mut self, name: &str) -> Result<()> {
        let start = self.open_tag(name);
        self.writer.write_event(Event::Empty(start))?;
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        Ok(())
    }

    fn escaped_text(&mut self, markup: &str) -> Result<()> {
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(markup)))?;
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<()> {
        self.writer
            .write_event(Event::Comment(BytesText::from_escaped(comment_text(text))))?;
        Ok(())
    }
}

/// Comment content may not contain `--` or end with `-`.
fn comment_text(text: &str) -> Cow<'_, str> {
    if !text.contains("--") && !text.ends_with('-') {
        return Cow::Borrowed(text);
    }
    let mut out = text.to_string();
    while out.contains("--") {
        out = out.replace("--", "- -");
    }
    if out.ends_with('-') {
        out.push(' ');
    }
    Cow::Owned(out)
}
