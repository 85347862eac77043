pub mod composer;
pub mod dom;
pub mod header;
pub mod parser;
pub mod writer;

pub use dom::{XmlAttribute, XmlDocument, XmlElement, XmlNode};
pub use header::{XmlHeader, check_header, valid_attr_value};
pub use parser::XmlParser;
pub use writer::{XmlSink, XmlWriter};
