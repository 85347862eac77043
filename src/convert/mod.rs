pub mod cda;
pub mod dates;
pub mod xhtml;

pub use cda::{cda_to_xhtml, xhtml_to_cda};
pub use dates::{convert_from_external, convert_to_external};
pub use xhtml::{XhtmlElement, XhtmlNode};
