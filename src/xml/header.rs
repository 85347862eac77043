//! Prolog inspection for diagnostics mode.

const HEADER_WINDOW: usize = 1024;

pub const ENCODING_INVALID: &str = "XML encoding invalid";

/// What the first bytes of a document say about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlHeader {
    /// Declared XML version, `1.0` when there is no declaration, `??` when unknown.
    pub version: String,
    pub problem: Option<String>,
}

impl XmlHeader {
    fn unknown(problem: impl Into<String>) -> Self {
        Self {
            version: "??".to_string(),
            problem: Some(problem.into()),
        }
    }
}

/// Sniffs the byte order mark and XML declaration within the first 1024 bytes.
pub fn check_header(input: &[u8]) -> XmlHeader {
    let window = &input[..input.len().min(HEADER_WINDOW)];

    let header = if let Some(rest) = window.strip_prefix(b"\xEF\xBB\xBF") {
        rest
    } else if window.starts_with(b"<?x") {
        window
    } else if window.first() == Some(&b'<') {
        return XmlHeader {
            version: "1.0".to_string(),
            problem: None,
        };
    } else {
        return XmlHeader::unknown(ENCODING_INVALID);
    };

    let Some(end) = header.iter().position(|b| *b == b'>') else {
        return XmlHeader::unknown("XML declaration is not terminated");
    };
    let header = String::from_utf8_lossy(&header[..end]);

    let problem = quoted_value(&header, "encoding")
        .filter(|e| !e.eq_ignore_ascii_case("UTF-8"))
        .map(|_| ENCODING_INVALID.to_string());
    let version = quoted_value(&header, "version").unwrap_or_else(|| "??".to_string());
    XmlHeader { version, problem }
}

fn quoted_value(header: &str, name: &str) -> Option<String> {
    ['"', '\''].iter().find_map(|quote| {
        let marker = format!("{name}={quote}");
        let start = header.find(&marker)? + marker.len();
        let rest = &header[start..];
        let end = rest.find(*quote)?;
        Some(rest[..end].to_string())
    })
}

/// Attribute values may not carry C0 control characters other than tab, CR and LF in XML 1.0.
pub fn valid_attr_value(version: Option<&str>, value: &str) -> bool {
    match version {
        Some("1.0") => value
            .chars()
            .all(|ch| ch > '\u{1F}' || matches!(ch, '\r' | '\n' | '\t')),
        _ => true,
    }
}
