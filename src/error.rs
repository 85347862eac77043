use thiserror::Error;

#[derive(Error, Debug)]
pub enum ElementModelError {
    /// Malformed content that the active validation policy refuses to tolerate.
    #[error("Format error: {message}")]
    Format { message: String },

    /// The schema repository cannot describe something the content needs.
    #[error("Definition error: {message}")]
    Definition { message: String },

    #[error("Conversion error: {message}")]
    Conversion { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl ElementModelError {
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub fn definition(message: impl Into<String>) -> Self {
        Self::Definition {
            message: message.into(),
        }
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }

    /// The message without the variant prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::Format { message }
            | Self::Definition { message }
            | Self::Conversion { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ElementModelError>;
