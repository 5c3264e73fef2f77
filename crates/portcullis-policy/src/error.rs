use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Malformed URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Invalid size '{0}'")]
    InvalidSize(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

impl PolicyError {
    pub(crate) fn malformed_url(url: &str, reason: impl ToString) -> Self {
        PolicyError::MalformedUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_pattern(pattern: &str, reason: impl ToString) -> Self {
        PolicyError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Wrap a load-time error with the config field it came from
    pub(crate) fn in_field(self, field: &str) -> Self {
        match self {
            PolicyError::InvalidConfig(msg) => {
                PolicyError::InvalidConfig(format!("{}: {}", field, msg))
            }
            other => PolicyError::InvalidConfig(format!("{}: {}", field, other)),
        }
    }
}
