use thiserror::Error;

#[derive(Error, Debug)]
pub enum SelectorError {
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Unknown attribute \"{attribute}\", must be one of {allowed}")]
    UnknownAttribute { attribute: String, allowed: String },

    #[error("\"{attribute}\" attribute must be {expected}")]
    InvalidAttributeValue { attribute: String, expected: String },

    #[error("Unsupported operator \"{operator}\" for attribute \"{attribute}\"")]
    UnsupportedOperator { operator: String, attribute: String },

    #[error("Target element must belong to the root's subtree")]
    TargetOutsideScope,

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Chrome error: {0}")]
    ChromeError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Anyhow error: {0}")]
    AnyhowError(String),
}

pub type Result<T> = std::result::Result<T, SelectorError>;

// Convert anyhow::Error to SelectorError
impl From<anyhow::Error> for SelectorError {
    fn from(err: anyhow::Error) -> Self {
        SelectorError::AnyhowError(err.to_string())
    }
}

impl SelectorError {
    pub fn invalid_selector(selector: &str, reason: impl std::fmt::Display) -> Self {
        SelectorError::InvalidSelector(format!("{} ({})", reason, selector))
    }

    pub fn from_any_error<E: std::fmt::Display>(err: E) -> Self {
        SelectorError::ChromeError(err.to_string())
    }
}
