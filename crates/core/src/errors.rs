use thiserror::Error;

/// Failure classes shared by the bots. Every variant carries the caught error's
/// message so it can be echoed back in a chat reply or CLI payload.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("extraction failure: {0}")]
    Extraction(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn class(&self) -> &'static str {
        match self {
            Self::Persistence(_) => "persistence",
            Self::Integration(_) => "integration",
            Self::Extraction(_) => "extraction",
            Self::Configuration(_) => "configuration",
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Persistence(message)
            | Self::Integration(message)
            | Self::Extraction(message)
            | Self::Configuration(message) => message,
        }
    }
}

impl From<crate::config::ConfigError> for ApplicationError {
    fn from(value: crate::config::ConfigError) -> Self {
        Self::Configuration(value.to_string())
    }
}
