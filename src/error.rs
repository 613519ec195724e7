use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum RelayError {
    // Configuration errors
    ConfigError(String),

    // Message errors
    MessageParse(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::MessageParse(msg) => write!(f, "Message parse error: {}", msg),
        }
    }
}

impl Error for RelayError {}

// Generic result type for the relay
pub type Result<T> = std::result::Result<T, RelayError>;
