use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum OreveilError {
    IoError(std::io::Error),
    /// Malformed section or cache-entry wire data.
    CodecError(String),
    ConfigError(String),
    ProcessingError(String),
    /// The caller-visible pipeline deadline elapsed. Distinct from processing
    /// failures so callers can fall back to sending the chunk unobfuscated.
    Timeout,
}

impl fmt::Display for OreveilError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OreveilError::IoError(err) => write!(f, "IO error: {}", err),
            OreveilError::CodecError(msg) => write!(f, "Codec error: {}", msg),
            OreveilError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            OreveilError::ProcessingError(msg) => write!(f, "Processing error: {}", msg),
            OreveilError::Timeout => write!(f, "Obfuscation timed out"),
        }
    }
}

impl Error for OreveilError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            OreveilError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OreveilError {
    fn from(err: std::io::Error) -> Self {
        OreveilError::IoError(err)
    }
}
