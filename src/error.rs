/// Errors raised by the effect core and its external collaborators.
#[derive(Debug)]
pub enum ChainError {
    Io(std::io::Error),
    Wav(hound::Error),
    ModelFormat(String),
    /// A delay line could not grow; the previous buffer is still in place.
    Allocation { requested: usize },
    /// A parameter write outside what the stage can represent.
    InvalidParameter { name: &'static str, value: f32 },
    Processor(String),
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::Io(e) => write!(f, "I/O error: {}", e),
            ChainError::Wav(e) => write!(f, "WAV error: {}", e),
            ChainError::ModelFormat(msg) => write!(f, "Invalid model file: {}", msg),
            ChainError::Allocation { requested } => {
                write!(f, "Failed to allocate delay buffer of {} samples", requested)
            }
            ChainError::InvalidParameter { name, value } => {
                write!(f, "Invalid value {} for {}", value, name)
            }
            ChainError::Processor(msg) => write!(f, "Processor failure: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChainError::Io(e) => Some(e),
            ChainError::Wav(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ChainError {
    fn from(e: std::io::Error) -> Self {
        ChainError::Io(e)
    }
}

impl From<hound::Error> for ChainError {
    fn from(e: hound::Error) -> Self {
        ChainError::Wav(e)
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(e: serde_json::Error) -> Self {
        ChainError::ModelFormat(e.to_string())
    }
}
