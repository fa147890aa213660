use kurabe_core::ModeError;
use thiserror::Error;

/// Input-level comparison failures. Backend errors never surface here:
/// the analyzer degrades them to skips or placeholder records.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("comparison requires at least two documents, got {0}")]
    InsufficientDocuments(usize),
    #[error("multi-document comparison is not supported")]
    MultiDocumentUnsupported,
}

impl From<ModeError> for EngineError {
    fn from(err: ModeError) -> Self {
        match err {
            ModeError::InsufficientDocuments(n) => EngineError::InsufficientDocuments(n),
        }
    }
}
