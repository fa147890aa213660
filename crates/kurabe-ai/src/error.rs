use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("empty response from backend")]
    Empty,
}

impl AiError {
    /// Whether the failure happened in transit rather than in the payload.
    ///
    /// Transport failures yield no analysis record; payload failures yield a
    /// placeholder record, since the section was reached but not understood.
    pub fn is_transport(&self) -> bool {
        matches!(self, AiError::Http(_) | AiError::Server { .. })
    }
}
