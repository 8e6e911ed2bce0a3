use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// The analyze request: one transport-encoded image.
#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub image: String,
}

impl Debug for AnalyzeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AnalyzeRequest {{ image: <{} bytes> }}", self.image.len())
    }
}

/// Structured error body returned on 400 and 500 responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
