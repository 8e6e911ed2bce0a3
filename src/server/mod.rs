//! The user-facing JSON web server. This is the "front end": it accepts an
//! encoded image, runs the analysis pipeline, and maps failures onto HTTP
//! statuses.

use crate::analysis::AnalysisError;
use crate::analyzer::{AnalyzeOptions, FaceAnalyzer};
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use std::sync::Arc;
use thiserror::Error;

mod protocol;
pub mod routes;

/// State shared across requests. Constructed once in `main` and passed in,
/// never global.
pub struct AppContext {
    pub analyzer: Arc<dyn FaceAnalyzer>,
    pub options: AnalyzeOptions,
}

impl AppContext {
    pub fn new(analyzer: Arc<dyn FaceAnalyzer>, options: AnalyzeOptions) -> Self {
        AppContext { analyzer, options }
    }
}

/// HTTP-facing failure. Pipeline failures (decode, detection, inference)
/// share one 400 response; everything else is a 500 carrying the message.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("No face detected or analysis failed")]
    AnalysisFailed,

    #[error("An error occurred: {0}")]
    Internal(String),
}

impl From<AnalysisError> for ServiceError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::DecodeFailed | AnalysisError::NoFaceDetected => {
                ServiceError::AnalysisFailed
            }
            AnalysisError::Unexpected(msg) => ServiceError::Internal(msg),
        }
    }
}

impl actix_web::error::ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(protocol::ErrorBody {
                error: self.to_string(),
            })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::AnalysisFailed => StatusCode::BAD_REQUEST,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
