//! Attribute post-processing shared by the HTTP handler and the live viewer.
//!
//! The analyzer returns raw per-face records; this module applies the age
//! correction, derives the display range, and carries the dominant labels
//! through unchanged.

use crate::analyzer::{AnalyzeOptions, FaceAnalyzer, FaceAttributes};
use crate::decode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Fixed offset subtracted from the raw estimated age, floored at zero.
pub const AGE_CORRECTION: i64 = 5;

pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Everything that can go wrong between receiving image data and producing
/// an [`AnalysisResult`]. Callers branch on the variant instead of catching
/// broad errors.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The transport-encoded image could not be turned into pixels.
    #[error("could not decode image data")]
    DecodeFailed,

    /// The analyzer raised, or returned no usable face record.
    #[error("no face detected or analysis failed")]
    NoFaceDetected,

    /// Anything else (bad request body, missing field, internal failure).
    #[error("{0}")]
    Unexpected(String),
}

/// The user-facing record derived from one raw face record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub age: u32,
    pub age_range: String,
    pub gender: String,
    pub emotion: String,
    pub race: String,
}

/// Format the display range around a corrected age.
///
/// The low bound applies the zero floor again even though the input is
/// already floored; the high bound is never floored. Both call sites rely
/// on this exact shape.
pub fn age_range(age: i64) -> String {
    format!("{}-{}", (age - 5).max(0), age + 5)
}

/// Apply the age correction and derive the display fields from a raw record.
pub fn post_process(raw: &FaceAttributes) -> AnalysisResult {
    let age = (raw.age - AGE_CORRECTION).max(0);
    AnalysisResult {
        age: age as u32,
        age_range: age_range(age),
        gender: raw.gender.clone(),
        emotion: raw.emotion.clone(),
        race: raw.race.clone(),
    }
}

/// One-line summary rendered onto viewer frames.
pub fn summary_line(result: &AnalysisResult) -> String {
    format!(
        "Age: {} ({}), Gender: {}, Emotion: {}, Race: {}",
        result.age, result.age_range, result.gender, result.emotion, result.race
    )
}

/// Run the full decode -> infer -> post-process pipeline on one encoded
/// image. Only the first detected face is used; additional records are
/// ignored.
pub fn analyze_image(
    analyzer: &dyn FaceAnalyzer,
    options: &AnalyzeOptions,
    image_data: &str,
) -> Result<AnalysisResult> {
    let frame = decode::decode_image(image_data)?;
    analyze_frame(analyzer, options, &frame)
}

/// Infer and post-process an already-decoded frame (the viewer path, which
/// has raw frames and no transport encoding).
pub fn analyze_frame(
    analyzer: &dyn FaceAnalyzer,
    options: &AnalyzeOptions,
    frame: &image::DynamicImage,
) -> Result<AnalysisResult> {
    let faces = analyzer.analyze(frame, options)?;
    let first = faces.into_iter().next().ok_or_else(|| {
        warn!("analyzer returned no face records");
        AnalysisError::NoFaceDetected
    })?;
    Ok(post_process(&first))
}
