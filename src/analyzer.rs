//! Loading and running the pretrained face-attribute pipeline.
//!
//! The pipeline is a scripted TorchScript module that owns face
//! localization, optional alignment, and attribute estimation. Its forward
//! pass takes an RGB float tensor plus the call flags and returns one row
//! per detected face. This module only converts frames in, slices rows
//! out, and selects dominant labels.

use crate::analysis::AnalysisError;
use anyhow::{anyhow, ensure, Result};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tch::{no_grad, IValue, Kind, Tensor};
use tracing::{debug, warn};

/// Gender vocabulary, in the pipeline's output order.
pub const GENDER_LABELS: [&str; 2] = ["Woman", "Man"];

/// Emotion vocabulary, in the pipeline's output order.
pub const EMOTION_LABELS: [&str; 7] = [
    "angry", "disgust", "fear", "happy", "sad", "surprise", "neutral",
];

/// Race vocabulary, in the pipeline's output order.
pub const RACE_LABELS: [&str; 6] = [
    "asian",
    "indian",
    "black",
    "white",
    "middle eastern",
    "latino hispanic",
];

/// Width of one per-face output row: age, then gender, emotion and race
/// scores in vocabulary order.
const ROW_WIDTH: usize = 1 + GENDER_LABELS.len() + EMOTION_LABELS.len() + RACE_LABELS.len();

/// The face-localization method the pipeline uses before attribute
/// estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorBackend {
    /// Fast cascade detector, the default for interactive use.
    Lightweight,
    /// Slower CNN detector with better recall on hard poses.
    Accurate,
}

impl DetectorBackend {
    fn selector(self) -> i64 {
        match self {
            DetectorBackend::Lightweight => 0,
            DetectorBackend::Accurate => 1,
        }
    }
}

/// Call parameters for one analysis. Both entry points use the defaults.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Fail when no face is localized instead of falling back to the whole
    /// frame.
    pub enforce_detection: bool,
    pub detector_backend: DetectorBackend,
    /// Align the detected face before attribute estimation.
    pub align: bool,
    /// Suppress per-call diagnostic logging.
    pub silent: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        AnalyzeOptions {
            enforce_detection: false,
            detector_backend: DetectorBackend::Lightweight,
            align: true,
            silent: true,
        }
    }
}

/// One raw per-face record: estimated age and the dominant label for each
/// multi-class attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceAttributes {
    pub age: i64,
    pub gender: String,
    pub emotion: String,
    pub race: String,
}

/// The inference collaborator seam. The HTTP handler and the viewer both
/// talk to this trait; tests substitute a stub.
pub trait FaceAnalyzer: Send + Sync {
    /// Analyze one frame. Returns one record per detected face; callers
    /// read only the first.
    fn analyze(
        &self,
        frame: &DynamicImage,
        options: &AnalyzeOptions,
    ) -> std::result::Result<Vec<FaceAttributes>, AnalysisError>;
}

/// Load and run a scripted face-attribute pipeline file.
#[derive(Debug)]
pub struct TorchAnalyzer {
    pipeline: tch::CModule,
}

impl TorchAnalyzer {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Ok(TorchAnalyzer {
            pipeline: tch::CModule::load(path)?,
        })
    }

    fn run_pipeline(&self, input: Tensor, options: &AnalyzeOptions) -> Result<Vec<FaceAttributes>> {
        let output = no_grad(|| {
            self.pipeline.forward_is(&[
                IValue::Tensor(input),
                IValue::Bool(options.enforce_detection),
                IValue::Int(options.detector_backend.selector()),
                IValue::Bool(options.align),
            ])
        })?;

        let rows = match output {
            IValue::Tensor(t) => t,
            other => return Err(anyhow!("pipeline returned {other:?}, expected a tensor")),
        };

        let size = rows.size();
        ensure!(
            size.len() == 2 && size[1] == ROW_WIDTH as i64,
            "unexpected pipeline output shape {size:?}"
        );

        let mut faces = Vec::with_capacity(size[0] as usize);
        for i in 0..size[0] {
            let row_tensor = rows.get(i).to_kind(Kind::Float);
            let row = Vec::<f32>::try_from(&row_tensor)?;
            faces.push(attributes_from_row(&row)?);
        }
        Ok(faces)
    }
}

impl FaceAnalyzer for TorchAnalyzer {
    fn analyze(
        &self,
        frame: &DynamicImage,
        options: &AnalyzeOptions,
    ) -> std::result::Result<Vec<FaceAttributes>, AnalysisError> {
        if !options.silent {
            debug!(
                width = frame.width(),
                height = frame.height(),
                "running face analysis"
            );
        }

        let input = frame_tensor(frame);
        self.run_pipeline(input, options).map_err(|e| {
            // Detector errors, shape surprises and genuinely-no-face all
            // collapse into the same caller-visible failure.
            warn!("face analysis failed: {e}");
            AnalysisError::NoFaceDetected
        })
    }
}

/// Convert a frame to the pipeline's input layout: CHW float, 0..1.
fn frame_tensor(frame: &DynamicImage) -> Tensor {
    let rgb = frame.to_rgb8();
    let (width, height) = rgb.dimensions();
    Tensor::from_slice(rgb.as_raw())
        .view([height as i64, width as i64, 3])
        .permute([2, 0, 1])
        .to_kind(Kind::Float)
        / 255.
}

/// Parse one per-face output row into a record.
fn attributes_from_row(row: &[f32]) -> Result<FaceAttributes> {
    ensure!(
        row.len() == ROW_WIDTH,
        "face row has {} values, expected {ROW_WIDTH}",
        row.len()
    );

    let gender_end = 1 + GENDER_LABELS.len();
    let emotion_end = gender_end + EMOTION_LABELS.len();

    Ok(FaceAttributes {
        age: row[0].round().max(0.0) as i64,
        gender: dominant_label(&row[1..gender_end], &GENDER_LABELS)?,
        emotion: dominant_label(&row[gender_end..emotion_end], &EMOTION_LABELS)?,
        race: dominant_label(&row[emotion_end..], &RACE_LABELS)?,
    })
}

/// Pick the highest-scoring label. Argmax over raw scores; the winner is
/// the same with or without softmax.
fn dominant_label(scores: &[f32], labels: &[&str]) -> Result<String> {
    ensure!(
        scores.len() == labels.len(),
        "{} scores for {} labels",
        scores.len(),
        labels.len()
    );

    let (best, _) = scores
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .ok_or_else(|| anyhow!("empty score slice"))?;

    Ok(labels[best].to_string())
}
