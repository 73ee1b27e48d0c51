//! [`FeatureExtractor`] backed by the SCRFD detector and ArcFace recognizer.

use std::path::{Path, PathBuf};

use facesort_core::{ExtractError, FeatureExtractor, FeatureVector};
use thiserror::Error;

use crate::alignment;
use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};

pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum OnnxError {
    #[error("model directory not found: {0}")]
    ModelDirMissing(PathBuf),
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Detects every face in an image and embeds each one.
pub struct OnnxExtractor {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxExtractor {
    /// Load both models from `model_dir`.
    pub fn load(model_dir: &Path) -> Result<Self, OnnxError> {
        if !model_dir.is_dir() {
            return Err(OnnxError::ModelDirMissing(model_dir.to_path_buf()));
        }
        Ok(Self {
            detector: FaceDetector::load(&model_dir.join(DETECTOR_MODEL_FILE))?,
            recognizer: FaceRecognizer::load(&model_dir.join(RECOGNIZER_MODEL_FILE))?,
        })
    }

    fn faces(&mut self, image_bytes: &[u8]) -> Result<Vec<FeatureVector>, OnnxError> {
        let image = image::load_from_memory(image_bytes)?.to_rgb8();
        let faces = self.detector.detect(&image)?;

        let mut vectors = Vec::with_capacity(faces.len());
        for face in &faces {
            let Some(landmarks) = face.landmarks.as_ref() else {
                tracing::debug!(score = face.score, "face without landmarks; skipping");
                continue;
            };
            let aligned = alignment::align_face(&image, landmarks);
            vectors.push(self.recognizer.embed(&aligned)?.to_feature_vector());
        }
        Ok(vectors)
    }
}

impl FeatureExtractor for OnnxExtractor {
    fn extract(&mut self, image_bytes: &[u8]) -> Result<Vec<FeatureVector>, ExtractError> {
        self.faces(image_bytes)
            .map_err(|e| ExtractError::with_source("face extraction failed", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_model_dir() {
        let err = OnnxExtractor::load(Path::new("/nonexistent/facesort-models")).err();
        assert!(matches!(err, Some(OnnxError::ModelDirMissing(_))));
    }

    #[test]
    fn test_load_missing_model_file() {
        let dir = std::env::temp_dir();
        if dir.join(DETECTOR_MODEL_FILE).exists() {
            return;
        }
        let err = OnnxExtractor::load(&dir).err();
        assert!(matches!(
            err,
            Some(OnnxError::Detector(DetectorError::ModelNotFound(_)))
        ));
    }
}
