//! SCRFD face detection on decoded colour photos.
//!
//! The photo is letterboxed into a square 640×640 input, the three stride
//! heads are decoded into boxes and five-point landmarks, and overlapping
//! boxes are collapsed with non-maximum suppression.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;

const INPUT_SIZE: u32 = 640;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 128.0;
const CONFIDENCE_THRESHOLD: f32 = 0.5;
const NMS_THRESHOLD: f32 = 0.4;
const STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("detector model not found: {0}")]
    ModelNotFound(String),
    #[error("detector inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A detected face in original image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
    /// left eye, right eye, nose, left mouth corner, right mouth corner
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl FaceBox {
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection over union with `other`.
    pub fn iou(&self, other: &FaceBox) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = w * h;
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }
}

/// Scale and padding applied when fitting a photo into the model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub width: u32,
    pub height: u32,
}

impl Letterbox {
    /// Fit a `width`×`height` image into a `size`×`size` square, centred.
    pub fn fit(width: u32, height: u32, size: u32) -> Self {
        let scale = (size as f32 / width.max(1) as f32).min(size as f32 / height.max(1) as f32);
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);
        Self {
            scale,
            pad_x: (size - new_w) / 2,
            pad_y: (size - new_h) / 2,
            width: new_w,
            height: new_h,
        }
    }

    /// Map a point in model input space back to the original image.
    pub fn unmap(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.scale,
            (y - self.pad_y as f32) / self.scale,
        )
    }
}

/// Build the normalised NCHW input tensor for `image`.
pub fn input_tensor(image: &RgbImage, size: u32) -> (Array4<f32>, Letterbox) {
    let letterbox = Letterbox::fit(image.width(), image.height(), size);
    let resized = imageops::resize(image, letterbox.width, letterbox.height, FilterType::Triangle);

    // Padding stays at 0.0, which is PIXEL_MEAN after normalisation.
    let size = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = (x + letterbox.pad_x) as usize;
        let ty = (y + letterbox.pad_y) as usize;
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = (pixel.0[c] as f32 - PIXEL_MEAN) / PIXEL_STD;
        }
    }
    (tensor, letterbox)
}

/// Output tensor positions of one stride head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeadOutputs {
    score: usize,
    bbox: usize,
    kps: usize,
}

/// Resolve where each stride's score, bbox and keypoint tensors sit in the
/// model outputs. Named exports (`score_8`, `bbox_16`, ...) are matched by
/// name; anything else is assumed to be grouped by kind in stride order.
fn resolve_heads(names: &[String]) -> [HeadOutputs; 3] {
    let position = |kind: &str, stride: usize| {
        let wanted = format!("{kind}_{stride}");
        names.iter().position(|n| *n == wanted)
    };
    let named = |stride: usize| -> Option<HeadOutputs> {
        Some(HeadOutputs {
            score: position("score", stride)?,
            bbox: position("bbox", stride)?,
            kps: position("kps", stride)?,
        })
    };

    if let (Some(s8), Some(s16), Some(s32)) = (named(8), named(16), named(32)) {
        tracing::debug!("SCRFD outputs mapped by name");
        return [s8, s16, s32];
    }
    tracing::debug!(?names, "SCRFD outputs mapped by position");
    std::array::from_fn(|i| HeadOutputs {
        score: i,
        bbox: i + 3,
        kps: i + 6,
    })
}

/// Decode one stride head into candidate faces above `threshold`.
fn decode_head(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<FaceBox> {
    let grid_w = INPUT_SIZE as usize / stride;
    let step = stride as f32;

    scores
        .iter()
        .enumerate()
        .filter(|(_, score)| **score > threshold)
        .filter_map(|(anchor, &score)| {
            let cell = anchor / ANCHORS_PER_CELL;
            let cx = (cell % grid_w) as f32 * step;
            let cy = (cell / grid_w) as f32 * step;

            let d = bboxes.get(anchor * 4..anchor * 4 + 4)?;
            let (x1, y1) = letterbox.unmap((cx - d[0] * step, cy - d[1] * step));
            let (x2, y2) = letterbox.unmap((cx + d[2] * step, cy + d[3] * step));

            let landmarks = kps.get(anchor * 10..anchor * 10 + 10).map(|k| {
                std::array::from_fn(|i| {
                    letterbox.unmap((cx + k[2 * i] * step, cy + k[2 * i + 1] * step))
                })
            });

            Some(FaceBox {
                x1,
                y1,
                x2,
                y2,
                score,
                landmarks,
            })
        })
        .collect()
}

/// Keep the highest-scoring box of every overlapping cluster, best first.
fn suppress(mut boxes: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    boxes.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<FaceBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        if kept.iter().all(|k| k.iou(&candidate) <= iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}

pub struct FaceDetector {
    session: Session,
    heads: [HeadOutputs; 3],
}

impl FaceDetector {
    pub fn load(model_path: &Path) -> Result<Self, DetectorError> {
        if !model_path.is_file() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        tracing::info!(
            path = %model_path.display(),
            outputs = ?names,
            "loaded SCRFD model"
        );
        if names.len() < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "expected 9 outputs (score/bbox/kps for 3 strides), got {}",
                names.len()
            )));
        }

        Ok(Self {
            session,
            heads: resolve_heads(&names),
        })
    }

    /// Detect faces in `image`, best score first.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceBox>, DetectorError> {
        let (input, letterbox) = input_tensor(image, INPUT_SIZE);
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let tensor = |index: usize, what: &str, stride: usize| {
            outputs[index]
                .try_extract_tensor::<f32>()
                .map(|(_, data)| data)
                .map_err(|e| DetectorError::InferenceFailed(format!("{what} stride {stride}: {e}")))
        };

        let mut candidates = Vec::new();
        for (head, &stride) in self.heads.iter().zip(STRIDES.iter()) {
            candidates.extend(decode_head(
                tensor(head.score, "scores", stride)?,
                tensor(head.bbox, "bboxes", stride)?,
                tensor(head.kps, "landmarks", stride)?,
                stride,
                &letterbox,
                CONFIDENCE_THRESHOLD,
            ));
        }

        let faces = suppress(candidates, NMS_THRESHOLD);
        tracing::debug!(faces = faces.len(), "SCRFD detection");
        Ok(faces)
    }
}
