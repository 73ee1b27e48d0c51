//! ArcFace embeddings and their comparison.
//!
//! An embedding travels through the core as a [`FeatureVector`] holding its
//! values as little-endian `f32` bytes.

use facesort_core::{FeatureComparator, FeatureVector};

/// Cosine similarity at or above which two faces count as the same person.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.40;

/// Face embedding vector (512-dimensional for ArcFace w600k_r50).
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Cosine similarity in [-1, 1]; 0.0 when either vector has no length
    /// or the dimensions differ.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        if self.values.len() != other.values.len() {
            return 0.0;
        }
        let (dot, norm_a, norm_b) = self
            .values
            .iter()
            .zip(&other.values)
            .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (a, b)| {
                (dot + a * b, na + a * a, nb + b * b)
            });

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            dot / denom
        } else {
            0.0
        }
    }

    pub fn to_feature_vector(&self) -> FeatureVector {
        let bytes: Vec<u8> = self.values.iter().flat_map(|v| v.to_le_bytes()).collect();
        FeatureVector::new(bytes)
    }

    /// Decode a vector written by [`to_feature_vector`](Self::to_feature_vector).
    /// Returns `None` if the byte length is not a whole number of `f32`s.
    pub fn from_feature_vector(vector: &FeatureVector) -> Option<Self> {
        let bytes = vector.as_bytes();
        if bytes.is_empty() || bytes.len() % 4 != 0 {
            return None;
        }
        let values = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Some(Self { values })
    }
}

/// Matches two face vectors when their cosine similarity reaches `threshold`.
#[derive(Debug, Clone, Copy)]
pub struct CosineComparator {
    pub threshold: f32,
}

impl Default for CosineComparator {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }
}

impl FeatureComparator for CosineComparator {
    fn matches(&self, a: &FeatureVector, b: &FeatureVector) -> bool {
        let (Some(a), Some(b)) = (
            Embedding::from_feature_vector(a),
            Embedding::from_feature_vector(b),
        ) else {
            return false;
        };
        if a.values.len() != b.values.len() {
            return false;
        }
        a.similarity(&b) >= self.threshold
    }
}
