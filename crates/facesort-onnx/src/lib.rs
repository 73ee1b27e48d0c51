//! facesort-onnx — face vectors for facesort via ONNX Runtime.
//!
//! SCRFD finds faces and their landmarks, each face is aligned to a 112×112
//! crop, and ArcFace turns the crop into a 512-dimensional embedding.
//! Embeddings are compared by cosine similarity.

pub mod alignment;
pub mod detector;
pub mod embedding;
pub mod extractor;
pub mod recognizer;

pub use embedding::{CosineComparator, Embedding, DEFAULT_MATCH_THRESHOLD};
pub use extractor::{OnnxError, OnnxExtractor, DETECTOR_MODEL_FILE, RECOGNIZER_MODEL_FILE};
