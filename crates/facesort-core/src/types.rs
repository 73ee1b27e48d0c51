use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// One face's features as produced by a [`FeatureExtractor`].
///
/// The bytes are opaque to this crate: they are stored, hashed and handed
/// back to a [`FeatureComparator`], never interpreted.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FeatureVector(Vec<u8>);

impl FeatureVector {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase hex SHA-256 of the raw bytes.
    pub fn digest(&self) -> String {
        hex_digest(&self.0)
    }
}

impl fmt::Debug for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digest = self.digest();
        f.debug_struct("FeatureVector")
            .field("len", &self.0.len())
            .field("digest", &&digest[..12])
            .finish()
    }
}

/// Error reported by a feature extractor backend.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ExtractError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ExtractError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Turns encoded image bytes into one feature vector per detected face.
///
/// Repeated calls on identical bytes must give results the encoding cache can
/// stand in for.
pub trait FeatureExtractor {
    fn extract(&mut self, image_bytes: &[u8]) -> Result<Vec<FeatureVector>, ExtractError>;
}

/// Decides whether two feature vectors belong to the same person. Symmetric.
pub trait FeatureComparator {
    fn matches(&self, a: &FeatureVector, b: &FeatureVector) -> bool;
}

impl<T: FeatureExtractor + ?Sized> FeatureExtractor for Box<T> {
    fn extract(&mut self, image_bytes: &[u8]) -> Result<Vec<FeatureVector>, ExtractError> {
        (**self).extract(image_bytes)
    }
}

impl<T: FeatureComparator + ?Sized> FeatureComparator for Box<T> {
    fn matches(&self, a: &FeatureVector, b: &FeatureVector) -> bool {
        (**self).matches(a, b)
    }
}

pub(crate) fn hex_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_is_bytewise() {
        let a = FeatureVector::new(vec![1, 2, 3]);
        let b = FeatureVector::new(vec![1, 2, 3]);
        let c = FeatureVector::new(vec![1, 2, 4]);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_digest_is_sha256_hex() {
        let v = FeatureVector::new(b"abc".to_vec());
        assert_eq!(
            v.digest(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hex_digest_is_lowercase() {
        let d = hex_digest(&[0xff; 16]);
        assert_eq!(d.len(), 64);
        assert!(d.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')), "got: {d}");
        assert_eq!(hex_digest(&[]), crate::image::ContentHash::of_bytes(&[]).as_str());
    }

    #[test]
    fn test_debug_does_not_dump_bytes() {
        let v = FeatureVector::new(vec![0u8; 2048]);
        let dbg = format!("{v:?}");
        assert!(dbg.contains("len: 2048"), "got: {dbg}");
        assert!(dbg.len() < 80, "got: {dbg}");
    }
}
