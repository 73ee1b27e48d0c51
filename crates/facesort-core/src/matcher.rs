//! Boolean face matching of an image against an album's training corpus.

use crate::cache::EncodingCache;
use crate::corpus::TrainingCorpus;
use crate::error::{Error, Result};
use crate::image::Image;
use crate::types::{FeatureComparator, FeatureExtractor, FeatureVector};

/// True on the first (reference, query) pair the comparator accepts.
///
/// A query without vectors never matches.
pub fn any_match(
    query: &[FeatureVector],
    corpus: &TrainingCorpus,
    comparator: &dyn FeatureComparator,
) -> bool {
    if query.is_empty() {
        return false;
    }
    corpus
        .vectors()
        .any(|reference| query.iter().any(|q| comparator.matches(reference, q)))
}

/// Decides album membership, reading vectors from the cache when one is given.
pub struct MatchEngine<'a> {
    extractor: &'a mut dyn FeatureExtractor,
    comparator: &'a dyn FeatureComparator,
}

impl<'a> MatchEngine<'a> {
    pub fn new(
        extractor: &'a mut dyn FeatureExtractor,
        comparator: &'a dyn FeatureComparator,
    ) -> Self {
        Self {
            extractor,
            comparator,
        }
    }

    /// Vectors of `image`: a cache hit if possible, otherwise a direct
    /// extraction. Direct extractions are not written back to the cache.
    pub fn vectors(
        &mut self,
        image: &Image,
        cache: Option<&EncodingCache<'_>>,
    ) -> Result<Vec<FeatureVector>> {
        if let Some(cache) = cache {
            if let Some(vectors) = cache.lookup(image)? {
                return Ok(vectors);
            }
            tracing::debug!(image = %image.path().display(), "cache miss; extracting directly");
        }
        let bytes = image.read_bytes()?;
        self.extractor
            .extract(&bytes)
            .map_err(|source| Error::Extract {
                path: image.path().to_path_buf(),
                source,
            })
    }

    /// Whether any face in `image` matches any person in `corpus`.
    pub fn matches(
        &mut self,
        image: &Image,
        corpus: &TrainingCorpus,
        cache: Option<&EncodingCache<'_>>,
    ) -> Result<bool> {
        let query = self.vectors(image, cache)?;
        Ok(self.matches_vectors(&query, corpus))
    }

    /// Like [`matches`](Self::matches), for vectors already at hand.
    pub fn matches_vectors(&self, query: &[FeatureVector], corpus: &TrainingCorpus) -> bool {
        any_match(query, corpus, self.comparator)
    }
}
