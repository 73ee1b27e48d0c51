//! Content-addressed cache of extracted feature vectors.
//!
//! Layout: `<source_root>/<cache_dir>/<cache_faces_dir>/<content_hash>/<digest>.encoding`.
//! The presence of a hash directory, even an empty one, means the content was
//! already extracted. Entries are never invalidated; [`EncodingCache::clear`]
//! is the only way to drop them.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::Layout;
use crate::encoding;
use crate::error::{Error, Result};
use crate::fsutil;
use crate::image::{ContentHash, Image};
use crate::types::{FeatureExtractor, FeatureVector};

const STAGING_SUFFIX: &str = ".partial";

/// Counters from one [`EncodingCache::refresh`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    /// Entries created by calling the extractor.
    pub extracted: usize,
    /// Images whose content already had an entry.
    pub already_cached: usize,
    /// Images left out by the filter.
    pub skipped: usize,
}

/// Encoding cache scoped to one source root.
pub struct EncodingCache<'a> {
    faces_root: PathBuf,
    layout: &'a Layout,
}

impl<'a> EncodingCache<'a> {
    /// Handle for the cache under `source_root`. Nothing is created until the
    /// first entry is written.
    pub fn open(source_root: &Path, layout: &'a Layout) -> Self {
        Self {
            faces_root: layout.cache_faces_root(source_root),
            layout,
        }
    }

    /// Like [`open`](Self::open), but fails with [`Error::CacheMissing`] when
    /// no cache has been created yet.
    pub fn open_existing(source_root: &Path, layout: &'a Layout) -> Result<Self> {
        let cache = Self::open(source_root, layout);
        if cache.faces_root.is_dir() {
            Ok(cache)
        } else {
            Err(Error::CacheMissing(cache.faces_root))
        }
    }

    pub fn faces_root(&self) -> &Path {
        &self.faces_root
    }

    fn entry_dir(&self, hash: &ContentHash) -> PathBuf {
        self.faces_root.join(hash.as_str())
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.entry_dir(hash).is_dir()
    }

    /// Extract and store vectors for every image whose content has no entry.
    ///
    /// With a `filter`, only images whose base file name appears in it are
    /// considered. Images without faces still get an (empty) entry so they are
    /// not retried on the next run.
    pub fn refresh(
        &self,
        extractor: &mut dyn FeatureExtractor,
        images: &[Image],
        filter: Option<&[OsString]>,
    ) -> Result<RefreshStats> {
        let mut stats = RefreshStats::default();
        let mut seen: HashSet<ContentHash> = HashSet::new();

        for image in images {
            if let Some(names) = filter {
                if !names.iter().any(|n| n.as_os_str() == image.file_name()) {
                    stats.skipped += 1;
                    continue;
                }
            }

            let hash = image.content_hash()?;
            if seen.contains(hash) || self.contains(hash) {
                tracing::debug!(image = %image.path().display(), %hash, "cache hit");
                stats.already_cached += 1;
                continue;
            }

            tracing::info!(image = %image.path().display(), "calculating face encodings");
            let bytes = image.read_bytes()?;
            let vectors = extractor.extract(&bytes).map_err(|source| Error::Extract {
                path: image.path().to_path_buf(),
                source,
            })?;
            self.store(hash, &vectors)?;
            seen.insert(hash.clone());
            stats.extracted += 1;

            tracing::debug!(
                image = %image.path().display(),
                %hash,
                faces = vectors.len(),
                "cached encodings"
            );
        }

        tracing::info!(
            extracted = stats.extracted,
            already_cached = stats.already_cached,
            skipped = stats.skipped,
            "cache refreshed"
        );
        Ok(stats)
    }

    /// Persist an entry. Vectors are written to a staging directory that is
    /// renamed into place, so an interrupted write never looks complete.
    /// An existing entry is left untouched.
    pub fn store(&self, hash: &ContentHash, vectors: &[FeatureVector]) -> Result<()> {
        let entry = self.entry_dir(hash);
        if entry.is_dir() {
            return Ok(());
        }
        let staging = self
            .faces_root
            .join(format!("{}{STAGING_SUFFIX}", hash.as_str()));

        fsutil::remove_dir_all_if_exists(&staging)?;
        fsutil::create_dir_all(&staging)?;
        for vector in vectors {
            encoding::write_vector(&staging, vector, self.layout)?;
        }
        fsutil::rename(&staging, &entry)
    }

    /// Cached vectors for `image`, or `None` on a miss.
    pub fn lookup(&self, image: &Image) -> Result<Option<Vec<FeatureVector>>> {
        let dir = self.entry_dir(image.content_hash()?);
        if !dir.is_dir() {
            return Ok(None);
        }
        encoding::read_vectors(&dir, self.layout).map(Some)
    }

    /// Delete the whole cache under `source_root`. Returns `false` when there
    /// was nothing to delete.
    pub fn clear(source_root: &Path, layout: &Layout, dry_run: bool) -> Result<bool> {
        let cache_root = layout.cache_root(source_root);
        if dry_run {
            let exists = cache_root.exists();
            tracing::info!(dry_run, path = %cache_root.display(), exists, "would clear cache");
            return Ok(exists);
        }
        let removed = fsutil::remove_dir_all_if_exists(&cache_root)?;
        if removed {
            tracing::info!(path = %cache_root.display(), "cleared cache directory");
        } else {
            tracing::warn!(path = %cache_root.display(), "no previous cache found");
        }
        Ok(removed)
    }
}
