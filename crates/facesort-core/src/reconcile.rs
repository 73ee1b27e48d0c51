//! Album reconciliation.
//!
//! One run goes through: validate roots, discover source images, refresh the
//! encoding cache, discover albums, delete previously placed images, then
//! place every source image into each album whose training corpus it matches.
//! With `dry_run`, every mutation is logged instead of performed.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::cache::{EncodingCache, RefreshStats};
use crate::classify::{self, Album};
use crate::config::{Layout, RunOptions};
use crate::corpus::{self, TrainingCorpus, TrainingSample};
use crate::error::{Error, Result};
use crate::fsutil;
use crate::image::Image;
use crate::matcher::MatchEngine;
use crate::types::{FeatureComparator, FeatureExtractor, FeatureVector};

/// One image placed (or, in a dry run, to be placed) into an album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub album: PathBuf,
    pub image: PathBuf,
    pub destination: PathBuf,
}

/// What a run did, or would have done in a dry run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub sources: usize,
    pub albums: usize,
    pub refresh: Option<RefreshStats>,
    pub deleted: Vec<PathBuf>,
    pub placed: Vec<Placement>,
}

/// Drives whole runs against injected face capabilities.
pub struct Reconciler {
    layout: Layout,
    extractor: Box<dyn FeatureExtractor>,
    comparator: Box<dyn FeatureComparator>,
}

impl Reconciler {
    pub fn new(
        layout: Layout,
        extractor: Box<dyn FeatureExtractor>,
        comparator: Box<dyn FeatureComparator>,
    ) -> Self {
        Self {
            layout,
            extractor,
            comparator,
        }
    }

    /// Delete the encoding cache under `root`.
    pub fn clear_cache(&self, root: &Path, dry_run: bool) -> Result<bool> {
        clear_cache(root, &self.layout, dry_run)
    }

    /// Add training data for the persons in `training_image` to `album_dir`.
    pub fn add_persons(
        &mut self,
        album_dir: &Path,
        training_image: &Path,
        label: Option<&str>,
        dry_run: bool,
    ) -> Result<TrainingSample> {
        if dry_run {
            tracing::warn!("dry run: no files will be written");
        }
        corpus::add_persons(
            self.extractor.as_mut(),
            album_dir,
            training_image,
            label,
            dry_run,
            &self.layout,
        )
    }

    /// Process a single image, using its directory as the source root.
    pub fn process_image(&mut self, image: &Path, options: &RunOptions) -> Result<RunReport> {
        let image = fsutil::absolute(image)?;
        Image::open(&image, &self.layout)?;
        let root = image
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| Error::invalid_path(&image, "has no parent directory"))?;

        let options = RunOptions {
            only: vec![image],
            ..options.clone()
        };
        self.process_directory(&root, &options)
    }

    /// Reconcile every album under `options.albums_root` against the source
    /// images under `root`.
    pub fn process_directory(&mut self, root: &Path, options: &RunOptions) -> Result<RunReport> {
        if options.dry_run {
            tracing::warn!("dry run: no files will be changed");
        }

        // Validate
        let root = fsutil::absolute(root)?;
        classify::validate_root(&root)?;
        let albums_root = fsutil::absolute(&options.albums_root)?;
        classify::validate_root(&albums_root)?;

        let filter: Option<Vec<OsString>> = if options.only.is_empty() {
            None
        } else {
            let mut names = Vec::with_capacity(options.only.len());
            for path in &options.only {
                let image = Image::open(fsutil::absolute(path)?, &self.layout)?;
                names.push(image.file_name().to_os_string());
            }
            Some(names)
        };
        let selected = |image: &Image| {
            filter
                .as_ref()
                .map_or(true, |names| names.iter().any(|n| n.as_os_str() == image.file_name()))
        };

        // Discover sources
        let discovery = classify::discover(&root, &self.layout)?;

        // Refresh cache
        let mut report = RunReport::default();
        let cache = if !options.use_cache {
            None
        } else if options.dry_run {
            match EncodingCache::open_existing(&root, &self.layout) {
                Ok(cache) => Some(cache),
                Err(Error::CacheMissing(path)) => {
                    tracing::warn!(
                        path = %path.display(),
                        "no encoding cache; extracting faces directly"
                    );
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            let cache = EncodingCache::open(&root, &self.layout);
            report.refresh = Some(cache.refresh(
                self.extractor.as_mut(),
                &discovery.sources,
                filter.as_deref(),
            )?);
            Some(cache)
        };

        let sources: Vec<Image> = discovery
            .sources
            .into_iter()
            .filter(|image| selected(image))
            .collect();
        report.sources = sources.len();

        // Discover albums
        let albums = if albums_root == root {
            discovery.albums
        } else {
            classify::discover(&albums_root, &self.layout)?.albums
        };
        report.albums = albums.len();

        // Delete old
        if options.delete_old {
            for album in &albums {
                let doomed = album.placed.iter().filter(|placed| {
                    filter.as_ref().map_or(true, |names| {
                        placed
                            .file_name()
                            .is_some_and(|f| names.iter().any(|n| n.as_os_str() == f))
                    })
                });
                for path in doomed {
                    delete_placed(path, options.dry_run)?;
                    report.deleted.push(path.clone());
                }
            }
        }

        // Classify & place
        let mut engine = MatchEngine::new(self.extractor.as_mut(), self.comparator.as_ref());
        let mut vectors: HashMap<PathBuf, Vec<FeatureVector>> = HashMap::new();
        for album in &albums {
            let corpus = TrainingCorpus::load(&album.dir, &self.layout)?;
            if corpus.is_empty() {
                tracing::debug!(album = %album.dir.display(), "no training data; skipping album");
                continue;
            }

            for image in &sources {
                if !vectors.contains_key(image.path()) {
                    let query = engine.vectors(image, cache.as_ref())?;
                    vectors.insert(image.path().to_path_buf(), query);
                }
                if !engine.matches_vectors(&vectors[image.path()], &corpus) {
                    continue;
                }

                if let Some(placement) = place(album, image, options)? {
                    report.placed.push(placement);
                }
            }
        }

        tracing::info!(
            sources = report.sources,
            albums = report.albums,
            deleted = report.deleted.len(),
            placed = report.placed.len(),
            dry_run = options.dry_run,
            "run complete"
        );
        Ok(report)
    }
}

/// Delete the encoding cache under `root`, which must be an existing
/// directory. Needs no face capabilities.
pub fn clear_cache(root: &Path, layout: &Layout, dry_run: bool) -> Result<bool> {
    let root = fsutil::absolute(root)?;
    classify::validate_root(&root)?;
    EncodingCache::clear(&root, layout, dry_run)
}

fn delete_placed(path: &Path, dry_run: bool) -> Result<()> {
    if dry_run {
        tracing::info!(dry_run, path = %path.display(), "would delete old image");
        return Ok(());
    }
    if fsutil::remove_file_if_exists(path)? {
        tracing::info!(path = %path.display(), "deleted old image");
    }
    Ok(())
}

/// Put `image` into `album` under its base name, replacing whatever is there.
fn place(album: &Album, image: &Image, options: &RunOptions) -> Result<Option<Placement>> {
    let destination = album.dir.join(image.file_name());
    if same_file(image.path(), &destination) {
        tracing::debug!(image = %image.path().display(), "image already is the album file");
        return Ok(None);
    }

    let placement = Placement {
        album: album.dir.clone(),
        image: image.path().to_path_buf(),
        destination,
    };
    let how = if options.symlink { "symlink" } else { "copy" };

    if options.dry_run {
        tracing::info!(
            dry_run = true,
            album = %placement.album.display(),
            image = %placement.image.display(),
            how,
            "would place image"
        );
        return Ok(Some(placement));
    }

    fsutil::remove_file_if_exists(&placement.destination)?;
    if options.symlink {
        let target = fsutil::relative_path(&placement.image, &placement.album);
        fsutil::symlink(&target, &placement.destination)?;
    } else {
        fsutil::copy_with_metadata(&placement.image, &placement.destination)?;
    }
    tracing::info!(
        album = %placement.album.display(),
        image = %placement.image.display(),
        how,
        "placed image"
    );
    Ok(Some(placement))
}

/// True if `dest` is `source` itself, reached through another path. A symlink
/// at `dest` is never the same file: it is a previous placement.
fn same_file(source: &Path, dest: &Path) -> bool {
    let dest_is_link = std::fs::symlink_metadata(dest)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);
    if dest_is_link {
        return false;
    }
    match (std::fs::canonicalize(source), std::fs::canonicalize(dest)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
