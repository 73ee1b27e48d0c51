//! Per-album training data.
//!
//! Each training image contributes one sample under the album marker:
//! `<id>.trainingimage.d/` with one `.encoding` file per detected face, and
//! `<id>.trainingimage.src` linking back to the original image. The sample id
//! is the image's content hash, optionally prefixed with `<label>-`.

use std::path::{Path, PathBuf};

use crate::config::Layout;
use crate::encoding;
use crate::error::{Error, Result};
use crate::fsutil;
use crate::image::Image;
use crate::types::{FeatureExtractor, FeatureVector};

const STAGING_SUFFIX: &str = ".partial";

/// Reference vectors derived from one training image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingSample {
    pub id: String,
    pub vectors: Vec<FeatureVector>,
    /// Where the training image lived, if the reference is still readable.
    pub source: Option<PathBuf>,
}

/// All training samples of one album.
#[derive(Debug, Clone, Default)]
pub struct TrainingCorpus {
    samples: Vec<TrainingSample>,
}

impl TrainingCorpus {
    /// Load every sample stored under `album_dir`. An album without a marker
    /// directory has an empty corpus.
    pub fn load(album_dir: &Path, layout: &Layout) -> Result<Self> {
        let marker = layout.marker_dir(album_dir);
        let entries = match std::fs::read_dir(&marker) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::io(&marker, e)),
        };

        let mut samples = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&marker, e))?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(id) = name.strip_suffix(layout.training_dir_suffix.as_str()) else {
                continue;
            };
            if !path.is_dir() {
                continue;
            }

            let vectors = encoding::read_vectors(&path, layout)?;
            let source = read_source_reference(&layout.training_src(album_dir, id));
            samples.push(TrainingSample {
                id: id.to_string(),
                vectors,
                source,
            });
        }
        samples.sort_by(|a, b| a.id.cmp(&b.id));

        tracing::debug!(
            album = %album_dir.display(),
            samples = samples.len(),
            "loaded training corpus"
        );
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[TrainingSample] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.iter().all(|s| s.vectors.is_empty())
    }

    /// Every stored reference vector, across samples.
    pub fn vectors(&self) -> impl Iterator<Item = &FeatureVector> {
        self.samples.iter().flat_map(|s| s.vectors.iter())
    }
}

/// `<label>-<hash>` or `<hash>`.
pub fn sample_id(label: Option<&str>, hash: &str) -> String {
    match label {
        Some(label) => format!("{label}-{hash}"),
        None => hash.to_string(),
    }
}

/// Add the persons found in `training_image` to the album at `album_dir`.
///
/// Every detected face becomes a reference vector of one sample. A sample with
/// the same id is replaced. Fails with [`Error::NoFaceDetected`] before
/// writing anything when the image has no face. With `dry_run` nothing is
/// written, but validation and extraction still run.
pub fn add_persons(
    extractor: &mut dyn FeatureExtractor,
    album_dir: &Path,
    training_image: &Path,
    label: Option<&str>,
    dry_run: bool,
    layout: &Layout,
) -> Result<TrainingSample> {
    let image = Image::open(training_image, layout)?;
    // An empty label means no label.
    let label = label.filter(|l| !l.is_empty());
    if let Some(label) = label {
        validate_label(training_image, label)?;
    }

    tracing::info!(image = %training_image.display(), "calculating face encodings");
    let bytes = image.read_bytes()?;
    let vectors = extractor.extract(&bytes).map_err(|source| Error::Extract {
        path: training_image.to_path_buf(),
        source,
    })?;
    if vectors.is_empty() {
        return Err(Error::NoFaceDetected(training_image.to_path_buf()));
    }

    let id = sample_id(label, image.content_hash()?.as_str());
    let sample_dir = layout.training_dir(album_dir, &id);
    let src_link = layout.training_src(album_dir, &id);
    let source = fsutil::absolute(training_image)?;

    if dry_run {
        tracing::info!(
            dry_run,
            dir = %sample_dir.display(),
            faces = vectors.len(),
            "would write training data"
        );
        return Ok(TrainingSample {
            id,
            vectors,
            source: Some(source),
        });
    }

    tracing::info!(dir = %sample_dir.display(), "creating training data directory");
    let staging = PathBuf::from(format!("{}{STAGING_SUFFIX}", sample_dir.display()));
    fsutil::remove_dir_all_if_exists(&staging)?;
    fsutil::create_dir_all(&staging)?;
    for (idx, vector) in vectors.iter().enumerate() {
        tracing::debug!(face = idx + 1, total = vectors.len(), "writing face encoding");
        encoding::write_vector(&staging, vector, layout)?;
    }
    fsutil::remove_dir_all_if_exists(&sample_dir)?;
    fsutil::rename(&staging, &sample_dir)?;

    fsutil::remove_file_if_exists(&src_link)?;
    write_source_reference(&source, &src_link)?;
    tracing::info!(link = %src_link.display(), "linked training image");

    Ok(TrainingSample {
        id,
        vectors,
        source: Some(source),
    })
}

fn validate_label(training_image: &Path, label: &str) -> Result<()> {
    if label.contains(['/', '\\']) {
        return Err(Error::InvalidPath {
            path: training_image.to_path_buf(),
            reason: format!("training label {label:?} must not contain a path separator"),
        });
    }
    Ok(())
}

#[cfg(unix)]
fn write_source_reference(source: &Path, link: &Path) -> Result<()> {
    fsutil::symlink(source, link)
}

#[cfg(not(unix))]
fn write_source_reference(source: &Path, link: &Path) -> Result<()> {
    std::fs::write(link, source.to_string_lossy().as_bytes()).map_err(|e| Error::io(link, e))
}

fn read_source_reference(link: &Path) -> Option<PathBuf> {
    match std::fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => std::fs::read_link(link).ok(),
        Ok(meta) if meta.is_file() => std::fs::read_to_string(link)
            .ok()
            .map(|s| PathBuf::from(s.trim_end())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ExtractError;

    /// Each line of the file is one face; an empty file has none.
    struct LineFaces;

    impl FeatureExtractor for LineFaces {
        fn extract(
            &mut self,
            bytes: &[u8],
        ) -> std::result::Result<Vec<FeatureVector>, ExtractError> {
            Ok(bytes
                .split(|b| *b == b'\n')
                .filter(|l| !l.is_empty())
                .map(|l| FeatureVector::new(l.to_vec()))
                .collect())
        }
    }

    fn tree() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let album = tmp.path().join("albums/alice");
        let img = tmp.path().join("A.jpg");
        std::fs::write(&img, b"alice").unwrap();
        (tmp, album, img)
    }

    #[test]
    fn test_sample_id() {
        assert_eq!(sample_id(Some("albert"), "abc"), "albert-abc");
        assert_eq!(sample_id(None, "abc"), "abc");
    }

    #[test]
    fn test_add_persons_writes_sample() {
        let (_tmp, album, img) = tree();
        let layout = Layout::default();
        let sample =
            add_persons(&mut LineFaces, &album, &img, Some("albert"), false, &layout).unwrap();

        let hash = crate::image::ContentHash::of_bytes(b"alice");
        assert_eq!(sample.id, format!("albert-{hash}"));

        let dir = layout.training_dir(&album, &sample.id);
        let files: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        assert_eq!(files.len(), 1);

        let corpus = TrainingCorpus::load(&album, &layout).unwrap();
        assert_eq!(corpus.samples().len(), 1);
        assert_eq!(corpus.samples()[0].vectors, vec![FeatureVector::new(b"alice".to_vec())]);
        assert_eq!(corpus.samples()[0].source.as_deref(), Some(img.as_path()));
    }

    #[test]
    fn test_multiple_faces_all_kept() {
        let (_tmp, album, img) = tree();
        std::fs::write(&img, b"alice\nbob\ncarol").unwrap();
        let layout = Layout::default();
        let sample = add_persons(&mut LineFaces, &album, &img, None, false, &layout).unwrap();
        assert_eq!(sample.vectors.len(), 3);

        let corpus = TrainingCorpus::load(&album, &layout).unwrap();
        assert_eq!(corpus.vectors().count(), 3);
    }

    #[test]
    fn test_no_face_writes_nothing() {
        let (tmp, album, img) = tree();
        std::fs::write(&img, b"").unwrap();
        let err = add_persons(&mut LineFaces, &album, &img, None, false, &Layout::default())
            .unwrap_err();
        assert!(matches!(err, Error::NoFaceDetected(_)), "got {err:?}");
        assert!(!tmp.path().join("albums").exists());
    }

    #[test]
    fn test_readding_replaces_sample() {
        let (_tmp, album, img) = tree();
        let layout = Layout::default();
        add_persons(&mut LineFaces, &album, &img, Some("a"), false, &layout).unwrap();

        // Simulate a stale vector left by an older extractor.
        let id = sample_id(Some("a"), crate::image::ContentHash::of_bytes(b"alice").as_str());
        let dir = layout.training_dir(&album, &id);
        encoding::write_vector(&dir, &FeatureVector::new(b"stale".to_vec()), &layout).unwrap();
        assert_eq!(TrainingCorpus::load(&album, &layout).unwrap().vectors().count(), 2);

        add_persons(&mut LineFaces, &album, &img, Some("a"), false, &layout).unwrap();
        let corpus = TrainingCorpus::load(&album, &layout).unwrap();
        assert_eq!(corpus.samples().len(), 1);
        assert_eq!(corpus.vectors().count(), 1);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (tmp, album, img) = tree();
        let sample =
            add_persons(&mut LineFaces, &album, &img, None, true, &Layout::default()).unwrap();
        assert_eq!(sample.vectors.len(), 1);
        assert!(!tmp.path().join("albums").exists());
    }

    #[test]
    fn test_label_with_separator_rejected() {
        let (_tmp, album, img) = tree();
        let err = add_persons(&mut LineFaces, &album, &img, Some("../x"), false, &Layout::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }

    #[test]
    fn test_empty_label_means_no_label() {
        let (_tmp, album, img) = tree();
        let layout = Layout::default();
        let sample = add_persons(&mut LineFaces, &album, &img, Some(""), false, &layout).unwrap();

        let hash = crate::image::ContentHash::of_bytes(b"alice");
        assert_eq!(sample.id, hash.as_str());
        assert!(layout.training_dir(&album, hash.as_str()).is_dir());
    }

    #[test]
    fn test_dot_label_is_accepted() {
        let (_tmp, album, img) = tree();
        let layout = Layout::default();
        let sample = add_persons(&mut LineFaces, &album, &img, Some(".x"), false, &layout).unwrap();
        assert!(sample.id.starts_with(".x-"));
        assert_eq!(TrainingCorpus::load(&album, &layout).unwrap().samples().len(), 1);
    }

    #[test]
    fn test_load_without_marker_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let corpus = TrainingCorpus::load(tmp.path(), &Layout::default()).unwrap();
        assert!(corpus.is_empty());
        assert!(corpus.samples().is_empty());
    }

    #[test]
    fn test_load_skips_unfinished_staging() {
        let (_tmp, album, img) = tree();
        let layout = Layout::default();
        add_persons(&mut LineFaces, &album, &img, None, false, &layout).unwrap();
        let staging = layout
            .marker_dir(&album)
            .join(format!("zzz{}{STAGING_SUFFIX}", layout.training_dir_suffix));
        std::fs::create_dir_all(&staging).unwrap();

        assert_eq!(TrainingCorpus::load(&album, &layout).unwrap().samples().len(), 1);
    }
}
