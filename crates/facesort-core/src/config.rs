//! Naming layout and per-run options.
//!
//! [`Layout`] is built once at startup and passed by reference to every
//! component, so marker names and suffixes have a single source of truth.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Reserved names that give directories and files their role.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Layout {
    /// Sub-directory whose presence marks an album; also holds its training data.
    pub album_marker: String,
    /// Cache directory created directly under a source root.
    pub cache_dir: String,
    /// Directory inside `cache_dir` holding one entry per content hash.
    pub cache_faces_dir: String,
    /// Suffix of a training sample's vector directory.
    pub training_dir_suffix: String,
    /// Suffix of a training sample's link back to its source image.
    pub training_src_suffix: String,
    /// Extension (without dot) of a serialized feature vector.
    pub encoding_extension: String,
    /// Accepted image extensions (without dot, compared case-insensitively).
    pub image_extensions: Vec<String>,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            album_marker: ".faces.d".to_string(),
            cache_dir: ".facesort".to_string(),
            cache_faces_dir: "faces".to_string(),
            training_dir_suffix: ".trainingimage.d".to_string(),
            training_src_suffix: ".trainingimage.src".to_string(),
            encoding_extension: "encoding".to_string(),
            image_extensions: vec!["jpg".to_string(), "jpeg".to_string()],
        }
    }
}

impl Layout {
    /// Parse a TOML layout; keys left out keep their defaults.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let layout: Layout = toml::from_str(src).map_err(|e| Error::Layout(e.to_string()))?;
        layout.validate()?;
        Ok(layout)
    }

    /// Read a TOML layout file.
    pub fn load(path: &Path) -> Result<Self> {
        let src = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml_str(&src)
    }

    fn validate(&self) -> Result<()> {
        let names = [
            ("album_marker", &self.album_marker),
            ("cache_dir", &self.cache_dir),
            ("cache_faces_dir", &self.cache_faces_dir),
        ];
        for (key, value) in names {
            if value.is_empty() || value.contains(['/', '\\']) || value == "." || value == ".." {
                return Err(Error::Layout(format!(
                    "{key} must be a single path component, got {value:?}"
                )));
            }
        }
        if self.image_extensions.is_empty() {
            return Err(Error::Layout("image_extensions must not be empty".into()));
        }
        Ok(())
    }

    /// True if `path` carries one of the accepted image extensions.
    pub fn is_image_name(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.image_extensions
                    .iter()
                    .any(|accepted| accepted.eq_ignore_ascii_case(ext))
            })
    }

    /// `<album_dir>/<album_marker>`
    pub fn marker_dir(&self, album_dir: &Path) -> PathBuf {
        album_dir.join(&self.album_marker)
    }

    /// `<source_root>/<cache_dir>`
    pub fn cache_root(&self, source_root: &Path) -> PathBuf {
        source_root.join(&self.cache_dir)
    }

    /// `<source_root>/<cache_dir>/<cache_faces_dir>`
    pub fn cache_faces_root(&self, source_root: &Path) -> PathBuf {
        self.cache_root(source_root).join(&self.cache_faces_dir)
    }

    /// Vector directory of a training sample.
    pub fn training_dir(&self, album_dir: &Path, sample_id: &str) -> PathBuf {
        self.marker_dir(album_dir)
            .join(format!("{sample_id}{}", self.training_dir_suffix))
    }

    /// Source reference of a training sample.
    pub fn training_src(&self, album_dir: &Path, sample_id: &str) -> PathBuf {
        self.marker_dir(album_dir)
            .join(format!("{sample_id}{}", self.training_src_suffix))
    }

    /// File name of a stored vector with the given digest.
    pub fn encoding_file_name(&self, digest: &str) -> String {
        format!("{digest}.{}", self.encoding_extension)
    }
}

/// Options for one reconciliation run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Root searched for album directories.
    pub albums_root: PathBuf,
    /// Log every mutation instead of performing it.
    pub dry_run: bool,
    /// Remove previously placed images before placing.
    pub delete_old: bool,
    /// Place images as relative symlinks instead of copies.
    pub symlink: bool,
    /// Read and refresh the encoding cache.
    pub use_cache: bool,
    /// Restrict the run to these images; empty means the whole source tree.
    pub only: Vec<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            albums_root: PathBuf::from("."),
            dry_run: false,
            delete_old: true,
            symlink: false,
            use_cache: true,
            only: Vec::new(),
        }
    }
}

impl RunOptions {
    pub fn new(albums_root: impl Into<PathBuf>) -> Self {
        Self {
            albums_root: albums_root.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_paths() {
        let layout = Layout::default();
        let album = Path::new("/albums/alice");
        assert_eq!(
            layout.training_dir(album, "albert-abc"),
            PathBuf::from("/albums/alice/.faces.d/albert-abc.trainingimage.d")
        );
        assert_eq!(
            layout.training_src(album, "abc"),
            PathBuf::from("/albums/alice/.faces.d/abc.trainingimage.src")
        );
        assert_eq!(
            layout.cache_faces_root(Path::new("/photos")),
            PathBuf::from("/photos/.facesort/faces")
        );
        assert_eq!(layout.encoding_file_name("ff"), "ff.encoding");
    }

    #[test]
    fn test_image_extension_case_insensitive() {
        let layout = Layout::default();
        assert!(layout.is_image_name(Path::new("a.jpg")));
        assert!(layout.is_image_name(Path::new("a.JPEG")));
        assert!(!layout.is_image_name(Path::new("a.png")));
        assert!(!layout.is_image_name(Path::new("jpg")));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let layout = Layout::from_toml_str(
            r#"
            album_marker = ".people"
            image_extensions = ["jpg", "png"]
            "#,
        )
        .unwrap();
        assert_eq!(layout.album_marker, ".people");
        assert_eq!(layout.cache_dir, ".facesort");
        assert!(layout.is_image_name(Path::new("x.png")));
    }

    #[test]
    fn test_toml_rejects_nested_marker() {
        let err = Layout::from_toml_str(r#"album_marker = "a/b""#).unwrap_err();
        assert!(matches!(err, Error::Layout(_)));
    }

    #[test]
    fn test_toml_rejects_unknown_key() {
        assert!(Layout::from_toml_str("colour = \"blue\"").is_err());
    }

    #[test]
    fn test_run_options_defaults() {
        let opts = RunOptions::new("albums");
        assert!(opts.delete_old);
        assert!(opts.use_cache);
        assert!(!opts.symlink);
        assert!(!opts.dry_run);
        assert!(opts.only.is_empty());
    }
}
