//! Validated image paths and their content hashes.

use sha2::{Digest, Sha256};
use std::cell::OnceCell;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::config::Layout;
use crate::error::{Error, Result};

/// Lowercase hex SHA-256 of a file's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    /// Stream a file through SHA-256.
    pub fn of_file(path: &Path) -> Result<Self> {
        let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher).map_err(|e| Error::io(path, e))?;
        Ok(Self(hex::encode(hasher.finalize())))
    }

    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An image file that passed validation. Its content hash is computed on
/// first use and kept for the lifetime of the value.
#[derive(Debug, Clone)]
pub struct Image {
    path: PathBuf,
    hash: OnceCell<ContentHash>,
}

impl Image {
    /// Validate `path`: it must exist, be a regular file (after following
    /// symlinks) and carry an accepted image extension.
    pub fn open(path: impl Into<PathBuf>, layout: &Layout) -> Result<Self> {
        let path = path.into();
        let meta = match std::fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::invalid_path(path, "does not exist"));
            }
            Err(e) => return Err(Error::io(path, e)),
        };
        if !meta.is_file() {
            return Err(Error::invalid_path(path, "is not a regular file"));
        }
        if !layout.is_image_name(&path) {
            return Err(Error::invalid_path(
                path,
                format!(
                    "unsupported file type (accepted: {})",
                    layout.image_extensions.join(", ")
                ),
            ));
        }
        Ok(Self::unchecked(path))
    }

    /// Wrap a path already known to be a regular image file (e.g. from a walk).
    pub(crate) fn unchecked(path: PathBuf) -> Self {
        Self {
            path,
            hash: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Base file name, used for placement and filename-keyed deletion.
    pub fn file_name(&self) -> &std::ffi::OsStr {
        self.path.file_name().unwrap_or(self.path.as_os_str())
    }

    pub fn content_hash(&self) -> Result<&ContentHash> {
        if let Some(hash) = self.hash.get() {
            return Ok(hash);
        }
        let hash = ContentHash::of_file(&self.path)?;
        Ok(self.hash.get_or_init(|| hash))
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.path).map_err(|e| Error::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Image::open(dir.path().join("nope.jpg"), &Layout::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }), "got {err:?}");
    }

    #[test]
    fn test_open_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("folder.jpg");
        std::fs::create_dir(&sub).unwrap();
        let err = Image::open(&sub, &Layout::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }), "got {err:?}");
    }

    #[test]
    fn test_open_rejects_wrong_extension() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.png");
        std::fs::write(&file, b"x").unwrap();
        let err = Image::open(&file, &Layout::default()).unwrap_err();
        assert!(err.to_string().contains("unsupported file type"), "got {err}");
    }

    #[test]
    fn test_content_hash_matches_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("A.JPG");
        std::fs::write(&file, b"abc").unwrap();
        let image = Image::open(&file, &Layout::default()).unwrap();
        assert_eq!(image.content_hash().unwrap(), &ContentHash::of_bytes(b"abc"));
        assert_eq!(
            image.content_hash().unwrap().as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_content_hash_is_computed_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.jpg");
        std::fs::write(&file, b"first").unwrap();
        let image = Image::open(&file, &Layout::default()).unwrap();
        let first = image.content_hash().unwrap().clone();
        std::fs::write(&file, b"second").unwrap();
        assert_eq!(image.content_hash().unwrap(), &first);
    }
}
