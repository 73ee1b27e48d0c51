//! On-disk form of a single feature vector.
//!
//! Each `.encoding` file is a small JSON document holding the vector's bytes.
//! Files are named after the SHA-256 of that document, so writing the same
//! vector twice into a directory yields one file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::Layout;
use crate::error::{Error, Result};
use crate::types::{hex_digest, FeatureVector};

const ENCODING_FORMAT: u32 = 1;

#[derive(Serialize, Deserialize)]
struct EncodingFile {
    format: u32,
    data: Vec<u8>,
}

/// Serialize a vector to its `.encoding` document.
pub fn to_document(vector: &FeatureVector) -> Vec<u8> {
    let file = EncodingFile {
        format: ENCODING_FORMAT,
        data: vector.as_bytes().to_vec(),
    };
    // Serializing a struct of plain integers cannot fail.
    serde_json::to_vec(&file).unwrap_or_default()
}

/// Parse an `.encoding` document read from `path`.
pub fn from_document(path: &Path, bytes: &[u8]) -> Result<FeatureVector> {
    let file: EncodingFile = serde_json::from_slice(bytes).map_err(|e| Error::Encoding {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if file.format != ENCODING_FORMAT {
        return Err(Error::Encoding {
            path: path.to_path_buf(),
            reason: format!("unsupported format version {}", file.format),
        });
    }
    Ok(FeatureVector::new(file.data))
}

/// Write `vector` into `dir`, returning the file's path.
pub fn write_vector(dir: &Path, vector: &FeatureVector, layout: &Layout) -> Result<PathBuf> {
    let document = to_document(vector);
    let path = dir.join(layout.encoding_file_name(&hex_digest(&document)));
    std::fs::write(&path, &document).map_err(|e| Error::io(&path, e))?;
    Ok(path)
}

/// Read every `.encoding` file directly inside `dir`, ordered by file name.
///
/// Other files are ignored. The directory must exist.
pub fn read_vectors(dir: &Path, layout: &Layout) -> Result<Vec<FeatureVector>> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        let is_encoding = path
            .extension()
            .is_some_and(|ext| ext == layout.encoding_extension.as_str());
        if is_encoding && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let bytes = std::fs::read(&path).map_err(|e| Error::io(&path, e))?;
            from_document(&path, &bytes)
        })
        .collect()
}
