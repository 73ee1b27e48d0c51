#![allow(dead_code)]

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use facesort_core::{
    ExtractError, FeatureComparator, FeatureExtractor, FeatureVector, Layout, Reconciler,
};

/// Reads the first line of a file as `faces:<name>,<name>,...`; anything else
/// has no face. Each name becomes one vector holding the name's bytes.
pub struct FakeExtractor {
    pub calls: Rc<Cell<usize>>,
}

impl FeatureExtractor for FakeExtractor {
    fn extract(&mut self, bytes: &[u8]) -> Result<Vec<FeatureVector>, ExtractError> {
        self.calls.set(self.calls.get() + 1);
        let text =
            std::str::from_utf8(bytes).map_err(|e| ExtractError::with_source("not utf-8", e))?;
        let first = text.lines().next().unwrap_or_default();
        let Some(names) = first.strip_prefix("faces:") else {
            return Ok(vec![]);
        };
        Ok(names
            .split(',')
            .filter(|n| !n.is_empty())
            .map(|n| FeatureVector::new(n.as_bytes().to_vec()))
            .collect())
    }
}

pub struct SameName;

impl FeatureComparator for SameName {
    fn matches(&self, a: &FeatureVector, b: &FeatureVector) -> bool {
        a == b
    }
}

/// A reconciler over the fake capabilities plus its extraction counter.
pub fn reconciler() -> (Reconciler, Rc<Cell<usize>>) {
    let calls = Rc::new(Cell::new(0));
    let extractor = FakeExtractor {
        calls: Rc::clone(&calls),
    };
    (
        Reconciler::new(Layout::default(), Box::new(extractor), Box::new(SameName)),
        calls,
    )
}

/// Write an image whose fake content shows `faces`. `tag` keeps contents
/// distinct between files showing the same people.
pub fn write_image(path: &Path, faces: &[&str], tag: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let body = if faces.is_empty() {
        format!("nobody here\n{tag}")
    } else {
        format!("faces:{}\n{tag}", faces.join(","))
    };
    fs::write(path, body).unwrap();
}

/// Non-hidden entry names directly inside `dir`, sorted.
pub fn visible_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| !n.starts_with('.'))
        .collect();
    names.sort();
    names
}

/// Every path under `root` with a description of its content: file bytes,
/// symlink target, or a directory marker.
pub fn tree_state(root: &Path) -> BTreeMap<PathBuf, String> {
    let mut state = BTreeMap::new();
    collect(root, root, &mut state);
    state
}

fn collect(root: &Path, dir: &Path, state: &mut BTreeMap<PathBuf, String>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        let rel = path.strip_prefix(root).unwrap().to_path_buf();
        let meta = fs::symlink_metadata(&path).unwrap();
        if meta.file_type().is_symlink() {
            state.insert(rel, format!("link -> {}", fs::read_link(&path).unwrap().display()));
        } else if meta.is_dir() {
            state.insert(rel, "dir".to_string());
            collect(root, &path, state);
        } else {
            state.insert(rel, String::from_utf8_lossy(&fs::read(&path).unwrap()).into_owned());
        }
    }
}
