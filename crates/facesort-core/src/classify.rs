//! Directory discovery: which directories are albums, which files are images.
//!
//! Discovery is split in two. [`snapshot`] walks the tree once (following
//! symlinks) and records what it saw; [`classify`] is a pure function over
//! that record. A directory is an album iff it directly contains the album
//! marker. Image files in albums are placed images, image files anywhere else
//! are source images. Hidden entries are recorded but never descended into,
//! which keeps marker and cache directories out of both sets.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Layout;
use crate::error::{Error, Result};
use crate::fsutil::is_hidden;
use crate::image::Image;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
    /// A symlink whose target no longer exists.
    BrokenLink,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// Everything one walk of a tree observed.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub root: PathBuf,
    pub entries: Vec<Entry>,
}

impl Snapshot {
    /// Build a snapshot from a list of entries without touching the disk.
    pub fn from_entries(root: impl Into<PathBuf>, entries: Vec<Entry>) -> Self {
        Self {
            root: root.into(),
            entries,
        }
    }
}

/// An album directory and the images placed directly inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub dir: PathBuf,
    pub placed: Vec<PathBuf>,
}

/// Result of classifying one tree.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub sources: Vec<Image>,
    pub albums: Vec<Album>,
}

/// Check that `root` exists and is a directory.
pub fn validate_root(root: &Path) -> Result<()> {
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::invalid_dir(root, "not a directory")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::invalid_dir(root, "does not exist"))
        }
        Err(e) => Err(Error::io(root, e)),
    }
}

/// Walk `root`, following symlinks, and record every entry.
pub fn snapshot(root: &Path) -> Result<Snapshot> {
    validate_root(root)?;

    let mut entries = Vec::new();
    let mut walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter();

    while let Some(next) = walker.next() {
        let entry = match next {
            Ok(entry) => entry,
            Err(err) => {
                if let Some(ancestor) = err.loop_ancestor() {
                    tracing::warn!(
                        path = ?err.path(),
                        ancestor = %ancestor.display(),
                        "symlink loop; not descending"
                    );
                    continue;
                }
                if let Some(path) = dangling_link(&err) {
                    entries.push(Entry {
                        path,
                        kind: EntryKind::BrokenLink,
                    });
                    continue;
                }
                return Err(Error::Walk(err));
            }
        };

        let file_type = entry.file_type();
        let kind = if file_type.is_dir() {
            EntryKind::Dir
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        let hidden_dir = kind == EntryKind::Dir && entry.depth() > 0 && is_hidden(entry.path());

        entries.push(Entry {
            path: entry.into_path(),
            kind,
        });

        if hidden_dir {
            walker.skip_current_dir();
        }
    }

    tracing::debug!(root = %root.display(), entries = entries.len(), "walked tree");
    Ok(Snapshot::from_entries(root, entries))
}

/// A walk error caused by a symlink pointing nowhere.
fn dangling_link(err: &walkdir::Error) -> Option<PathBuf> {
    let path = err.path()?;
    let io = err.io_error()?;
    let is_link = std::fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false);
    (io.kind() == std::io::ErrorKind::NotFound && is_link).then(|| path.to_path_buf())
}

/// Partition a snapshot into source images and albums.
pub fn classify(snapshot: &Snapshot, layout: &Layout) -> Discovery {
    let present: HashSet<&Path> = snapshot.entries.iter().map(|e| e.path.as_path()).collect();

    let mut albums: BTreeMap<PathBuf, Vec<PathBuf>> = snapshot
        .entries
        .iter()
        .filter(|e| e.kind == EntryKind::Dir)
        .filter(|e| present.contains(layout.marker_dir(&e.path).as_path()))
        .map(|e| (e.path.clone(), Vec::new()))
        .collect();

    let mut sources = Vec::new();
    for entry in &snapshot.entries {
        if !matches!(entry.kind, EntryKind::File | EntryKind::BrokenLink) {
            continue;
        }
        if is_hidden(&entry.path) || !layout.is_image_name(&entry.path) {
            continue;
        }
        let Some(parent) = entry.path.parent() else {
            continue;
        };

        if let Some(placed) = albums.get_mut(parent) {
            placed.push(entry.path.clone());
        } else if entry.kind == EntryKind::File {
            sources.push(Image::unchecked(entry.path.clone()));
        } else {
            tracing::warn!(path = %entry.path.display(), "skipping dangling symlink");
        }
    }

    Discovery {
        sources,
        albums: albums
            .into_iter()
            .map(|(dir, placed)| Album { dir, placed })
            .collect(),
    }
}

/// Walk and classify `root` in one step.
pub fn discover(root: &Path, layout: &Layout) -> Result<Discovery> {
    let snapshot = snapshot(root)?;
    let discovery = classify(&snapshot, layout);
    tracing::info!(
        root = %root.display(),
        sources = discovery.sources.len(),
        albums = discovery.albums.len(),
        "discovered tree"
    );
    Ok(discovery)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_paths(d: &Discovery) -> Vec<&Path> {
        d.sources.iter().map(|i| i.path()).collect()
    }

    fn dir(p: &str) -> Entry {
        Entry {
            path: PathBuf::from(p),
            kind: EntryKind::Dir,
        }
    }

    fn file(p: &str) -> Entry {
        Entry {
            path: PathBuf::from(p),
            kind: EntryKind::File,
        }
    }

    fn sample_tree() -> Snapshot {
        Snapshot::from_entries(
            "/r",
            vec![
                dir("/r"),
                file("/r/top.jpg"),
                dir("/r/trip"),
                file("/r/trip/beach.JPEG"),
                file("/r/trip/notes.txt"),
                dir("/r/alice"),
                dir("/r/alice/.faces.d"),
                file("/r/alice/beach.JPEG"),
                file("/r/alice/.hidden.jpg"),
                dir("/r/alice/nested"),
                file("/r/alice/nested/deep.jpg"),
            ],
        )
    }

    #[test]
    fn test_classify_partitions_sources_and_placed() {
        let d = classify(&sample_tree(), &Layout::default());

        let sources: Vec<_> = source_paths(&d);
        assert_eq!(
            sources,
            vec![
                Path::new("/r/top.jpg"),
                Path::new("/r/trip/beach.JPEG"),
                Path::new("/r/alice/nested/deep.jpg"),
            ]
        );
        assert_eq!(
            d.albums,
            vec![Album {
                dir: PathBuf::from("/r/alice"),
                placed: vec![PathBuf::from("/r/alice/beach.JPEG")],
            }]
        );
    }

    #[test]
    fn test_marker_flips_only_its_directory() {
        let mut tree = sample_tree();
        tree.entries.push(dir("/r/trip/.faces.d"));
        tree.entries.retain(|e| e.path != Path::new("/r/alice/.faces.d"));

        let d = classify(&tree, &Layout::default());
        let album_dirs: Vec<_> = d.albums.iter().map(|a| a.dir.as_path()).collect();
        assert_eq!(album_dirs, vec![Path::new("/r/trip")]);
        assert_eq!(d.albums[0].placed, vec![PathBuf::from("/r/trip/beach.JPEG")]);

        let sources = source_paths(&d);
        assert!(sources.contains(&Path::new("/r/alice/beach.JPEG")));
        assert!(sources.contains(&Path::new("/r/top.jpg")));
        assert!(!sources.contains(&Path::new("/r/trip/beach.JPEG")));
    }

    #[test]
    fn test_root_can_be_an_album() {
        let tree = Snapshot::from_entries(
            "/r",
            vec![dir("/r"), dir("/r/.faces.d"), file("/r/a.jpg")],
        );
        let d = classify(&tree, &Layout::default());
        assert!(d.sources.is_empty());
        assert_eq!(d.albums[0].dir, PathBuf::from("/r"));
        assert_eq!(d.albums[0].placed, vec![PathBuf::from("/r/a.jpg")]);
    }

    #[test]
    fn test_marker_file_does_not_make_parent_a_source() {
        // A file named like the marker still marks its directory.
        let tree = Snapshot::from_entries(
            "/r",
            vec![dir("/r"), dir("/r/a"), file("/r/a/.faces.d"), file("/r/a/x.jpg")],
        );
        let d = classify(&tree, &Layout::default());
        assert_eq!(d.albums.len(), 1);
        assert!(d.sources.is_empty());
    }

    #[test]
    fn test_dangling_link_only_counts_as_placed() {
        let tree = Snapshot::from_entries(
            "/r",
            vec![
                dir("/r"),
                dir("/r/a"),
                dir("/r/a/.faces.d"),
                Entry {
                    path: PathBuf::from("/r/a/gone.jpg"),
                    kind: EntryKind::BrokenLink,
                },
                Entry {
                    path: PathBuf::from("/r/gone.jpg"),
                    kind: EntryKind::BrokenLink,
                },
            ],
        );
        let d = classify(&tree, &Layout::default());
        assert!(d.sources.is_empty());
        assert_eq!(d.albums[0].placed, vec![PathBuf::from("/r/a/gone.jpg")]);
    }

    #[test]
    fn test_snapshot_skips_hidden_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("alice/.faces.d/x.trainingimage.d")).unwrap();
        std::fs::write(root.join("alice/.faces.d/x.trainingimage.d/v.jpg"), b"v").unwrap();
        std::fs::write(root.join("a.jpg"), b"a").unwrap();

        let snap = snapshot(root).unwrap();
        assert!(snap.entries.iter().any(|e| e.path == root.join("alice/.faces.d")));
        assert!(!snap
            .entries
            .iter()
            .any(|e| e.path.starts_with(root.join("alice/.faces.d/x.trainingimage.d"))));
    }

    #[test]
    fn test_snapshot_missing_root() {
        let tmp = tempfile::tempdir().unwrap();
        let err = snapshot(&tmp.path().join("missing")).unwrap_err();
        assert!(matches!(err, Error::InvalidDirectory { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn test_snapshot_records_dangling_symlink() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::os::unix::fs::symlink(root.join("nowhere.jpg"), root.join("link.jpg")).unwrap();

        let snap = snapshot(root).unwrap();
        let link = snap
            .entries
            .iter()
            .find(|e| e.path == root.join("link.jpg"))
            .unwrap();
        assert_eq!(link.kind, EntryKind::BrokenLink);
    }
}
