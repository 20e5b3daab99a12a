//! Filesystem boundary for uploaded batch XML files.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Resolves and reads batch files.
pub trait FileSource: Send {
    /// Joins the upload root with a stored relative filename.
    fn resolve(&self, filename: &str) -> PathBuf;
    /// Returns true when `path` names an existing regular file.
    fn exists(&self, path: &Path) -> bool;
    /// Reads the whole file.
    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// [`FileSource`] rooted at the configured upload directory.
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    /// Creates a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Upload root.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileSource for UploadDir {
    fn resolve(&self, filename: &str) -> PathBuf {
        // Leading separators would make `join` discard the root.
        self.root.join(filename.trim_start_matches(['/', '\\']))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}
