//! Staged files and the opaque handle to their bytes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ids::FileId;

/// Opaque reference to the bytes of a staged file.
///
/// Cloning a handle never copies file contents: paths are re-opened by the
/// storage adapter and in-memory buffers are shared through `Arc`.
#[derive(Debug, Clone)]
pub enum FileHandle {
    /// A file on the local filesystem.
    Path(PathBuf),

    /// Bytes already held in memory (drag-and-drop style sources, tests).
    Memory(Arc<[u8]>),
}

impl FileHandle {
    pub fn path(&self) -> Option<&Path> {
        match self {
            FileHandle::Path(path) => Some(path),
            FileHandle::Memory(_) => None,
        }
    }
}

/// A file the user has staged but not yet uploaded.
///
/// Owned by the accumulator; a dispatch run works on a snapshot whose
/// handles point at the same bytes.
#[derive(Debug, Clone)]
pub struct StagedFile {
    id: FileId,
    name: String,
    size_bytes: u64,
    handle: FileHandle,
}

impl StagedFile {
    pub fn new(id: FileId, name: impl Into<String>, size_bytes: u64, handle: FileHandle) -> Self {
        Self {
            id,
            name: name.into(),
            size_bytes,
            handle,
        }
    }

    /// Stage an in-memory buffer; the size is taken from the buffer.
    pub fn from_bytes(id: FileId, name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        let size_bytes = bytes.len() as u64;
        Self::new(id, name, size_bytes, FileHandle::Memory(bytes))
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn handle(&self) -> &FileHandle {
        &self.handle
    }

    /// Lower-cased extension including the leading dot (".csv"), if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
    }

    pub fn summary(&self) -> StagedFileSummary {
        StagedFileSummary {
            id: self.id,
            name: self.name.clone(),
            size_bytes: self.size_bytes,
        }
    }
}

/// Serializable view of a staged file (no handle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFileSummary {
    pub id: FileId,
    pub name: String,
    pub size_bytes: u64,
}

impl StagedFileSummary {
    /// Size in KiB with one decimal, the way the staging list displays it.
    pub fn display_size(&self) -> String {
        format!("{:.1} KB", self.size_bytes as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn from_bytes_takes_size_from_buffer() {
        let id = FileId::from_ulid(Ulid::new());
        let file = StagedFile::from_bytes(id, "a.csv", vec![0u8; 10 * 1024]);
        assert_eq!(file.size_bytes(), 10 * 1024);
        assert!(file.handle().path().is_none());
    }

    #[test]
    fn clone_shares_memory_handle() {
        let id = FileId::from_ulid(Ulid::new());
        let file = StagedFile::from_bytes(id, "a.csv", vec![1u8, 2, 3]);
        let copy = file.clone();
        match (file.handle(), copy.handle()) {
            (FileHandle::Memory(a), FileHandle::Memory(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => panic!("expected memory handles"),
        }
    }

    #[test]
    fn extension_is_lowercased_with_dot() {
        let id = FileId::from_ulid(Ulid::new());
        let file = StagedFile::new(id, "Report.CSV", 0, FileHandle::Path("Report.CSV".into()));
        assert_eq!(file.extension().as_deref(), Some(".csv"));

        let bare = StagedFile::new(id, "README", 0, FileHandle::Path("README".into()));
        assert_eq!(bare.extension(), None);
    }

    #[test]
    fn summary_displays_kilobytes() {
        let id = FileId::from_ulid(Ulid::new());
        let file = StagedFile::from_bytes(id, "b.csv", vec![0u8; 20 * 1024]);
        assert_eq!(file.summary().display_size(), "20.0 KB");
    }
}
