//! FileAccumulator - ステージ済みファイルの順序付きリスト
//!
//! 純粋なメモリ上の管理で、失敗しない。
//! 重複排除も種別・サイズの検証もしない（検証は storage 境界の責務）。

use crate::domain::{FileId, StagedFile, StagedFileSummary};

#[derive(Debug, Clone, Default)]
pub struct FileAccumulator {
    files: Vec<StagedFile>,
}

impl FileAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append in the given order, after anything already staged.
    pub fn add(&mut self, files: impl IntoIterator<Item = StagedFile>) -> usize {
        let before = self.files.len();
        self.files.extend(files);
        self.files.len() - before
    }

    pub fn remove(&mut self, id: FileId) -> Option<StagedFile> {
        let pos = self.files.iter().position(|f| f.id() == id)?;
        Some(self.files.remove(pos))
    }

    /// Only call after a batch with zero failures.
    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn snapshot(&self) -> Vec<StagedFile> {
        self.files.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StagedFile> {
        self.files.iter()
    }

    pub fn summaries(&self) -> Vec<StagedFileSummary> {
        self.files.iter().map(StagedFile::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(StagedFile::size_bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn staged(name: &str) -> StagedFile {
        StagedFile::from_bytes(FileId::from_ulid(Ulid::new()), name, vec![0u8; 8])
    }

    fn names(acc: &FileAccumulator) -> Vec<String> {
        acc.iter().map(|f| f.name().to_string()).collect()
    }

    #[test]
    fn add_appends_in_order() {
        let mut acc = FileAccumulator::new();
        assert_eq!(acc.add([staged("a.csv"), staged("b.csv")]), 2);
        assert_eq!(acc.add([staged("c.csv")]), 1);

        assert_eq!(names(&acc), ["a.csv", "b.csv", "c.csv"]);
        assert_eq!(acc.total_bytes(), 24);
    }

    #[test]
    fn add_does_not_deduplicate() {
        let mut acc = FileAccumulator::new();
        acc.add([staged("a.csv")]);
        acc.add([staged("a.csv")]);
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn remove_keeps_relative_order() {
        let mut acc = FileAccumulator::new();
        let b = staged("b.csv");
        let b_id = b.id();
        acc.add([staged("a.csv"), b, staged("c.csv")]);

        let removed = acc.remove(b_id).unwrap();
        assert_eq!(removed.name(), "b.csv");
        assert_eq!(names(&acc), ["a.csv", "c.csv"]);
        assert!(acc.remove(b_id).is_none());
    }

    #[test]
    fn snapshot_is_independent_of_later_changes() {
        let mut acc = FileAccumulator::new();
        acc.add([staged("a.csv")]);
        let snap = acc.snapshot();
        acc.clear();

        assert!(acc.is_empty());
        assert_eq!(snap.len(), 1);
    }
}
