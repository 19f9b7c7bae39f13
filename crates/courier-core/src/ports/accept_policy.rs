//! AcceptPolicy port - 受け付けるファイル種別
//!
//! ポリシーは storage 境界が持つ。orchestrator は検証しない。
//! 同梱の storage adapter はこのポリシーでサーバ側拒否（UploadError::Rejected）を再現する。

use serde::{Deserialize, Serialize};

use crate::domain::StagedFile;

pub trait AcceptPolicy: Send + Sync {
    fn accepts(&self, file: &StagedFile) -> bool;
}

/// Extension allowlist (".csv" style, case-insensitive). Empty accepts all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionAllowlist {
    extensions: Vec<String>,
}

impl ExtensionAllowlist {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|ext| normalize(ext.as_ref()))
            .filter(|ext| ext.len() > 1)
            .collect();
        Self { extensions }
    }

    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

fn normalize(ext: &str) -> String {
    let ext = ext.trim().to_ascii_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

impl AcceptPolicy for ExtensionAllowlist {
    fn accepts(&self, file: &StagedFile) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        file.extension()
            .is_some_and(|ext| self.extensions.iter().any(|allowed| *allowed == ext))
    }
}
