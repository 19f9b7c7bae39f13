//! LocalDirStorage - ローカルディレクトリを object storage として使う adapter
//!
//! `<root>/<file_id>/<name>` にコピーし、`file://` URL を返す。
//! 64 KiB ごとに進捗を報告する。
//! 途中で失敗した upload は `.<name>.part` を消して、何も残さない。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::domain::{FileHandle, StagedFile, StoredObject, UploadError};
use crate::ports::{AcceptPolicy, ExtensionAllowlist, ProgressSink, StorageClient};

const CHUNK_SIZE: usize = 64 * 1024;

pub struct LocalDirStorage {
    root: PathBuf,
    policy: ExtensionAllowlist,
}

impl LocalDirStorage {
    pub fn new(root: impl Into<PathBuf>, policy: ExtensionAllowlist) -> Self {
        Self {
            root: root.into(),
            policy,
        }
    }

    fn destination(&self, file: &StagedFile) -> PathBuf {
        // 名前にディレクトリ成分が含まれていても root の外には書かない
        let name = Path::new(file.name())
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "upload.bin".into());
        self.root.join(file.id().to_string()).join(name)
    }
}

/// `<dir>/.<name>.part`
fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.part"))
}

async fn write_object(
    partial: &Path,
    file: &StagedFile,
    source: Option<tokio::fs::File>,
    progress: &dyn ProgressSink,
) -> Result<u64, UploadError> {
    let mut out = tokio::fs::File::create(partial).await?;
    let total = file.size_bytes();
    let mut written: u64 = 0;
    progress.report(0.0);

    match (source, file.handle()) {
        (Some(mut src), _) => {
            let mut buf = vec![0u8; CHUNK_SIZE];
            loop {
                let n = src.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                out.write_all(&buf[..n]).await?;
                written += n as u64;
                progress.report(percent(written, total).min(100.0));
            }
        }
        (None, FileHandle::Memory(bytes)) => {
            for chunk in bytes.chunks(CHUNK_SIZE) {
                out.write_all(chunk).await?;
                written += chunk.len() as u64;
                progress.report(percent(written, total).min(100.0));
            }
        }
        (None, FileHandle::Path(_)) => {}
    }
    out.flush().await?;
    Ok(written)
}

/// Best effort: drop the partial object and its per-file directory if empty.
async fn discard(partial: &Path) {
    if let Err(err) = tokio::fs::remove_file(partial).await {
        tracing::warn!(path = %partial.display(), error = %err, "failed to remove partial upload");
    }
    if let Some(dir) = partial.parent() {
        let _ = tokio::fs::remove_dir(dir).await;
    }
}

fn percent(written: u64, total: u64) -> f32 {
    if total == 0 {
        100.0
    } else {
        (written as f64 / total as f64 * 100.0) as f32
    }
}

#[async_trait]
impl StorageClient for LocalDirStorage {
    async fn upload(
        &self,
        file: &StagedFile,
        progress: &dyn ProgressSink,
    ) -> Result<StoredObject, UploadError> {
        if !self.policy.accepts(file) {
            return Err(UploadError::Rejected(format!(
                "{} is not an accepted file type (accepted: {})",
                file.name(),
                self.policy.extensions().join(", ")
            )));
        }

        // 元ファイルを先に開き、読めない場合は出力先を作らない
        let source = match file.handle().path() {
            Some(path) => Some(tokio::fs::File::open(path).await?),
            None => None,
        };

        let dest = self.destination(file);
        let partial = partial_path(&dest);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // 書き込みは一時ファイルに行い、成功したときだけ rename で公開する
        let written = match write_object(&partial, file, source, progress).await {
            Ok(written) => written,
            Err(err) => {
                discard(&partial).await;
                return Err(err);
            }
        };
        if let Err(err) = tokio::fs::rename(&partial, &dest).await {
            discard(&partial).await;
            return Err(err.into());
        }

        let absolute = tokio::fs::canonicalize(&dest).await?;
        tracing::debug!(path = %absolute.display(), bytes = written, "stored file");
        Ok(StoredObject::new(format!("file://{}", absolute.display())))
    }

    async fn probe(&self) -> Result<(), UploadError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let meta = tokio::fs::metadata(&self.root).await?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(UploadError::Io(format!(
                "{} is not a directory",
                self.root.display()
            )))
        }
    }
}
