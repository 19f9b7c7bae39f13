//! InMemoryStorage - 開発・テスト用の object storage
//!
//! # 学習ポイント
//! - tokio::sync::Mutex で object map を保護（ロックを跨いで await しない）
//! - 擬似レイテンシ（tokio::time::sleep）で in-flight 数を観測できる
//! - ファイル名ごとに失敗を仕込める（バッチの部分失敗の再現）

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{FileHandle, StagedFile, StoredObject, UploadError};
use crate::ports::{AcceptPolicy, ExtensionAllowlist, ProgressSink, StorageClient};

/// In-memory object store keyed by URL.
pub struct InMemoryStorage {
    bucket: String,
    policy: ExtensionAllowlist,
    latency: Duration,
    failures: HashMap<String, UploadError>,
    probe_error: Option<UploadError>,
    objects: Mutex<HashMap<String, Arc<[u8]>>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryStorage {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            policy: ExtensionAllowlist::allow_all(),
            latency: Duration::ZERO,
            failures: HashMap::new(),
            probe_error: None,
            objects: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_policy(mut self, policy: ExtensionAllowlist) -> Self {
        self.policy = policy;
        self
    }

    /// Every upload takes `latency` before resolving.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Uploads of a file called `name` resolve with `error`.
    pub fn with_failure(mut self, name: impl Into<String>, error: UploadError) -> Self {
        self.failures.insert(name.into(), error);
        self
    }

    pub fn with_probe_error(mut self, error: UploadError) -> Self {
        self.probe_error = Some(error);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of uploads observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub async fn object(&self, url: &str) -> Option<Arc<[u8]>> {
        self.objects.lock().await.get(url).cloned()
    }

    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }

    fn url_for(&self, file: &StagedFile) -> String {
        format!("mem://{}/{}/{}", self.bucket, file.id(), file.name())
    }
}

/// Decrements the in-flight counter on every exit path.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageClient for InMemoryStorage {
    async fn upload(
        &self,
        file: &StagedFile,
        progress: &dyn ProgressSink,
    ) -> Result<StoredObject, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);

        progress.report(0.0);
        tokio::time::sleep(self.latency / 2).await;
        progress.report(50.0);
        tokio::time::sleep(self.latency - self.latency / 2).await;

        if !self.policy.accepts(file) {
            return Err(UploadError::Rejected(format!(
                "{} is not an accepted file type",
                file.name()
            )));
        }
        if let Some(err) = self.failures.get(file.name()) {
            return Err(err.clone());
        }

        let bytes: Arc<[u8]> = match file.handle() {
            FileHandle::Memory(bytes) => Arc::clone(bytes),
            FileHandle::Path(path) => tokio::fs::read(path).await?.into(),
        };

        let url = self.url_for(file);
        self.objects.lock().await.insert(url.clone(), bytes);
        progress.report(100.0);
        Ok(StoredObject::new(url))
    }

    async fn probe(&self) -> Result<(), UploadError> {
        match &self.probe_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}
