//! Courier CLI - stage files and upload them as one batch.
//!
//! # Usage
//!
//! ```bash
//! # Upload into ./uploads (default storage_dir)
//! courier data/a.csv data/b.csv
//!
//! # Different destination, two uploads at a time, JSON report
//! courier --dest /srv/drop -c 2 --json data/*.csv
//!
//! # Exercise the pipeline without touching disk
//! courier --in-memory data/a.csv
//! ```
//!
//! Ctrl-C while uploading stops new uploads; files already in flight finish.

mod output;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use courier_core::app::{AppBuilder, SessionHandle, SessionView};
use courier_core::domain::{FileHandle, StagedFile};
use courier_core::impls::InMemoryStorage;
use courier_core::ports::IdGenerator;
use courier_core::CourierConfig;

/// Upload local files to storage with bounded concurrency.
#[derive(Parser)]
#[command(name = "courier", version, about)]
struct Cli {
    /// Files to stage and upload, in order
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// JSON config file (defaults are used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Destination directory (overrides config and COURIER_STORAGE_DIR)
    #[arg(long)]
    dest: Option<PathBuf>,

    /// Max uploads in flight (overrides config and COURIER_CONCURRENCY)
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Accepted extensions, comma separated; pass "" to accept everything
    #[arg(long, value_delimiter = ',')]
    extensions: Option<Vec<String>>,

    /// Upload to an in-memory store instead of the destination directory
    #[arg(long)]
    in_memory: bool,

    /// Print the batch report as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging (RUST_LOG wins when set)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn load_config(&self) -> Result<CourierConfig> {
        let config = match &self.config {
            Some(path) => CourierConfig::from_json_file(path)?,
            None => CourierConfig::default(),
        };
        let mut config = config.with_env_overrides()?;

        if let Some(dest) = &self.dest {
            config.storage_dir = dest.clone();
        }
        if let Some(limit) = self.concurrency {
            config.concurrency_limit = limit;
        }
        if let Some(extensions) = &self.extensions {
            config.accepted_extensions = extensions.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.load_config()?;
    tracing::debug!(?config, "config loaded");

    let mut builder = AppBuilder::new(config.clone());
    if cli.in_memory {
        builder = builder.storage(Arc::new(
            InMemoryStorage::new("courier").with_policy(config.accept_policy()),
        ));
    }
    let app = builder.build()?;
    tracing::info!(
        dest = %app.config().storage_dir.display(),
        concurrency = app.dispatcher().concurrency_limit(),
        in_memory = cli.in_memory,
        "courier ready"
    );
    let ids = app.ids();
    let runtime = app.spawn();
    let session = runtime.handle();

    let result = run(&session, ids.as_ref(), &cli.files).await;
    drop(session);
    runtime.shutdown().await;
    let view = result?;

    let Some(report) = &view.last_batch else {
        bail!("no batch was dispatched");
    };
    if cli.json {
        println!("{}", output::format_json(report)?);
    } else {
        println!("{}", output::format_human(report));
    }

    let failed = report
        .outcomes
        .iter()
        .filter(|o| !o.result.is_success())
        .count();
    if failed > 0 {
        bail!("{failed} of {} uploads failed", report.outcomes.len());
    }
    Ok(())
}

async fn run(
    session: &SessionHandle,
    ids: &dyn IdGenerator,
    paths: &[PathBuf],
) -> Result<SessionView> {
    if let Some(message) = initial_storage_error(session).await {
        bail!(message);
    }

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(stage(ids, path).await?);
    }

    session.open_modal().await?;
    session.add_files(files).await?;
    session.submit().await?;

    tokio::select! {
        view = session.wait_until_settled() => Ok(view?),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            tracing::warn!("interrupted; letting in-flight uploads finish");
            // すでに settle していれば NothingToCancel になるだけ
            if let Err(err) = session.cancel_upload().await {
                tracing::debug!(error = %err, "cancel after settle");
            }
            Ok(session.wait_until_settled().await?)
        }
    }
}

/// The startup probe runs before the first command is handled, so an
/// `OpenModal` round trip is enough to observe its result.
async fn initial_storage_error(session: &SessionHandle) -> Option<String> {
    if session.open_modal().await.is_err() {
        return Some("session runtime stopped during startup".to_string());
    }
    session.view().storage_error
}

async fn stage(ids: &dyn IdGenerator, path: &Path) -> Result<StagedFile> {
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("cannot stat {}", path.display()))?;
    if !metadata.is_file() {
        bail!("{} is not a regular file", path.display());
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;

    Ok(StagedFile::new(
        ids.generate_file_id(),
        name,
        metadata.len(),
        FileHandle::Path(path.to_path_buf()),
    ))
}
