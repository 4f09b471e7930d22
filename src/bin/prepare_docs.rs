use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use blob_embed::{
    config, logging,
    service::{BlobContent, EmbedError, EmbedService, SearchEmbedService, run_cancellable},
};
use clap::Parser;
use futures_util::{StreamExt, stream};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "webp"];

#[derive(Parser)]
#[command(
    name = "prepare-docs",
    about = "Embed every PDF, image, and JSON file under a path into the search index"
)]
struct Cli {
    /// File or directory to embed.
    path: PathBuf,
    /// Index to write to (defaults to SEARCH_INDEX_NAME).
    #[arg(long)]
    index: Option<String>,
    /// Base URL recorded as the source of image and JSON files.
    #[arg(long)]
    base_url: Option<String>,
    /// Files embedded concurrently.
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Pdf,
    Image,
    Json,
}

impl FileKind {
    fn detect(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "json" => Some(Self::Json),
            ext if IMAGE_EXTENSIONS.contains(&ext) => Some(Self::Image),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    embedded: usize,
    rejected: usize,
    failed: usize,
    cancelled: usize,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let loaded = config::init_config().context("Failed to load configuration")?;
    logging::init_tracing();

    let mut config = loaded.clone();
    if let Some(index) = cli.index.clone() {
        config.search_index_name = index;
    }
    let service = SearchEmbedService::new(&config).context("Failed to build embed service")?;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; cancelling outstanding work");
            trigger.cancel();
        }
    });

    service
        .ensure_search_index(service.default_index(), Some(&cancel))
        .await
        .with_context(|| format!("Failed to ensure index '{}'", service.default_index()))?;

    let files = collect_files(&cli.path)?;
    tracing::info!(
        path = %cli.path.display(),
        files = files.len(),
        index = service.default_index(),
        "Embedding files"
    );

    let root = if cli.path.is_dir() {
        cli.path.clone()
    } else {
        cli.path.parent().map(Path::to_path_buf).unwrap_or_default()
    };
    let base_url = cli.base_url.as_deref();

    let outcomes: Vec<_> = stream::iter(files)
        .map(|(path, kind)| {
            let service = &service;
            let cancel = &cancel;
            let root = root.as_path();
            async move {
                let outcome = embed_file(service, &path, kind, root, base_url, cancel).await;
                (path, outcome)
            }
        })
        .buffer_unordered(cli.concurrency.max(1))
        .collect()
        .await;

    let mut tally = Tally::default();
    for (path, outcome) in outcomes {
        match outcome {
            Ok(true) => tally.embedded += 1,
            Ok(false) => {
                tracing::warn!(path = %path.display(), "File was not embedded");
                tally.rejected += 1;
            }
            Err(error) => match error.downcast_ref::<EmbedError>() {
                Some(EmbedError::Cancelled) => tally.cancelled += 1,
                _ => {
                    tracing::error!(
                        path = %path.display(),
                        error = %format!("{error:#}"),
                        "File failed"
                    );
                    tally.failed += 1;
                }
            },
        }
    }

    println!(
        "embedded: {}, rejected: {}, failed: {}, cancelled: {}",
        tally.embedded, tally.rejected, tally.failed, tally.cancelled
    );
    if tally.failed > 0 {
        bail!("{} file(s) failed to embed", tally.failed);
    }
    if tally.cancelled > 0 {
        bail!("interrupted before {} file(s) were embedded", tally.cancelled);
    }
    Ok(())
}

fn collect_files(path: &Path) -> Result<Vec<(PathBuf, FileKind)>> {
    if !path.exists() {
        bail!("path '{}' does not exist", path.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk '{}'", path.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        match FileKind::detect(entry.path()) {
            Some(kind) => files.push((entry.into_path(), kind)),
            None => tracing::debug!(path = %entry.path().display(), "Skipping unsupported file"),
        }
    }
    Ok(files)
}

/// Path of `path` below `root`, joined with `/`.
fn relative_name(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Source URL recorded for an image or JSON file.
fn source_url(path: &Path, root: &Path, base_url: Option<&str>) -> String {
    match base_url {
        Some(base) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            relative_name(path, root)
        ),
        None => path.display().to_string(),
    }
}

async fn embed_file(
    service: &SearchEmbedService,
    path: &Path,
    kind: FileKind,
    root: &Path,
    base_url: Option<&str>,
    cancel: &CancellationToken,
) -> Result<bool> {
    if cancel.is_cancelled() {
        return Err(EmbedError::Cancelled.into());
    }
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open '{}'", path.display()))?;
    let content = BlobContent::read_from(file)
        .await
        .with_context(|| format!("Failed to read '{}'", path.display()))?;

    let embedded = match kind {
        FileKind::Pdf => {
            let name = relative_name(path, root);
            run_cancellable(Some(cancel), service.embed_pdf_blob(content, &name)).await?
        }
        FileKind::Image => {
            let url = source_url(path, root, base_url);
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            service
                .embed_image_blob(content, &url, &name, Some(cancel))
                .await?
        }
        FileKind::Json => {
            let url = source_url(path, root, base_url);
            service.embed_json_blob(content, &url, Some(cancel)).await?
        }
    };
    tracing::debug!(path = %path.display(), ?kind, embedded, "File processed");
    Ok(embedded)
}
