//! Top-level entry points: one PDF, a PDF on disk to an output directory,
//! a directory of PDFs, or PDF bytes held in memory.

use crate::config::ExtractionConfig;
use crate::error::TriageError;
use crate::output::{BatchOutcome, DocumentFailure, DocumentReport};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::render::{PageSource, PdfiumDocument};
use crate::session::DocumentSession;
use crate::transport::{build_transport, VisionTransport};
use crate::writer::{write_outputs, WrittenOutputs};
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Extract the selected pages of one PDF.
///
/// # Errors
/// Only document-level failures: missing file, not a PDF, corrupt or
/// encrypted PDF, no configured transport, a page selection outside the
/// document. Per-page failures are recorded inside the report.
pub async fn extract_document(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<DocumentReport, TriageError> {
    let path = path.as_ref();
    input::validate_pdf(path)?;
    let transport = build_transport(config)?;
    run_document(path, config, transport).await
}

/// Extract one PDF and write its outputs into `output_dir`.
///
/// The input is validated before `output_dir` is created.
pub async fn extract_to_dir(
    path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<(DocumentReport, WrittenOutputs), TriageError> {
    let path = path.as_ref();
    input::validate_pdf(path)?;
    let transport = build_transport(config)?;
    let report = run_document(path, config, transport).await?;
    let written = write_outputs(&report, output_dir.as_ref()).await?;
    Ok((report, written))
}

/// Process `files` into per-document subdirectories of `output_root`.
///
/// Up to `config.concurrency` documents run at once. A document that fails
/// is recorded in [`BatchOutcome::failures`] and the rest carry on.
pub async fn extract_batch(
    root: &Path,
    files: &[PathBuf],
    output_root: &Path,
    config: &ExtractionConfig,
) -> Result<BatchOutcome, TriageError> {
    let transport = build_transport(config)?;
    info!(
        "Batch: {} documents, concurrency {}",
        files.len(),
        config.concurrency
    );

    let results: Vec<Result<(PathBuf, DocumentReport), DocumentFailure>> =
        stream::iter(files.iter().map(|file| {
            let transport = Arc::clone(&transport);
            let out_dir = output_root.join(batch_subdir(root, file));
            async move {
                let outcome = async {
                    input::validate_pdf(file)?;
                    let report = run_document(file, config, transport).await?;
                    write_outputs(&report, &out_dir).await?;
                    Ok::<_, TriageError>(report)
                }
                .await;
                match outcome {
                    Ok(report) => Ok((file.clone(), report)),
                    Err(e) => {
                        error!("{}: {}", file.display(), e);
                        Err(DocumentFailure {
                            path: file.clone(),
                            error: e.to_string(),
                        })
                    }
                }
            }
        }))
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    let mut outcome = BatchOutcome::default();
    for r in results {
        match r {
            Ok(done) => outcome.reports.push(done),
            Err(failed) => outcome.failures.push(failed),
        }
    }
    outcome.reports.sort_by(|a, b| a.0.cmp(&b.0));
    outcome.failures.sort_by(|a, b| a.path.cmp(&b.path));

    info!(
        "Batch complete: {} succeeded, {} failed",
        outcome.reports.len(),
        outcome.failures.len()
    );
    Ok(outcome)
}

/// Extract a file into `output_dir`, or every PDF under a directory into
/// `output_dir/<relative path without extension>/`.
pub async fn extract_path(
    path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<BatchOutcome, TriageError> {
    let output_dir = output_dir.as_ref();
    match input::resolve_input(path.as_ref())? {
        ResolvedInput::File(file) => {
            let (report, _) = extract_to_dir(&file, output_dir, config).await?;
            Ok(BatchOutcome {
                reports: vec![(file, report)],
                failures: Vec::new(),
            })
        }
        ResolvedInput::Directory { root, files } => {
            extract_batch(&root, &files, output_dir, config).await
        }
    }
}

/// Synchronous wrapper around [`extract_document`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<DocumentReport, TriageError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TriageError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_document(path, config))
}

/// Extract PDF bytes held in memory.
///
/// The bytes go to a managed temp file that is removed on return. The
/// report's `file_name` is `document.pdf`.
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<DocumentReport, TriageError> {
    let mut tmp = tempfile::Builder::new()
        .prefix("pdftriage-")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| TriageError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| TriageError::Internal(format!("tempfile write: {e}")))?;

    let mut report = extract_document(tmp.path(), config).await?;
    report.file_name = "document.pdf".to_string();
    Ok(report)
}

/// Run a session over any page source. Useful with custom backends.
pub async fn extract_pages(
    file_name: &str,
    source: &dyn PageSource,
    config: &ExtractionConfig,
    transport: Arc<dyn VisionTransport>,
) -> Result<DocumentReport, TriageError> {
    let total = source.page_count();
    let pages = config.pages.resolve(total)?;
    if pages.is_empty() && total > 0 {
        return Err(TriageError::PageOutOfRange { page: 0, total });
    }
    Ok(DocumentSession::new(config, transport)
        .run(file_name, source, &pages)
        .await)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_document(
    path: &Path,
    config: &ExtractionConfig,
    transport: Arc<dyn VisionTransport>,
) -> Result<DocumentReport, TriageError> {
    let document = PdfiumDocument::open(path, config).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    extract_pages(&file_name, &document, config, transport).await
}

/// Output subdirectory for `file` relative to the batch `root`.
fn batch_subdir(root: &Path, file: &Path) -> PathBuf {
    file.strip_prefix(root)
        .unwrap_or(file)
        .with_extension("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_subdir_keeps_nesting() {
        let root = Path::new("/in");
        assert_eq!(batch_subdir(root, Path::new("/in/a.pdf")), PathBuf::from("a"));
        assert_eq!(
            batch_subdir(root, Path::new("/in/2024/q1.PDF")),
            PathBuf::from("2024/q1")
        );
    }

    #[tokio::test]
    async fn missing_file_is_rejected_before_anything_else() {
        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("never-created");
        let err = extract_to_dir("/no/such/file.pdf", &target, &ExtractionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TriageError::FileNotFound { .. }));
        assert!(!target.exists());
    }

    #[test]
    fn sync_wrapper_reports_not_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("x.pdf");
        std::fs::write(&p, b"hello").unwrap();
        let err = extract_sync(&p, &ExtractionConfig::default()).unwrap_err();
        assert!(matches!(err, TriageError::NotAPdf { .. }));
    }
}
