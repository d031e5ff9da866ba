//! Persisted output for one document.
//!
//! ```text
//! <dir>/
//!   metrics.json      aggregate report, no page content
//!   pages/1.md        one file per processed page
//!   pages/2.md
//!   <stem>.md         every page's content + "\n", joined with "\n"
//! ```
//!
//! Each file is written to a `.tmp` sibling and renamed into place, so a
//! crash never leaves a half-written file under its final name.

use crate::error::TriageError;
use crate::output::DocumentReport;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Paths written by [`write_outputs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutputs {
    pub metrics: PathBuf,
    pub pages_dir: PathBuf,
    pub combined: PathBuf,
}

/// The combined text: each page's content followed by a newline, joined with a newline.
pub fn combined_text(report: &DocumentReport) -> String {
    report
        .pages
        .iter()
        .map(|p| format!("{}\n", p.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Stem of the source file name, used for the combined file.
pub fn document_stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), TriageError> {
    let write_err = |e| TriageError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} ({} bytes)", path.display(), contents.len());
    Ok(())
}

/// Write metrics, per-page files and the combined text under `dir`.
pub async fn write_outputs(report: &DocumentReport, dir: &Path) -> Result<WrittenOutputs, TriageError> {
    let pages_dir = dir.join("pages");
    tokio::fs::create_dir_all(&pages_dir)
        .await
        .map_err(|e| TriageError::OutputWriteFailed {
            path: pages_dir.clone(),
            source: e,
        })?;

    let metrics = dir.join("metrics.json");
    let json = serde_json::to_vec_pretty(&report.metrics())
        .map_err(|e| TriageError::Internal(format!("metrics serialisation: {e}")))?;
    write_atomic(&metrics, &json).await?;

    for page in &report.pages {
        let path = pages_dir.join(format!("{}.md", page.page_number));
        write_atomic(&path, page.content.as_bytes()).await?;
    }

    let combined = dir.join(format!("{}.md", document_stem(&report.file_name)));
    write_atomic(&combined, combined_text(report).as_bytes()).await?;

    Ok(WrittenOutputs {
        metrics,
        pages_dir,
        combined,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{ClassificationOutcome, DocumentReportBuilder, PageResult, UsageMetrics};
    use crate::strategy::Strategy;

    fn report() -> DocumentReport {
        let mut b = DocumentReportBuilder::new("annual report.pdf");
        for (n, text) in [(1, "First page"), (2, "Second page")] {
            b.push(PageResult {
                page_number: n,
                strategy: Strategy::Deterministic,
                content: text.to_string(),
                usage: UsageMetrics::ZERO,
                classifier_usage: UsageMetrics::ZERO,
                extractor_usage: UsageMetrics::ZERO,
                classification: ClassificationOutcome::Verdict(false),
                elapsed_seconds: 0.01,
                cost_usd: 0.0,
                error: None,
            });
        }
        b.finish()
    }

    #[test]
    fn combined_text_layout() {
        assert_eq!(combined_text(&report()), "First page\n\nSecond page\n");
    }

    #[test]
    fn stem_strips_extension() {
        assert_eq!(document_stem("dir/annual report.pdf"), "annual report");
        assert_eq!(document_stem(""), "document");
    }

    #[tokio::test]
    async fn writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = write_outputs(&report(), dir.path()).await.unwrap();

        assert_eq!(out.combined, dir.path().join("annual report.md"));
        assert_eq!(
            std::fs::read_to_string(out.pages_dir.join("2.md")).unwrap(),
            "Second page"
        );
        let metrics: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&out.metrics).unwrap()).unwrap();
        assert_eq!(metrics["file"], "annual report.pdf");
        assert_eq!(metrics["total_pages"], 2);
        assert_eq!(metrics["pages"][0]["parser"], "deterministic");
        assert!(!dir.path().join("metrics.json.tmp").exists());
    }
}
