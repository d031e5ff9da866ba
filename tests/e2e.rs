//! End-to-end tests for edgequake-pdftriage.
//!
//! These read real PDFs from `./test_cases/` through pdfium and make live
//! model calls. They are gated behind `E2E_ENABLED` so CI skips them unless
//! asked.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture

use edgequake_pdftriage::{
    extract_document, extract_from_bytes, extract_path, extract_to_dir, ExtractionConfig,
    PageSelection, PageSource, PdfiumDocument, Strategy, TriageError,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip unless E2E_ENABLED is set and the PDF at `path` exists.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

fn quick_config(pages: PageSelection) -> ExtractionConfig {
    ExtractionConfig::builder()
        .pages(pages)
        .max_attempts(2)
        .api_timeout_secs(120)
        .build()
        .expect("valid config")
}

fn assert_clean(text: &str, context: &str) {
    for tag in ["<previous_page>", "</previous_page>", "<current_page>", "<document_text>"] {
        assert!(!text.contains(tag), "[{context}] output echoes {tag}");
    }
    assert!(!text.contains("```"), "[{context}] output contains a code fence");
}

// ── Tests that need only pdfium ──────────────────────────────────────────────

#[tokio::test]
async fn missing_file_is_file_not_found() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }
    let err = extract_document("/definitely/not/a/real/file.pdf", &ExtractionConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TriageError::FileNotFound { .. }));
}

#[tokio::test]
async fn page_beyond_document_is_rejected() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("irs_form_1040.pdf"));
    let err = extract_document(&path, &quick_config(PageSelection::Single(500)))
        .await
        .unwrap_err();
    assert!(matches!(err, TriageError::PageOutOfRange { page: 500, .. }));
}

#[tokio::test]
async fn one_open_document_serves_many_pages() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));

    let doc = PdfiumDocument::open(&path, &ExtractionConfig::default())
        .await
        .expect("open should succeed");
    assert_eq!(doc.page_count(), 15);
    for n in [1, 2, 15] {
        let page = doc.load_page(n).await.expect("page should render");
        assert_eq!(page.number, n);
        assert!(!page.png.is_empty());
    }
    assert!(matches!(
        doc.load_page(16).await,
        Err(TriageError::PageOutOfRange { page: 16, total: 15 })
    ));
}

// ── Tests that call the model ────────────────────────────────────────────────

#[tokio::test]
async fn text_page_of_a_paper() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));

    let report = extract_document(&path, &quick_config(PageSelection::Single(1)))
        .await
        .expect("extraction should succeed");

    assert_eq!(report.total_pages, 1);
    let page = &report.pages[0];
    assert!(page.is_success(), "page failed: {:?}", page.error);
    assert!(page.content.contains("Attention"));
    assert_clean(&page.content, "arxiv p1");
    assert_eq!(report.total_tokens, page.usage.total_tokens());
    println!(
        "page 1 via {} ({} tokens, ${:.6})",
        page.strategy, page.usage.total_tokens(), page.cost_usd
    );
}

#[tokio::test]
async fn form_pages_write_all_outputs() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("irs_form_1040.pdf"));
    let out = tempfile::tempdir().unwrap();

    let (report, written) = extract_to_dir(&path, out.path(), &quick_config(PageSelection::All))
        .await
        .expect("extraction should succeed");

    assert_eq!(report.total_pages, 2);
    assert!(written.metrics.exists());
    assert!(written.pages_dir.join("1.md").exists());
    assert!(written.pages_dir.join("2.md").exists());
    assert_eq!(written.combined, out.path().join("irs_form_1040.md"));

    let metrics: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&written.metrics).unwrap()).unwrap();
    assert_eq!(metrics["total_pages"], 2);
    assert_eq!(metrics["total_tokens"], report.total_tokens);
}

#[tokio::test]
async fn scanned_page_goes_to_the_model() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("scanned_letter.pdf"));

    let report = extract_document(&path, &quick_config(PageSelection::Single(1)))
        .await
        .expect("extraction should succeed");

    let page = &report.pages[0];
    assert_eq!(page.strategy, Strategy::Model);
    assert!(page.classifier_usage.is_zero());
    assert!(page.usage.total_tokens() > 0);
    assert_clean(&page.content, "scan");
}

#[tokio::test]
async fn bytes_and_path_agree_on_strategy() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("attention_is_all_you_need.pdf"));
    let config = quick_config(PageSelection::Single(2));

    let from_path = extract_document(&path, &config).await.unwrap();
    let bytes = std::fs::read(&path).unwrap();
    let from_bytes = extract_from_bytes(&bytes, &config).await.unwrap();

    assert_eq!(from_bytes.file_name, "document.pdf");
    assert_eq!(from_path.pages[0].strategy, from_bytes.pages[0].strategy);
}

#[tokio::test]
async fn directory_input_writes_one_subdirectory_per_pdf() {
    let dir = e2e_skip_unless_ready!(test_cases_dir());
    let out = tempfile::tempdir().unwrap();

    let outcome = extract_path(&dir, out.path(), &quick_config(PageSelection::Single(1)))
        .await
        .expect("batch should run");

    for (file, _) in &outcome.reports {
        let stem = file.file_stem().unwrap();
        assert!(out.path().join(stem).join("metrics.json").exists());
    }
    for failure in &outcome.failures {
        println!("failed: {} ({})", failure.path.display(), failure.error);
    }
}
