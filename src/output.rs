//! Result types: per-page results, the per-document report and batch outcomes.
//!
//! A [`DocumentReport`] owns its [`PageResult`]s. Its totals are running sums
//! taken as each page is appended through [`DocumentReportBuilder::push`], so
//! they can never drift from the page values they summarise.

use crate::strategy::Strategy;
use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};
use std::path::PathBuf;

/// Token counts consumed by one or more remote calls.
///
/// `total_tokens` is always `prompt_tokens + completion_tokens`; it is derived
/// at construction and ignored on deserialisation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UsageRepr")]
pub struct UsageMetrics {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

#[derive(Deserialize)]
struct UsageRepr {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl From<UsageRepr> for UsageMetrics {
    fn from(r: UsageRepr) -> Self {
        Self::new(r.prompt_tokens, r.completion_tokens)
    }
}

impl UsageMetrics {
    pub const ZERO: Self = Self {
        prompt_tokens: 0,
        completion_tokens: 0,
        total_tokens: 0,
    };

    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    pub fn prompt_tokens(&self) -> u64 {
        self.prompt_tokens
    }

    pub fn completion_tokens(&self) -> u64 {
        self.completion_tokens
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn is_zero(&self) -> bool {
        self.total_tokens == 0
    }
}

impl Add for UsageMetrics {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.prompt_tokens + rhs.prompt_tokens,
            self.completion_tokens + rhs.completion_tokens,
        )
    }
}

impl AddAssign for UsageMetrics {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// What happened at the classifier gate for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "has_table_or_diagram")]
pub enum ClassificationOutcome {
    /// Page features already forced the model; no classifier call was made.
    Skipped,
    /// The classifier answered.
    Verdict(bool),
    /// The classifier failed after retries; the configured fallback decided.
    Degraded(bool),
}

impl ClassificationOutcome {
    /// The verdict handed to the strategy selector.
    pub fn has_table_or_diagram(&self) -> bool {
        match self {
            Self::Skipped => false,
            Self::Verdict(v) | Self::Degraded(v) => *v,
        }
    }
}

/// The outcome of processing one page. Built once by the page pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed page number.
    pub page_number: usize,

    /// Strategy that produced `content`.
    pub strategy: Strategy,

    /// Extracted text, or the sentinel marker when `error` is set.
    pub content: String,

    /// Classifier + extractor usage for this page.
    pub usage: UsageMetrics,

    pub classifier_usage: UsageMetrics,

    pub extractor_usage: UsageMetrics,

    pub classification: ClassificationOutcome,

    /// Wall-clock seconds spent on this page, excluding the inter-page delay.
    pub elapsed_seconds: f64,

    /// USD cost of `usage`, rounded to 6 decimals.
    pub cost_usd: f64,

    /// Set when extraction failed and `content` holds the sentinel.
    pub error: Option<PageError>,
}

impl PageResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate report for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub file_name: String,
    /// Number of pages processed (the selection, not the whole document).
    pub total_pages: usize,
    pub total_tokens: u64,
    pub total_time_seconds: f64,
    pub total_cost_usd: f64,
    /// Page results in ascending page order.
    pub pages: Vec<PageResult>,
}

impl DocumentReport {
    /// Count of pages whose extraction succeeded.
    pub fn succeeded_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.is_success()).count()
    }

    pub fn failed_pages(&self) -> usize {
        self.pages.len() - self.succeeded_pages()
    }

    /// Serialisable metrics view (no page content), as written to `metrics.json`.
    pub fn metrics(&self) -> DocumentMetrics {
        DocumentMetrics {
            file: self.file_name.clone(),
            total_pages: self.total_pages,
            total_tokens: self.total_tokens,
            total_time_sec: round_to(self.total_time_seconds, 2),
            total_cost_usd: self.total_cost_usd,
            pages: self
                .pages
                .iter()
                .map(|p| PageSummary {
                    page: p.page_number,
                    parser: p.strategy,
                    tokens: p.usage.total_tokens(),
                    classifier_tokens: p.classifier_usage.total_tokens(),
                    parser_tokens: p.extractor_usage.total_tokens(),
                    time_sec: round_to(p.elapsed_seconds, 2),
                    cost_usd: p.cost_usd,
                    classification: p.classification,
                    error: p.error.as_ref().map(|e| e.to_string()),
                })
                .collect(),
        }
    }
}

/// Accumulates page results in order, keeping running totals.
#[derive(Debug)]
pub struct DocumentReportBuilder {
    file_name: String,
    pages: Vec<PageResult>,
    total_tokens: u64,
    total_time_seconds: f64,
    total_cost_usd: f64,
}

impl DocumentReportBuilder {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            pages: Vec::new(),
            total_tokens: 0,
            total_time_seconds: 0.0,
            total_cost_usd: 0.0,
        }
    }

    /// Append the next page. Pages must arrive in ascending order.
    pub fn push(&mut self, page: PageResult) {
        debug_assert!(
            self.pages
                .last()
                .is_none_or(|last| last.page_number < page.page_number),
            "pages must be appended in ascending order"
        );
        self.total_tokens += page.usage.total_tokens();
        self.total_time_seconds += page.elapsed_seconds;
        self.total_cost_usd += page.cost_usd;
        self.pages.push(page);
    }

    pub fn finish(self) -> DocumentReport {
        DocumentReport {
            file_name: self.file_name,
            total_pages: self.pages.len(),
            total_tokens: self.total_tokens,
            total_time_seconds: self.total_time_seconds,
            total_cost_usd: round_to(self.total_cost_usd, 6),
            pages: self.pages,
        }
    }
}

/// `metrics.json` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetrics {
    pub file: String,
    pub total_pages: usize,
    pub total_tokens: u64,
    pub total_time_sec: f64,
    pub total_cost_usd: f64,
    pub pages: Vec<PageSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSummary {
    pub page: usize,
    pub parser: Strategy,
    pub tokens: u64,
    pub classifier_tokens: u64,
    pub parser_tokens: u64,
    pub time_sec: f64,
    pub cost_usd: f64,
    pub classification: ClassificationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of processing a directory of PDFs.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub reports: Vec<(PathBuf, DocumentReport)>,
    pub failures: Vec<DocumentFailure>,
}

/// A document that could not be processed at all.
#[derive(Debug, Clone)]
pub struct DocumentFailure {
    pub path: PathBuf,
    pub error: String,
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
