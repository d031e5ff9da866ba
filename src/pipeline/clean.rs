//! Deterministic cleanup of model replies.
//!
//! Models sometimes echo the structural tags used in the request
//! (`<current_page>`, `<previous_page>` …) or wrap their answer in markdown
//! fences despite being told not to. [`clean_extracted_text`] removes exactly
//! those markers and leaves every other character alone, including
//! non-Latin scripts and whitespace inside table layouts.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_STRUCTURAL_TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(?:document_text|current_page|previous_page|previous_text)>").unwrap()
});

/// Opening fence plus its info string, up to and including the newline.
static RE_FENCE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[^\n]*\n").unwrap());

static RE_JSON_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:json)?\s*").unwrap());

fn clean_once(input: &str) -> String {
    let s = RE_STRUCTURAL_TAGS.replace_all(input, "");
    let s = RE_FENCE_LINE.replace_all(&s, "");
    s.replace("```", "").trim().to_string()
}

/// Strip echoed structural tags and code fences, then trim.
///
/// Applied until nothing changes, so `clean(clean(x)) == clean(x)` even when
/// a removal splices two halves of a marker together.
pub fn clean_extracted_text(input: &str) -> String {
    let mut current = clean_once(input);
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Remove ```` ```json ```` / ```` ``` ```` fences around a JSON reply.
pub fn strip_json_fences(input: &str) -> String {
    RE_JSON_FENCE.replace_all(input, "").trim().to_string()
}
