//! System prompts for the two kinds of model call.
//!
//! Every prompt lives here so behaviour changes touch exactly one file and
//! tests can inspect prompts without a live model. The extraction prompt can
//! be overridden through [`crate::config::ExtractionConfig::extraction_prompt`].

/// Asks the model whether a page image holds a table or complex diagram.
///
/// The reply is expected to be `{"has_table_or_diagram": <bool>}`.
pub const CLASSIFIER_SYSTEM_PROMPT: &str = r#"You are a binary page classifier.
Decide whether the page image contains a table or a complex diagram (charts, graphs, flowcharts or similar visual structures).

Answer with a JSON object in exactly this form:
{"has_table_or_diagram": true}
or
{"has_table_or_diagram": false}

Return only the JSON object. No other text, no explanation."#;

/// Strict verbatim-extraction prompt for one page image.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract text from images of document pages.

Extract the COMPLETE and EXACT text of the CURRENT page image as plain text.

You receive:
- the image of the current page
- optionally, a <previous_page> block holding text from the page before, given ONLY so you can follow sentences and table rows that cross the page break

STRICT RULES:
1) Extract text ONLY from the current page image.
2) NEVER copy, repeat, paraphrase or continue the text of <previous_page>.
3) Use <previous_page> only to understand continuation across the page break.
4) Keep the ORIGINAL LANGUAGE of the page exactly as written. Do not translate. Do not normalise.
5) Extract ALL visible text: headings, body text, captions, footnotes, lists, labels, annotations, and tables (as readable text, one row per line, columns kept apart).
6) For charts, graphs and diagrams extract ONLY their text (titles, labels, legends, data labels). Never describe the visuals.
7) Follow natural reading order: top to bottom, left to right.
8) Output ONLY the extracted text. No tags, no wrappers, no XML, no markdown code blocks.
9) Do not summarise, shorten or interpret.
10) Do not add explanations, comments or metadata.
11) Pure text only."#;

/// Fixed instruction sent with every extraction image.
pub const EXTRACTION_USER_PROMPT: &str = "Extract the text from the current page image.";

/// Build the user text for an extraction call.
///
/// When `previous` is non-empty, its first `max_chars` characters (not bytes)
/// are appended inside a `<previous_page>` block.
pub fn extraction_user_text(previous: &str, max_chars: usize) -> String {
    if previous.is_empty() || max_chars == 0 {
        return EXTRACTION_USER_PROMPT.to_string();
    }
    let bounded = match previous.char_indices().nth(max_chars) {
        Some((idx, _)) => &previous[..idx],
        None => previous,
    };
    format!("{EXTRACTION_USER_PROMPT}\n<previous_page>\n{bounded}\n</previous_page>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_prompt_names_the_json_key() {
        assert!(CLASSIFIER_SYSTEM_PROMPT.contains("\"has_table_or_diagram\""));
    }

    #[test]
    fn no_previous_page_means_no_context_block() {
        let text = extraction_user_text("", 500);
        assert_eq!(text, EXTRACTION_USER_PROMPT);
        assert!(!text.contains("<previous_page>"));
    }

    #[test]
    fn previous_page_is_bounded_by_chars() {
        let previous = "я".repeat(600);
        let text = extraction_user_text(&previous, 500);
        let inner = text
            .split("<previous_page>\n")
            .nth(1)
            .and_then(|s| s.strip_suffix("\n</previous_page>"))
            .unwrap();
        assert_eq!(inner.chars().count(), 500);
    }

    #[test]
    fn short_previous_page_is_sent_whole() {
        let text = extraction_user_text("end of a sentence", 500);
        assert!(text.ends_with("<previous_page>\nend of a sentence\n</previous_page>"));
    }
}
