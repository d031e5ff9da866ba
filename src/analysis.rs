//! Page feature analysis: the cheap signals that decide whether a page is
//! worth a model call.

use serde::{Deserialize, Serialize};

/// Pages with fewer trimmed characters than this are "near-empty".
pub const MIN_TEXT_LENGTH: usize = 100;

/// Feature summary for one page. Derived once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageFeatures {
    /// Characters (Unicode scalar values) in the whitespace-trimmed page text.
    pub text_length: usize,
    pub has_images: bool,
    /// Characters per square point of page area; 0 when the area is unknown.
    pub text_density: f64,
    pub is_image_based: bool,
    pub has_almost_no_text: bool,
}

/// Summarise a page from its backend text, embedded image count and area.
///
/// Empty or whitespace-only text yields `text_length == 0`.
pub fn analyze(
    page_text: &str,
    image_count: usize,
    page_area: f64,
    min_text_length: usize,
) -> PageFeatures {
    let text_length = page_text.trim().chars().count();
    let has_images = image_count > 0;
    let text_density = if page_area > 0.0 {
        text_length as f64 / page_area
    } else {
        0.0
    };
    let has_almost_no_text = text_length < min_text_length;

    PageFeatures {
        text_length,
        has_images,
        text_density,
        is_image_based: has_almost_no_text && has_images,
        has_almost_no_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_page_with_image_is_image_based() {
        let f = analyze("   \n", 1, 612.0 * 792.0, MIN_TEXT_LENGTH);
        assert_eq!(f.text_length, 0);
        assert!(f.has_almost_no_text);
        assert!(f.is_image_based);
        assert_eq!(f.text_density, 0.0);
    }

    #[test]
    fn dense_text_page() {
        let text = "x".repeat(800);
        let f = analyze(&text, 0, 100.0 * 100.0, MIN_TEXT_LENGTH);
        assert_eq!(f.text_length, 800);
        assert!((f.text_density - 0.08).abs() < 1e-12);
        assert!(!f.has_almost_no_text);
        assert!(!f.is_image_based);
    }

    #[test]
    fn short_text_without_images_is_not_image_based() {
        let f = analyze("Title only", 0, 1000.0, MIN_TEXT_LENGTH);
        assert!(f.has_almost_no_text);
        assert!(!f.is_image_based);
    }

    #[test]
    fn zero_area_gives_zero_density() {
        let f = analyze(&"a".repeat(200), 2, 0.0, MIN_TEXT_LENGTH);
        assert_eq!(f.text_density, 0.0);
        assert!(f.has_images);
        assert!(!f.is_image_based);
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let f = analyze("Привет", 0, 1.0, MIN_TEXT_LENGTH);
        assert_eq!(f.text_length, 6);
    }
}
