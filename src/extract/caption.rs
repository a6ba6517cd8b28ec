use image::{imageops, RgbImage};
use tracing::debug;

use crate::capability::TextRecognizer;
use crate::core::error::Result;

/// Line prefixes that identify a caption, compared against the trimmed,
/// lowercased line.
const CAPTION_PREFIXES: [&str; 2] = ["figure", "fig."];

/// Caption lookup in extracted page text for digitally-authored documents.
///
/// The starting line is estimated proportionally from the box's lower edge:
/// `floor(y_start / page_height * line_count)`. This is a best-effort
/// heuristic, not an exact mapping; text extraction order does not guarantee
/// visual line correspondence (multi-column layouts especially). From the
/// estimated line the scan moves forward to the first caption-prefixed line
/// and returns it verbatim, in its original casing. Absence is the empty
/// string, not an error.
pub fn digital_caption(page_text: &str, y_start: u32, page_height: u32) -> String {
    if page_height == 0 || page_text.is_empty() {
        return String::new();
    }

    let lines: Vec<&str> = page_text.lines().collect();
    if lines.is_empty() {
        return String::new();
    }

    let estimated =
        (f64::from(y_start) / f64::from(page_height) * lines.len() as f64).floor() as usize;
    let start_line = estimated.min(lines.len());

    for line in &lines[start_line..] {
        let trimmed = line.trim();
        let lowered = trimmed.to_lowercase();
        if CAPTION_PREFIXES
            .iter()
            .any(|prefix| lowered.starts_with(prefix))
        {
            return trimmed.to_string();
        }
    }

    String::new()
}

/// Caption lookup for scanned documents: crop the cached page raster to the
/// full-width band from `y_start` to `y_end`, recognize it, and collapse all
/// whitespace runs to single spaces.
pub fn scanned_caption(
    recognizer: &dyn TextRecognizer,
    page: &RgbImage,
    y_start: u32,
    y_end: u32,
) -> Result<String> {
    let y_end = y_end.min(page.height());
    if y_start >= y_end || page.width() == 0 {
        return Ok(String::new());
    }

    let band = imageops::crop_imm(page, 0, y_start, page.width(), y_end - y_start).to_image();
    debug!(y_start, y_end, "recognizing caption band");
    let text = recognizer.recognize(&band)?;
    Ok(collapse_whitespace(&text))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
