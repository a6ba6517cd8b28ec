use std::path::Path;
use std::process::Command;

use unicode_normalization::UnicodeNormalization;

use crate::core::error::{PipelineError, Result};
use crate::core::model::PAGE_BREAK;

/// Natively-extracted text of one page, via `pdftotext`. NFC-normalized so
/// downstream line matching sees composed characters regardless of how the
/// PDF encodes them.
pub fn native_page_text(pdf: &Path, page: u32) -> Result<String> {
    let output = Command::new("pdftotext")
        .arg("-f")
        .arg(page.to_string())
        .arg("-l")
        .arg(page.to_string())
        .arg(pdf)
        .arg("-")
        .output()
        .map_err(|e| PipelineError::Extraction {
            message: format!("failed to invoke pdftotext (is poppler-utils installed?): {e}"),
        })?;

    if !output.status.success() {
        return Err(PipelineError::Extraction {
            message: format!(
                "pdftotext exited with {} on page {page}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let text = String::from_utf8_lossy(&output.stdout);
    // pdftotext terminates each page with a form feed; the page break is
    // reinstated at the document level.
    Ok(text.trim_end_matches(PAGE_BREAK).nfc().collect())
}

/// Trimmed text lengths of the first `sample` pages, for the scan verdict.
pub fn sample_text_lengths(pdf: &Path, page_count: usize, sample: usize) -> Result<Vec<usize>> {
    let pages = page_count.min(sample);
    let mut lengths = Vec::with_capacity(pages);
    for page in 1..=pages as u32 {
        let text = native_page_text(pdf, page)?;
        lengths.push(text.trim().chars().count());
    }
    Ok(lengths)
}
