use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::core::geometry::BBox;

/// Page delimiter used when concatenating per-page text, matching the form
/// feed poppler emits between pages.
pub const PAGE_BREAK: char = '\u{0C}';

/// Whether a document carries extractable digital text or is image-only.
///
/// Decided once per document from the text yield of the first few pages and
/// never re-evaluated mid-run; the verdict selects the extraction path for
/// both full-document text and caption lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanVerdict {
    Digital,
    Scanned,
}

impl ScanVerdict {
    pub fn is_scanned(&self) -> bool {
        matches!(self, ScanVerdict::Scanned)
    }
}

/// One page of a processed document. The raster image itself lives in the
/// page arena for the duration of the run; the page keeps its dimensions and
/// extracted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// 1-indexed page number.
    pub number: u32,
    pub width: u32,
    pub height: u32,
    pub text: Option<String>,
}

/// A processed document: identifier, verdict, and its pages in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub verdict: ScanVerdict,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Full document text: per-page text joined in page order with a page
    /// break between pages.
    pub fn full_text(&self) -> String {
        let mut out = String::new();
        for (idx, page) in self.pages.iter().enumerate() {
            if idx > 0 {
                out.push(PAGE_BREAK);
            }
            if let Some(text) = &page.text {
                out.push_str(text);
            }
        }
        out
    }
}

/// Serializable part of a detected figure, written to the metadata artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureRecord {
    /// 1-indexed page the figure was detected on.
    pub page: u32,
    pub bbox: BBox,
    /// Associated caption; empty when none was found.
    pub caption: String,
}

/// A detected figure: its metadata record plus the cropped page region.
#[derive(Debug, Clone)]
pub struct Figure {
    pub record: FigureRecord,
    pub crop: RgbImage,
}

/// Result of one figure-extraction pass over a document.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub document: Document,
    /// Detected figures in page order, then reading order within a page.
    pub figures: Vec<Figure>,
    /// Page-level problems that were skipped over (failed detection calls,
    /// caption OCR failures).
    pub warnings: Vec<String>,
}

impl Extraction {
    pub fn full_text(&self) -> String {
        self.document.full_text()
    }

    pub fn records(&self) -> Vec<FigureRecord> {
        self.figures.iter().map(|f| f.record.clone()).collect()
    }

    /// Cropped figure images as `(page_number, image)` pairs, index-aligned
    /// with [`Extraction::records`].
    pub fn images(&self) -> impl Iterator<Item = (u32, &RgbImage)> {
        self.figures.iter().map(|f| (f.record.page, &f.crop))
    }
}

/// Per-question answers gathered from the two independent analysis passes.
/// `final_answer` is filled exactly once, by reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionAnswerPair {
    pub question: String,
    pub text_response: String,
    pub image_response: String,
    pub final_answer: Option<String>,
}

impl QuestionAnswerPair {
    pub fn new(question: impl Into<String>, text_response: String, image_response: String) -> Self {
        Self {
            question: question.into(),
            text_response,
            image_response,
            final_answer: None,
        }
    }
}
