//! One-pass figure extraction over a PDF document: rasterize once, classify
//! once, extract text, then detect/crop/caption figures page by page on a
//! bounded worker pool.

pub mod caption;
pub mod detect;
pub mod rasterizer;
pub mod scan;
pub mod text;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image::{imageops, RgbImage};
use tokio::sync::Semaphore;
use tokio::task;
use tracing::{info, warn};

use crate::capability::{RegionDetector, TextRecognizer};
use crate::core::cancel::CancelFlag;
use crate::core::error::{PipelineError, Result};
use crate::core::model::{Document, Extraction, Figure, FigureRecord, Page, ScanVerdict};

pub use detect::FigureDetector;
pub use rasterizer::{PageArena, PageRasterizer};

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Rendering resolution for page rasters.
    pub dpi: u32,
    /// Upper bound on concurrently processed pages; detection and OCR calls
    /// respect downstream rate limits through this.
    pub max_concurrent_pages: usize,
    /// Deadline applied to each external capability call.
    pub call_timeout: Duration,
    /// Detection label treated as a figure.
    pub figure_label: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_concurrent_pages: 4,
            call_timeout: Duration::from_secs(120),
            figure_label: "figure".to_string(),
        }
    }
}

/// Composes the rasterizer, scan classifier, text extractor, figure detector
/// and caption lookup into one extraction pass per document.
pub struct FigureExtractor {
    config: ExtractorConfig,
    detector: FigureDetector,
    recognizer: Arc<dyn TextRecognizer>,
}

struct PageYield {
    figures: Vec<Figure>,
    warnings: Vec<String>,
}

impl FigureExtractor {
    pub fn new(
        config: ExtractorConfig,
        detector: Arc<dyn RegionDetector>,
        recognizer: Arc<dyn TextRecognizer>,
    ) -> Self {
        let figure_detector = FigureDetector::new(detector, config.figure_label.clone());
        Self {
            config,
            detector: figure_detector,
            recognizer,
        }
    }

    /// Process one PDF end to end. Pages are rasterized exactly once and the
    /// cached rasters are reused for cropping and scanned-caption lookup.
    /// Page-level detection failures skip that page's figures and are
    /// recorded as warnings; read and text-extraction failures abort the
    /// document.
    pub async fn extract(&self, pdf: &Path, cancel: &CancelFlag) -> Result<Extraction> {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let doc_id = pdf
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| pdf.display().to_string());

        let rasterizer = PageRasterizer::new(self.config.dpi);
        let pdf_owned = pdf.to_path_buf();
        let arena = run_blocking("rasterize", self.config.call_timeout, move || {
            rasterizer.rasterize(&pdf_owned)
        })
        .await?;
        let arena = Arc::new(arena);
        let page_count = arena.len();
        info!(doc = %doc_id, pages = page_count, "rasterized document");

        // Native text of the leading pages decides the verdict; for digital
        // documents it doubles as the start of the full text.
        let mut page_texts = Vec::with_capacity(page_count);
        for page in 1..=page_count.min(scan::SAMPLE_PAGES) as u32 {
            let pdf_owned = pdf.to_path_buf();
            let page_text = run_blocking("text-extract", self.config.call_timeout, move || {
                text::native_page_text(&pdf_owned, page)
            })
            .await?;
            page_texts.push(page_text);
        }
        let lengths: Vec<usize> = page_texts
            .iter()
            .map(|t| t.trim().chars().count())
            .collect();
        let verdict = scan::classify(&lengths);
        info!(doc = %doc_id, ?verdict, "classified document");

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        match verdict {
            ScanVerdict::Digital => {
                for page in (page_texts.len() + 1)..=page_count {
                    let pdf_owned = pdf.to_path_buf();
                    let page = page as u32;
                    let page_text =
                        run_blocking("text-extract", self.config.call_timeout, move || {
                            text::native_page_text(&pdf_owned, page)
                        })
                        .await?;
                    page_texts.push(page_text);
                }
            }
            ScanVerdict::Scanned => {
                page_texts = self.ocr_page_texts(&arena, cancel).await?;
            }
        }

        self.extract_from_arena(doc_id, arena, page_texts, verdict, cancel)
            .await
    }

    /// Scanned-path text extraction: recognize every page raster on the
    /// worker pool and return the page texts in page order. Any page failing
    /// OCR is fatal for the document.
    pub async fn ocr_page_texts(
        &self,
        arena: &Arc<PageArena>,
        cancel: &CancelFlag,
    ) -> Result<Vec<String>> {
        let recognizer = Arc::clone(&self.recognizer);
        let results = self
            .run_page_tasks(arena, cancel, "ocr", move |_page, image| {
                recognizer.recognize(&image)
            })
            .await?;

        let mut page_texts = Vec::with_capacity(results.len());
        for (idx, res) in results.into_iter().enumerate() {
            match res {
                Ok(page_text) => page_texts.push(page_text),
                Err(e) => {
                    return Err(PipelineError::Extraction {
                        message: format!("page {}: {e}", idx + 1),
                    })
                }
            }
        }
        Ok(page_texts)
    }

    /// Detection half of the pass, over an already-rasterized document.
    /// Exposed for callers that build the arena themselves.
    pub async fn extract_from_arena(
        &self,
        doc_id: impl Into<String>,
        arena: Arc<PageArena>,
        page_texts: Vec<String>,
        verdict: ScanVerdict,
        cancel: &CancelFlag,
    ) -> Result<Extraction> {
        let doc_id = doc_id.into();
        let texts = Arc::new(page_texts);

        let detector = self.detector.clone();
        let recognizer = Arc::clone(&self.recognizer);
        let task_texts = Arc::clone(&texts);
        let results = self
            .run_page_tasks(&arena, cancel, "detect", move |page, image| {
                let boxes = detector.figure_boxes(&image)?;
                let mut figures = Vec::with_capacity(boxes.len());
                let mut warnings = Vec::new();
                let page_text = task_texts
                    .get(page as usize - 1)
                    .map(String::as_str)
                    .unwrap_or_default();

                for bbox in boxes {
                    let crop =
                        imageops::crop_imm(&image, bbox.x0, bbox.y0, bbox.width(), bbox.height())
                            .to_image();
                    let caption = if verdict.is_scanned() {
                        match caption::scanned_caption(
                            recognizer.as_ref(),
                            &image,
                            bbox.y1,
                            image.height(),
                        ) {
                            Ok(found) => found,
                            // Caption loss is not figure loss.
                            Err(e) => {
                                warnings
                                    .push(format!("page {page}: caption recognition failed: {e}"));
                                String::new()
                            }
                        }
                    } else {
                        caption::digital_caption(page_text, bbox.y1, image.height())
                    };
                    figures.push(Figure {
                        record: FigureRecord {
                            page,
                            bbox,
                            caption,
                        },
                        crop,
                    });
                }

                Ok(PageYield { figures, warnings })
            })
            .await?;

        let mut figures = Vec::new();
        let mut warnings = Vec::new();
        for (idx, res) in results.into_iter().enumerate() {
            let page = idx as u32 + 1;
            match res {
                Ok(mut yielded) => {
                    figures.append(&mut yielded.figures);
                    warnings.append(&mut yielded.warnings);
                }
                Err(e) => {
                    warn!(page, error = %e, "skipping page figures after detection failure");
                    warnings.push(format!("page {page}: {e} (figures skipped)"));
                }
            }
        }

        let pages: Vec<Page> = arena
            .iter()
            .map(|(number, img)| Page {
                number,
                width: img.width(),
                height: img.height(),
                text: texts.get(number as usize - 1).cloned(),
            })
            .collect();

        info!(doc = %doc_id, figures = figures.len(), warnings = warnings.len(), "extraction complete");

        Ok(Extraction {
            document: Document {
                id: doc_id,
                verdict,
                pages,
            },
            figures,
            warnings,
        })
    }

    /// Run `f` once per page on the blocking pool, at most
    /// `max_concurrent_pages` at a time, each call under the configured
    /// deadline. Results come back indexed by page, so completion order
    /// never disturbs page order. Cancellation stops new pages from being
    /// issued; pages already in flight finish or time out.
    async fn run_page_tasks<T, F>(
        &self,
        arena: &Arc<PageArena>,
        cancel: &CancelFlag,
        stage: &'static str,
        f: F,
    ) -> Result<Vec<Result<T>>>
    where
        T: Send + 'static,
        F: Fn(u32, RgbImage) -> Result<T> + Clone + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_pages.max(1)));
        let timeout = self.config.call_timeout;
        let mut handles = Vec::with_capacity(arena.len());

        for (page, image) in arena.iter() {
            if cancel.is_cancelled() {
                warn!(stage, from_page = page, "cancelled; not issuing remaining pages");
                break;
            }
            let image = image.clone();
            let semaphore = Arc::clone(&semaphore);
            let f = f.clone();
            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Err(PipelineError::Cancelled),
                };
                match tokio::time::timeout(timeout, task::spawn_blocking(move || f(page, image)))
                    .await
                {
                    Err(_) => Err(PipelineError::Timeout {
                        stage,
                        seconds: timeout.as_secs(),
                    }),
                    Ok(Err(join)) => Err(PipelineError::Extraction {
                        message: format!("{stage} worker failed: {join}"),
                    }),
                    Ok(Ok(result)) => result,
                }
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(res) => results.push(res),
                Err(join) => results.push(Err(PipelineError::Extraction {
                    message: format!("{stage} task failed: {join}"),
                })),
            }
        }

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        Ok(results)
    }
}

async fn run_blocking<T, F>(stage: &'static str, timeout: Duration, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    match tokio::time::timeout(timeout, task::spawn_blocking(f)).await {
        Err(_) => Err(PipelineError::Timeout {
            stage,
            seconds: timeout.as_secs(),
        }),
        Ok(Err(join)) => Err(PipelineError::Extraction {
            message: format!("{stage} failed: {join}"),
        }),
        Ok(Ok(result)) => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::capability::Detection;
    use crate::core::geometry::{BBox, RawBox};

    struct OnePerPageDetector;

    impl RegionDetector for OnePerPageDetector {
        fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
            // One figure in the upper half, plus a non-figure region that
            // must be filtered out.
            let h = image.height() as i32;
            Ok(vec![
                Detection {
                    bbox: RawBox::new(10, 10, image.width() as i32 - 10, h / 2),
                    label: "figure".to_string(),
                    confidence: 0.9,
                },
                Detection {
                    bbox: RawBox::new(10, h / 2, 60, h - 10),
                    label: "table".to_string(),
                    confidence: 0.8,
                },
            ])
        }
    }

    struct NoFigures;

    impl RegionDetector for NoFigures {
        fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>> {
            Ok(Vec::new())
        }
    }

    struct EchoRecognizer;

    impl TextRecognizer for EchoRecognizer {
        fn recognize(&self, _image: &RgbImage) -> Result<String> {
            Ok("Figure 9: scanned caption".to_string())
        }
    }

    fn extractor(detector: Arc<dyn RegionDetector>) -> FigureExtractor {
        FigureExtractor::new(
            ExtractorConfig {
                max_concurrent_pages: 2,
                ..ExtractorConfig::default()
            },
            detector,
            Arc::new(EchoRecognizer),
        )
    }

    fn three_page_arena() -> Arc<PageArena> {
        Arc::new(PageArena::from_images(vec![
            RgbImage::new(400, 600),
            RgbImage::new(400, 600),
            RgbImage::new(400, 600),
        ]))
    }

    #[tokio::test]
    async fn figures_come_back_in_page_order() {
        let extractor = extractor(Arc::new(OnePerPageDetector));
        let texts = vec![String::new(); 3];
        let extraction = extractor
            .extract_from_arena(
                "doc",
                three_page_arena(),
                texts,
                ScanVerdict::Digital,
                &CancelFlag::new(),
            )
            .await
            .unwrap();

        let pages: Vec<u32> = extraction.figures.iter().map(|f| f.record.page).collect();
        assert_eq!(pages, vec![1, 2, 3]);
        for figure in &extraction.figures {
            assert_eq!(figure.record.bbox, BBox::new(10, 10, 390, 300));
            assert_eq!(figure.crop.width(), 380);
            assert_eq!(figure.crop.height(), 290);
        }
        assert!(extraction.warnings.is_empty());
    }

    #[tokio::test]
    async fn pages_without_figures_contribute_nothing() {
        let extractor = extractor(Arc::new(NoFigures));
        let extraction = extractor
            .extract_from_arena(
                "doc",
                three_page_arena(),
                vec![String::new(); 3],
                ScanVerdict::Digital,
                &CancelFlag::new(),
            )
            .await
            .unwrap();
        assert!(extraction.figures.is_empty());
        assert_eq!(extraction.document.page_count(), 3);
        assert!(extraction.warnings.is_empty());
    }

    #[tokio::test]
    async fn detection_failure_skips_page_and_continues() {
        struct FailingDetector;
        impl RegionDetector for FailingDetector {
            fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>> {
                Err(PipelineError::Detection {
                    message: "bridge crashed".into(),
                })
            }
        }

        let extractor = extractor(Arc::new(FailingDetector));
        let extraction = extractor
            .extract_from_arena(
                "doc",
                three_page_arena(),
                vec![String::new(); 3],
                ScanVerdict::Digital,
                &CancelFlag::new(),
            )
            .await
            .unwrap();
        assert!(extraction.figures.is_empty());
        assert_eq!(extraction.warnings.len(), 3);
        assert!(extraction.warnings[0].contains("page 1"));
    }

    #[tokio::test]
    async fn scanned_documents_caption_from_the_page_raster() {
        let extractor = extractor(Arc::new(OnePerPageDetector));
        let extraction = extractor
            .extract_from_arena(
                "doc",
                three_page_arena(),
                vec!["ocr text".to_string(); 3],
                ScanVerdict::Scanned,
                &CancelFlag::new(),
            )
            .await
            .unwrap();
        for figure in &extraction.figures {
            assert_eq!(figure.record.caption, "Figure 9: scanned caption");
        }
    }

    #[tokio::test]
    async fn cancelled_run_returns_cancelled() {
        let extractor = extractor(Arc::new(OnePerPageDetector));
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = extractor
            .extract_from_arena(
                "doc",
                three_page_arena(),
                vec![String::new(); 3],
                ScanVerdict::Digital,
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }
}
