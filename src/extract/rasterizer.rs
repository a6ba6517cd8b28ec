use std::path::{Path, PathBuf};
use std::process::Command;

use image::RgbImage;
use tempfile::TempDir;
use tracing::debug;

use crate::core::error::{PipelineError, Result};

/// All page rasters of one document, 1-indexed, held in memory for the
/// duration of the run. The backing temporary directory is released when the
/// arena is dropped, on every path.
#[derive(Debug)]
pub struct PageArena {
    _dir: Option<TempDir>,
    pages: Vec<RgbImage>,
}

impl PageArena {
    /// Build an arena directly from in-memory images (synthetic documents,
    /// tests, callers that already rasterized).
    pub fn from_images(pages: Vec<RgbImage>) -> Self {
        Self { _dir: None, pages }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Page raster by 1-indexed page number.
    pub fn get(&self, page: u32) -> Option<&RgbImage> {
        if page == 0 {
            return None;
        }
        self.pages.get(page as usize - 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &RgbImage)> {
        self.pages
            .iter()
            .enumerate()
            .map(|(idx, img)| (idx as u32 + 1, img))
    }
}

/// Rasterizes a PDF into one image per page via `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PageRasterizer {
    dpi: u32,
}

impl PageRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }

    /// Rasterize every page of `pdf` at once into a fresh per-run temporary
    /// directory and load the results. Produces exactly one image per page,
    /// in page order.
    pub fn rasterize(&self, pdf: &Path) -> Result<PageArena> {
        let page_count = page_count(pdf)?;
        if page_count == 0 {
            return Ok(PageArena {
                _dir: None,
                pages: Vec::new(),
            });
        }

        let dir = tempfile::Builder::new()
            .prefix("papermine-pages-")
            .tempdir()?;
        let prefix = dir.path().join("page");
        let prefix_str = prefix.to_str().ok_or_else(|| PipelineError::DocumentRead {
            path: pdf.to_path_buf(),
            message: "non-UTF8 temporary path".into(),
        })?;

        let output = Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(pdf)
            .arg(prefix_str)
            .output()
            .map_err(|e| PipelineError::DocumentRead {
                path: pdf.to_path_buf(),
                message: format!("failed to invoke pdftoppm (is poppler-utils installed?): {e}"),
            })?;

        if !output.status.success() {
            return Err(PipelineError::DocumentRead {
                path: pdf.to_path_buf(),
                message: format!(
                    "pdftoppm exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let mut pages = Vec::with_capacity(page_count);
        for number in 1..=page_count {
            let path = rendered_page_path(dir.path(), number, page_count);
            let img = image::open(&path).map_err(|e| PipelineError::DocumentRead {
                path: pdf.to_path_buf(),
                message: format!("missing or unreadable page raster {}: {e}", path.display()),
            })?;
            pages.push(img.to_rgb8());
        }

        debug!(pages = pages.len(), dpi = self.dpi, "rasterized document");

        Ok(PageArena {
            _dir: Some(dir),
            pages,
        })
    }
}

// pdftoppm zero-pads page numbers to the width of the last page.
fn rendered_page_path(dir: &Path, number: usize, page_count: usize) -> PathBuf {
    let width = page_count.to_string().len();
    let padded = dir.join(format!("page-{number:0width$}.png"));
    if padded.exists() {
        padded
    } else {
        dir.join(format!("page-{number}.png"))
    }
}

/// Page count via `pdfinfo`. Fails with a document-read error when the file
/// is missing, unreadable, or not a PDF.
pub fn page_count(pdf: &Path) -> Result<usize> {
    let output = Command::new("pdfinfo")
        .arg(pdf)
        .output()
        .map_err(|e| PipelineError::DocumentRead {
            path: pdf.to_path_buf(),
            message: format!("failed to invoke pdfinfo (is poppler-utils installed?): {e}"),
        })?;

    if !output.status.success() {
        return Err(PipelineError::DocumentRead {
            path: pdf.to_path_buf(),
            message: format!(
                "pdfinfo exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix("Pages:") {
            let trimmed = rest.trim();
            return trimmed.parse().map_err(|_| PipelineError::DocumentRead {
                path: pdf.to_path_buf(),
                message: format!("unparseable page count {trimmed:?}"),
            });
        }
    }

    Err(PipelineError::DocumentRead {
        path: pdf.to_path_buf(),
        message: "pdfinfo output had no 'Pages:' line".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn arena_pages_are_one_indexed() {
        let arena = PageArena::from_images(vec![
            RgbImage::new(10, 10),
            RgbImage::new(20, 10),
        ]);
        assert_eq!(arena.len(), 2);
        assert!(arena.get(0).is_none());
        assert_eq!(arena.get(1).unwrap().width(), 10);
        assert_eq!(arena.get(2).unwrap().width(), 20);
        assert!(arena.get(3).is_none());
    }

    #[test]
    fn arena_iterates_in_page_order() {
        let arena = PageArena::from_images(vec![RgbImage::new(1, 1), RgbImage::new(2, 1)]);
        let numbers: Vec<u32> = arena.iter().map(|(n, _)| n).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn padded_page_name_falls_back_to_unpadded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("page-3.png"), b"x").unwrap();
        let path = rendered_page_path(dir.path(), 3, 12);
        assert_eq!(path, dir.path().join("page-3.png"));

        std::fs::write(dir.path().join("page-03.png"), b"x").unwrap();
        let path = rendered_page_path(dir.path(), 3, 12);
        assert_eq!(path, dir.path().join("page-03.png"));
    }

    #[test]
    fn missing_file_is_a_document_read_error() {
        let err = page_count(Path::new("/nonexistent/paper.pdf")).unwrap_err();
        match err {
            PipelineError::DocumentRead { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/paper.pdf"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
