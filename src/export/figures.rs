use std::path::{Path, PathBuf};

use tracing::info;

use crate::core::error::{PipelineError, Result};
use crate::core::model::{Figure, FigureRecord};
use crate::export::write_json_atomic;

pub const METADATA_FILE: &str = "figure_metadata.json";

/// Writes the figure metadata artifact and the cropped figure images.
#[derive(Debug, Clone)]
pub struct FigureMetadataExporter {
    out_dir: PathBuf,
}

impl FigureMetadataExporter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }

    /// Write all records at once, atomically. Callers only invoke this after
    /// every page has been processed, so a partial document never reaches
    /// the artifact.
    pub fn export(&self, records: &[FigureRecord]) -> Result<PathBuf> {
        let path = self.out_dir.join(METADATA_FILE);
        write_json_atomic(&path, &records)?;
        info!(figures = records.len(), path = %path.display(), "wrote figure metadata");
        Ok(path)
    }

    /// Save each figure crop as `image_page_<page>_<index>.png`, returning
    /// the paths index-aligned with the figure list.
    pub fn save_crops(&self, figures: &[Figure]) -> Result<Vec<(u32, PathBuf)>> {
        std::fs::create_dir_all(&self.out_dir)?;
        let mut paths = Vec::with_capacity(figures.len());
        for (idx, figure) in figures.iter().enumerate() {
            let name = format!("image_page_{}_{idx}.png", figure.record.page);
            let path = self.out_dir.join(name);
            figure.crop.save(&path)?;
            paths.push((figure.record.page, path));
        }
        Ok(paths)
    }
}

/// Read a metadata artifact back. Round-trips byte-identical page, bbox and
/// caption values with [`FigureMetadataExporter::export`].
pub fn load_metadata(path: &Path) -> Result<Vec<FigureRecord>> {
    let raw = std::fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|e| {
        PipelineError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use image::RgbImage;

    use crate::core::geometry::BBox;

    fn records() -> Vec<FigureRecord> {
        vec![
            FigureRecord {
                page: 1,
                bbox: BBox::new(10, 20, 300, 400),
                caption: "Figure 1: Architecture overview.".to_string(),
            },
            FigureRecord {
                page: 3,
                bbox: BBox::new(0, 550, 800, 990),
                caption: String::new(),
            },
        ]
    }

    #[test]
    fn metadata_round_trips_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = FigureMetadataExporter::new(dir.path().to_path_buf());
        let path = exporter.export(&records()).unwrap();
        let loaded = load_metadata(&path).unwrap();
        assert_eq!(loaded, records());
    }

    #[test]
    fn crops_are_named_by_page_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = FigureMetadataExporter::new(dir.path().to_path_buf());
        let figures = vec![
            Figure {
                record: records()[0].clone(),
                crop: RgbImage::new(4, 4),
            },
            Figure {
                record: records()[1].clone(),
                crop: RgbImage::new(4, 4),
            },
        ];
        let paths = exporter.save_crops(&figures).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].1.ends_with("image_page_1_0.png"));
        assert!(paths[1].1.ends_with("image_page_3_1.png"));
        assert!(paths[0].1.exists());
    }
}
