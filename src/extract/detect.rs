use std::sync::Arc;

use image::RgbImage;
use tracing::debug;

use crate::capability::RegionDetector;
use crate::core::error::Result;
use crate::core::geometry::BBox;

/// Runs the region-detection capability over one page image and keeps only
/// figure regions, clipped to the page and in reading order.
#[derive(Clone)]
pub struct FigureDetector {
    detector: Arc<dyn RegionDetector>,
    label: String,
}

impl FigureDetector {
    pub fn new(detector: Arc<dyn RegionDetector>, label: impl Into<String>) -> Self {
        Self {
            detector,
            label: label.into(),
        }
    }

    /// Figure-labelled boxes on the page. Every returned box satisfies
    /// `0 <= x0 < x1 <= width` and `0 <= y0 < y1 <= height`; boxes entirely
    /// outside the page are dropped. Sorted top-to-bottom, then
    /// left-to-right, so repeated runs over the same page yield the same
    /// order regardless of detector output order.
    pub fn figure_boxes(&self, image: &RgbImage) -> Result<Vec<BBox>> {
        let detections = self.detector.detect(image)?;
        let total = detections.len();

        let mut boxes: Vec<BBox> = detections
            .into_iter()
            .filter(|d| d.label.eq_ignore_ascii_case(&self.label))
            .filter_map(|d| d.bbox.clip(image.width(), image.height()))
            .collect();
        boxes.sort_by_key(|b| (b.y0, b.x0));

        debug!(total, figures = boxes.len(), "filtered detections");
        Ok(boxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::capability::Detection;
    use crate::core::geometry::RawBox;

    struct FixedDetector(Vec<Detection>);

    impl RegionDetector for FixedDetector {
        fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>> {
            Ok(self.0.clone())
        }
    }

    fn detection(label: &str, bbox: RawBox) -> Detection {
        Detection {
            bbox,
            label: label.to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn keeps_only_figure_label() {
        let detector = FigureDetector::new(
            Arc::new(FixedDetector(vec![
                detection("figure", RawBox::new(10, 10, 100, 100)),
                detection("table", RawBox::new(10, 200, 100, 300)),
                detection("text", RawBox::new(10, 400, 100, 500)),
            ])),
            "figure",
        );
        let boxes = detector.figure_boxes(&RgbImage::new(800, 1000)).unwrap();
        assert_eq!(boxes, vec![BBox::new(10, 10, 100, 100)]);
    }

    #[test]
    fn clips_boxes_and_drops_out_of_page_ones() {
        let detector = FigureDetector::new(
            Arc::new(FixedDetector(vec![
                detection("figure", RawBox::new(-30, 500, 900, 1200)),
                detection("figure", RawBox::new(850, 1100, 950, 1300)),
            ])),
            "figure",
        );
        let boxes = detector.figure_boxes(&RgbImage::new(800, 1000)).unwrap();
        assert_eq!(boxes, vec![BBox::new(0, 500, 800, 1000)]);
    }

    #[test]
    fn sorts_boxes_in_reading_order() {
        let detector = FigureDetector::new(
            Arc::new(FixedDetector(vec![
                detection("figure", RawBox::new(400, 600, 500, 700)),
                detection("figure", RawBox::new(50, 50, 150, 150)),
                detection("figure", RawBox::new(300, 50, 400, 150)),
            ])),
            "figure",
        );
        let boxes = detector.figure_boxes(&RgbImage::new(800, 1000)).unwrap();
        assert_eq!(
            boxes,
            vec![
                BBox::new(50, 50, 150, 150),
                BBox::new(300, 50, 400, 150),
                BBox::new(400, 600, 500, 700),
            ]
        );
    }

    #[test]
    fn page_with_no_figures_yields_empty_set() {
        let detector = FigureDetector::new(
            Arc::new(FixedDetector(vec![detection(
                "table",
                RawBox::new(10, 10, 100, 100),
            )])),
            "figure",
        );
        assert!(detector
            .figure_boxes(&RgbImage::new(800, 1000))
            .unwrap()
            .is_empty());
    }
}
