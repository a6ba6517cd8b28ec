use serde::{Deserialize, Serialize};

/// Axis-aligned box in page-image pixel space.
///
/// Invariant: `x0 < x1` and `y0 < y1`, with all corners inside the page the
/// box was clipped against. Serialized as the four-element array
/// `[x0, y0, x1, y1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct BBox {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl BBox {
    pub fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }
}

impl From<[u32; 4]> for BBox {
    fn from(v: [u32; 4]) -> Self {
        // Normalize corner order so a deserialized box upholds the invariant.
        Self {
            x0: v[0].min(v[2]),
            y0: v[1].min(v[3]),
            x1: v[0].max(v[2]),
            y1: v[1].max(v[3]),
        }
    }
}

impl From<BBox> for [u32; 4] {
    fn from(b: BBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

/// Unclipped box as reported by the detection model. Coordinates may be
/// negative or extend past the page edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBox {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl RawBox {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Clip to a `width` x `height` page. Returns `None` when nothing of the
    /// box survives clipping (fully outside, or degenerate).
    pub fn clip(&self, width: u32, height: u32) -> Option<BBox> {
        let x0 = self.x0.clamp(0, width as i32) as u32;
        let y0 = self.y0.clamp(0, height as i32) as u32;
        let x1 = self.x1.clamp(0, width as i32) as u32;
        let y1 = self.y1.clamp(0, height as i32) as u32;

        if x0 < x1 && y0 < y1 {
            Some(BBox::new(x0, y0, x1, y1))
        } else {
            None
        }
    }
}
