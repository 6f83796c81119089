use std::fmt;

/// Fixed-length face embedding produced by a backend.
pub type Embedding = Vec<f32>;

/// Face location in pixels, `(top, right, bottom, left)` like the stats file stores it.
///
/// `right` and `bottom` are exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl BoundingBox {
    pub fn new(top: u32, right: u32, bottom: u32, left: u32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Maps a box found on a frame downscaled by `scale` back to original pixels,
    /// clamped to a `width` x `height` frame.
    pub fn rescaled(&self, scale: f64, width: u32, height: u32) -> Self {
        if scale <= 0.0 || scale >= 1.0 {
            return self.clamped(width, height);
        }
        let up = |c: u32| (c as f64 / scale).round() as u32;
        Self {
            top: up(self.top),
            right: up(self.right),
            bottom: up(self.bottom),
            left: up(self.left),
        }
        .clamped(width, height)
    }

    fn clamped(&self, width: u32, height: u32) -> Self {
        Self {
            top: self.top.min(height),
            right: self.right.min(width),
            bottom: self.bottom.min(height),
            left: self.left.min(width),
        }
    }

    pub fn as_array(&self) -> [u32; 4] {
        [self.top, self.right, self.bottom, self.left]
    }
}

impl From<[u32; 4]> for BoundingBox {
    fn from(v: [u32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.top, self.right, self.bottom, self.left
        )
    }
}

/// One detected face: where it is and what it looks like.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
}
