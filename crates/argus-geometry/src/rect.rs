use crate::Error;

/// An oriented rectangle: center, extent, and rotation (radians, counter-clockwise).
///
/// Used for both detector-derived and tracker-maintained regions of interest. Coordinates may
/// be either pixel-absolute or image-normalized (`[0, 1]`) depending on context; callers are
/// responsible for keeping that consistent, the same way the rest of this crate's functions
/// take an explicit image size when they need to convert between the two.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    x_center: f32,
    y_center: f32,
    width: f32,
    height: f32,
    rotation: f32,
}

impl Rect {
    pub fn new(x_center: f32, y_center: f32, width: f32, height: f32, rotation: f32) -> Result<Self, Error> {
        if !(width > 0.0) || !(height > 0.0) {
            return Err(Error::NonPositiveRect { width, height });
        }
        Ok(Self { x_center, y_center, width, height, rotation: crate::transform::normalize_radians(rotation) })
    }

    /// An axis-aligned rectangle (`rotation == 0`) spanning `[x_min, x_max] x [y_min, y_max]`.
    pub fn from_bounds(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Result<Self, Error> {
        Self::new((x_min + x_max) / 2.0, (y_min + y_max) / 2.0, x_max - x_min, y_max - y_min, 0.0)
    }

    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    pub fn y_center(&self) -> f32 {
        self.y_center
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Scales width and height about the rectangle's own center, leaving position and rotation
    /// unchanged.
    pub fn scale(&self, factor: f32) -> Result<Self, Error> {
        Self::new(self.x_center, self.y_center, self.width * factor, self.height * factor, self.rotation)
    }

    /// The smallest axis-aligned box containing this (possibly rotated) rectangle.
    pub fn to_bounding_box(&self) -> BoundingBox {
        if self.rotation == 0.0 {
            return BoundingBox {
                x_min: self.x_center - self.width / 2.0,
                y_min: self.y_center - self.height / 2.0,
                x_max: self.x_center + self.width / 2.0,
                y_max: self.y_center + self.height / 2.0,
            };
        }

        let (sin, cos) = self.rotation.sin_cos();
        let hw = self.width / 2.0;
        let hh = self.height / 2.0;
        let corners = [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)];

        let mut x_min = f32::INFINITY;
        let mut y_min = f32::INFINITY;
        let mut x_max = f32::NEG_INFINITY;
        let mut y_max = f32::NEG_INFINITY;
        for (dx, dy) in corners {
            let x = self.x_center + dx * cos - dy * sin;
            let y = self.y_center + dx * sin + dy * cos;
            x_min = x_min.min(x);
            y_min = y_min.min(y);
            x_max = x_max.max(x);
            y_max = y_max.max(y);
        }

        BoundingBox { x_min, y_min, x_max, y_max }
    }
}

/// An axis-aligned bounding box, `x_min <= x_max`, `y_min <= y_max`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            x_min: x_center - width / 2.0,
            y_min: y_center - height / 2.0,
            x_max: x_center + width / 2.0,
            y_max: y_center + height / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x_max - self.x_min).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y_max - self.y_min).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn x_center(&self) -> f32 {
        (self.x_min + self.x_max) / 2.0
    }

    pub fn y_center(&self) -> f32 {
        (self.y_min + self.y_max) / 2.0
    }

    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let x_min = self.x_min.max(other.x_min);
        let y_min = self.y_min.max(other.y_min);
        let x_max = self.x_max.min(other.x_max);
        let y_max = self.y_max.min(other.y_max);
        if x_min < x_max && y_min < y_max {
            Some(BoundingBox { x_min, y_min, x_max, y_max })
        } else {
            None
        }
    }

    /// Intersection-over-union similarity, in `[0, 1]`.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let intersection = self.intersection(other).map_or(0.0, |b| b.area());
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Intersection-over-minimum-area similarity, used by NMS in `Remove` mode to also catch a
    /// small box fully contained in a much larger one (where IoU alone would stay low).
    pub fn iom(&self, other: &BoundingBox) -> f32 {
        let intersection = self.intersection(other).map_or(0.0, |b| b.area());
        let min_area = self.area().min(other.area());
        if min_area <= 0.0 {
            0.0
        } else {
            intersection / min_area
        }
    }

    /// Grows each edge outward by a fraction of this box's own width/height.
    pub fn grow_rel(&self, left: f32, top: f32, right: f32, bottom: f32) -> BoundingBox {
        let w = self.width();
        let h = self.height();
        BoundingBox {
            x_min: self.x_min - left * w,
            y_min: self.y_min - top * h,
            x_max: self.x_max + right * w,
            y_max: self.y_max + bottom * h,
        }
    }
}

/// Fractional padding added to each edge of a letterboxed ROI, relative to the padded
/// rectangle's own width/height. Used to map output-tensor-normalized coordinates back to the
/// original (unpadded) ROI.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Padding {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Padding {
    pub const ZERO: Padding = Padding { left: 0.0, top: 0.0, right: 0.0, bottom: 0.0 };

    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Result<Self, Error> {
        let valid = |a: f32, b: f32| a >= 0.0 && b >= 0.0 && a + b < 1.0;
        if !valid(left, right) || !valid(top, bottom) {
            return Err(Error::InvalidPadding);
        }
        Ok(Self { left, top, right, bottom })
    }
}
