//! Affine-transform math tying a region of interest to a model's fixed-size input tensor, and
//! back again for projecting model output into image space.

use crate::{BoundingBox, Error, ImageSize, Padding, Rect};

/// The 8 coefficients of a 2D projective transform, stored row-major with the implicit third
/// row `[c0, c1, 1]`: `[a0, a1, a2, b0, b1, b2, c0, c1]`.
///
/// `c0`/`c1` are nonzero only for a true projective (perspective) transform; the ROI transforms
/// built by this module are always affine, so they're always `0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub coeffs: [f32; 8],
}

impl Matrix {
    /// Applies the transform to a point, performing the perspective divide.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a0, a1, a2, b0, b1, b2, c0, c1] = self.coeffs;
        let w = c0 * x + c1 * y + 1.0;
        ((a0 * x + a1 * y + a2) / w, (b0 * x + b1 * y + b2) / w)
    }

    fn to_nalgebra(self) -> nalgebra::Matrix3<f32> {
        let [a0, a1, a2, b0, b1, b2, c0, c1] = self.coeffs;
        nalgebra::Matrix3::new(a0, a1, a2, b0, b1, b2, c0, c1, 1.0)
    }

    fn from_nalgebra(m: nalgebra::Matrix3<f32>) -> Self {
        Matrix {
            coeffs: [m[(0, 0)], m[(0, 1)], m[(0, 2)], m[(1, 0)], m[(1, 1)], m[(1, 2)], m[(2, 0)], m[(2, 1)]],
        }
    }
}

/// Normalizes an angle in radians to the principal range produced by repeatedly wrapping around
/// a full turn (`2*PI`), matching the conventional `angle - 2*PI*floor((angle+PI)/(2*PI))`
/// formula used throughout this crate wherever a rotation needs to be kept bounded.
pub fn normalize_radians(angle: f32) -> f32 {
    use std::f32::consts::PI;
    angle - 2.0 * PI * ((angle + PI) / (2.0 * PI)).floor()
}

/// Computes the `(scale, offset)` pair mapping `[from_min, from_max]` onto `[to_min, to_max]`
/// via `x' = x * scale + offset`.
pub fn transform_value_range(from_min: f32, from_max: f32, to_min: f32, to_max: f32) -> Result<(f32, f32), Error> {
    if (from_max - from_min).abs() < f32::EPSILON {
        return Err(Error::DegenerateRange { from_min, from_max });
    }
    let scale = (to_max - to_min) / (from_max - from_min);
    let offset = to_min - from_min * scale;
    Ok((scale, offset))
}

/// Enlarges `roi` (in absolute units) so its aspect ratio matches the `target_w x target_h`
/// output tensor, padding the shorter side evenly on both edges. Returns the enlarged ROI and
/// the padding fraction (relative to the enlarged ROI's own size) that must be stripped from
/// keypoints decoded in tensor space before they're projected back onto `roi`.
///
/// When `keep_aspect_ratio` is false, the ROI is returned unchanged with zero padding (the
/// caller is assumed to sample it with independent x/y scale factors instead).
pub fn pad_roi(roi: &Rect, target_w: u32, target_h: u32, keep_aspect_ratio: bool) -> Result<(Rect, Padding), Error> {
    if target_w == 0 || target_h == 0 {
        return Err(Error::ZeroDimension);
    }
    if !keep_aspect_ratio {
        return Ok((*roi, Padding::ZERO));
    }

    let target_aspect = target_h as f32 / target_w as f32;
    let roi_aspect = roi.height() / roi.width();

    let (new_width, new_height, pad_lr, pad_tb) = if target_aspect > roi_aspect {
        let new_height = roi.width() * target_aspect;
        let pad = (1.0 - roi.height() / new_height) / 2.0;
        (roi.width(), new_height, 0.0, pad)
    } else {
        let new_width = roi.height() / target_aspect;
        let pad = (1.0 - roi.width() / new_width) / 2.0;
        (new_width, roi.height(), pad, 0.0)
    };

    let new_roi = Rect::new(roi.x_center(), roi.y_center(), new_width, new_height, roi.rotation())?;
    let padding = Padding::new(pad_lr, pad_tb, pad_lr, pad_tb)?;
    Ok((new_roi, padding))
}

/// Converts a normalized region of interest (coordinates and extent as fractions of
/// `image_size`) into an absolute-pixel [`Rect`]. When `norm_rect` is `None`, returns the
/// unrotated rect covering the whole image, which is the tracker's fallback ROI when no
/// detection or previous track is available.
pub fn get_roi(image_size: ImageSize, norm_rect: Option<&Rect>) -> Result<Rect, Error> {
    let (w, h) = (image_size.0 as f32, image_size.1 as f32);
    match norm_rect {
        None => Rect::new(w / 2.0, h / 2.0, w, h, 0.0),
        Some(r) => Rect::new(r.x_center() * w, r.y_center() * h, r.width() * w, r.height() * h, r.rotation()),
    }
}

/// Builds the affine transform mapping normalized output-tensor coordinates (`[0, 1]` in both
/// axes) to normalized image coordinates, for sampling `roi` (given in absolute pixel units)
/// out of an `image_size`-sized image into a `target_size`-sized tensor.
///
/// `target_size` does not enter the matrix itself (the output grid is already normalized by the
/// time this transform is applied per-pixel) but is validated for consistency with the rest of
/// this module's signatures.
pub fn projective_transform_matrix(
    roi: &Rect,
    image_size: ImageSize,
    flip_horizontally: bool,
    target_size: ImageSize,
) -> Result<Matrix, Error> {
    if image_size.0 == 0 || image_size.1 == 0 || target_size.0 == 0 || target_size.1 == 0 {
        return Err(Error::ZeroDimension);
    }

    let a = roi.width();
    let b = roi.height();
    let flip = if flip_horizontally { -1.0 } else { 1.0 };
    let (d, c) = roi.rotation().sin_cos();
    let e = roi.x_center();
    let f = roi.y_center();
    let g = 1.0 / image_size.0 as f32;
    let h = 1.0 / image_size.1 as f32;

    Ok(Matrix {
        coeffs: [
            a * c * flip * g,
            -b * d * g,
            (-0.5 * a * c * flip + 0.5 * b * d + e) * g,
            a * d * flip * h,
            b * c * h,
            (-0.5 * b * c - 0.5 * a * d * flip + f) * h,
            0.0,
            0.0,
        ],
    })
}

/// Inverts an affine (or projective) transform matrix.
pub fn inverse_matrix(m: &Matrix) -> Result<Matrix, Error> {
    m.to_nalgebra().try_inverse().map(Matrix::from_nalgebra).ok_or(Error::SingularMatrix)
}

/// Configuration for [`transform_normalized_rect`], mirroring the shift/scale/squaring knobs a
/// tracker uses to stabilize a detection-derived ROI across frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct RectTransformConfig {
    pub shift_x: f32,
    pub shift_y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub square_long: bool,
    pub square_short: bool,
    /// Overrides the rect's own rotation before the shift is applied, if set.
    pub rotation: Option<f32>,
}

impl RectTransformConfig {
    pub fn identity() -> Self {
        Self { scale_x: 1.0, scale_y: 1.0, ..Default::default() }
    }
}

/// Shifts, scales, and optionally squares a normalized rectangle, accounting for the image's
/// aspect ratio so that a `shift_x`/`shift_y` fraction always displaces the ROI by the same
/// fraction of its own size regardless of whether the source image is square.
pub fn transform_normalized_rect(roi: &Rect, image_size: ImageSize, cfg: &RectTransformConfig) -> Result<Rect, Error> {
    if image_size.0 == 0 || image_size.1 == 0 {
        return Err(Error::ZeroDimension);
    }
    let (img_w, img_h) = (image_size.0 as f32, image_size.1 as f32);
    let width = roi.width();
    let height = roi.height();
    let rotation = cfg.rotation.map_or(roi.rotation(), normalize_radians);

    let (x_shift, y_shift) = if rotation == 0.0 {
        (width * cfg.shift_x, height * cfg.shift_y)
    } else {
        let (sin, cos) = rotation.sin_cos();
        let x_shift = (img_w * width * cfg.shift_x * cos - img_h * height * cfg.shift_y * sin) / img_w;
        let y_shift = (img_w * width * cfg.shift_x * sin + img_h * height * cfg.shift_y * cos) / img_h;
        (x_shift, y_shift)
    };

    let (mut width, mut height) = (width, height);
    if cfg.square_long {
        let long_side = (width * img_w).max(height * img_h);
        width = long_side / img_w;
        height = long_side / img_h;
    } else if cfg.square_short {
        let short_side = (width * img_w).min(height * img_h);
        width = short_side / img_w;
        height = short_side / img_h;
    }

    Rect::new(roi.x_center() + x_shift, roi.y_center() + y_shift, width * cfg.scale_x, height * cfg.scale_y, rotation)
}

/// Strips letterbox padding from a point in output-tensor-normalized coordinates (`[0, 1]`),
/// re-expressing it relative to the unpadded ROI that [`pad_roi`] enlarged.
pub fn remove_letterbox_padding(x: f32, y: f32, padding: &Padding) -> (f32, f32) {
    let (sx, ox) = transform_value_range(padding.left, 1.0 - padding.right, 0.0, 1.0).unwrap_or((1.0, 0.0));
    let (sy, oy) = transform_value_range(padding.top, 1.0 - padding.bottom, 0.0, 1.0).unwrap_or((1.0, 0.0));
    (x * sx + ox, y * sy + oy)
}

/// The axis-aligned box that exactly contains `roi`, in absolute units. A thin convenience over
/// [`Rect::to_bounding_box`] used when intersecting ROIs with tracker similarity metrics.
pub fn bounding_box_of(roi: &Rect) -> BoundingBox {
    roi.to_bounding_box()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normalize_radians_stays_bounded() {
        for i in 0..1000 {
            let angle = (i as f32 - 500.0) * 0.037;
            let n = normalize_radians(angle);
            assert!(n > -std::f32::consts::PI - 1e-4 && n <= std::f32::consts::PI + 1e-4, "angle={angle} n={n}");
        }
    }

    #[test]
    fn normalize_radians_is_idempotent() {
        let angle = 10.0;
        let once = normalize_radians(angle);
        let twice = normalize_radians(once);
        assert_relative_eq!(once, twice, epsilon = 1e-5);
    }

    #[test]
    fn value_range_maps_endpoints() {
        let (scale, offset) = transform_value_range(0.0, 10.0, -1.0, 1.0).unwrap();
        assert_relative_eq!(0.0 * scale + offset, -1.0);
        assert_relative_eq!(10.0 * scale + offset, 1.0);
        assert_relative_eq!(5.0 * scale + offset, 0.0);
    }

    #[test]
    fn value_range_rejects_degenerate_input() {
        assert!(transform_value_range(1.0, 1.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn pad_roi_matches_target_aspect() {
        let roi = Rect::new(0.0, 0.0, 100.0, 100.0, 0.0).unwrap();
        let (padded, padding) = pad_roi(&roi, 192, 256, true).unwrap();
        assert_relative_eq!(padded.height() / padded.width(), 256.0 / 192.0, epsilon = 1e-5);
        assert!(padding.top > 0.0 && padding.bottom > 0.0);
        assert_relative_eq!(padding.left, 0.0);
    }

    #[test]
    fn pad_roi_noop_without_keep_aspect() {
        let roi = Rect::new(0.0, 0.0, 100.0, 50.0, 0.0).unwrap();
        let (padded, padding) = pad_roi(&roi, 192, 256, false).unwrap();
        assert_eq!(padded, roi);
        assert_eq!(padding, Padding::ZERO);
    }

    #[test]
    fn get_roi_without_rect_covers_whole_image() {
        let roi = get_roi((640, 480), None).unwrap();
        assert_relative_eq!(roi.x_center(), 320.0);
        assert_relative_eq!(roi.y_center(), 240.0);
        assert_relative_eq!(roi.width(), 640.0);
        assert_relative_eq!(roi.height(), 480.0);
    }

    #[test]
    fn transform_and_inverse_compose_to_identity() {
        let roi = Rect::new(320.0, 240.0, 200.0, 150.0, 0.3).unwrap();
        let m = projective_transform_matrix(&roi, (640, 480), false, (192, 192)).unwrap();
        let inv = inverse_matrix(&m).unwrap();

        for &(x, y) in &[(0.0, 0.0), (1.0, 1.0), (0.5, 0.5), (0.25, 0.75)] {
            let (ix, iy) = m.apply(x, y);
            let (rx, ry) = inv.apply(ix, iy);
            assert_relative_eq!(rx, x, epsilon = 1e-4);
            assert_relative_eq!(ry, y, epsilon = 1e-4);
        }
    }

    #[test]
    fn transform_maps_roi_center_to_tensor_center() {
        let roi = Rect::new(320.0, 240.0, 200.0, 150.0, 0.0).unwrap();
        let m = projective_transform_matrix(&roi, (640, 480), false, (192, 192)).unwrap();
        let (x, y) = m.apply(0.5, 0.5);
        assert_relative_eq!(x, 320.0 / 640.0, epsilon = 1e-5);
        assert_relative_eq!(y, 240.0 / 480.0, epsilon = 1e-5);
    }

    #[test]
    fn flip_horizontally_mirrors_x() {
        let roi = Rect::new(320.0, 240.0, 200.0, 150.0, 0.0).unwrap();
        let m = projective_transform_matrix(&roi, (640, 480), true, (192, 192)).unwrap();
        let (x_left, _) = m.apply(0.0, 0.5);
        let (x_right, _) = m.apply(1.0, 0.5);
        assert!(x_left > x_right);
    }

    #[test]
    fn remove_letterbox_padding_undoes_pad_roi() {
        let roi = Rect::new(0.0, 0.0, 100.0, 50.0, 0.0).unwrap();
        let (_, padding) = pad_roi(&roi, 100, 200, true).unwrap();
        // The original ROI's top-left corner, expressed in padded-tensor-normalized space, sits
        // at (0, padding.top); stripping the padding should bring it back to (0, 0).
        let (x, y) = remove_letterbox_padding(0.0, padding.top, &padding);
        assert_relative_eq!(x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn transform_normalized_rect_shifts_relative_to_own_size() {
        let roi = Rect::new(0.5, 0.5, 0.2, 0.2, 0.0).unwrap();
        let cfg = RectTransformConfig { shift_x: 0.5, shift_y: 0.0, scale_x: 1.0, scale_y: 1.0, ..Default::default() };
        let shifted = transform_normalized_rect(&roi, (100, 100), &cfg).unwrap();
        assert_relative_eq!(shifted.x_center(), 0.6, epsilon = 1e-5);
        assert_relative_eq!(shifted.y_center(), 0.5, epsilon = 1e-5);
    }

    #[test]
    fn transform_normalized_rect_squares_long_side() {
        let roi = Rect::new(0.5, 0.5, 0.1, 0.2, 0.0).unwrap();
        let cfg = RectTransformConfig { square_long: true, scale_x: 1.0, scale_y: 1.0, ..Default::default() };
        let squared = transform_normalized_rect(&roi, (200, 100), &cfg).unwrap();
        // width*img_w = 20, height*img_h = 20: already square in absolute pixels.
        assert_relative_eq!(squared.width() * 200.0, squared.height() * 100.0, epsilon = 1e-4);
    }
}
