//! Letterbox removal and ROI-to-image projection for decoded landmarks.

use argus_geometry::{transform, Keypoint, Padding, Rect};

/// Strips letterbox padding from a landmark, the same inverse mapping used for detections
/// (spec.md §4.2's "letterbox removal"), applied to `x`/`y`. `z`, if present, is rescaled by the
/// x-axis factor (width padding) to preserve isotropy with x.
pub fn remove_landmark_letterbox(kp: &Keypoint, padding: &Padding) -> Keypoint {
    let (x, y) = transform::remove_letterbox_padding(kp.x, kp.y, padding);
    let mut out = Keypoint::new(x, y);
    if let Some(z) = kp.z {
        let (scale_x, _) = transform::transform_value_range(padding.left, 1.0 - padding.right, 0.0, 1.0).unwrap_or((1.0, 0.0));
        out = out.with_z(z * scale_x);
    }
    if let Some(score) = kp.score {
        out = out.with_score(score);
    }
    out
}

/// Projects a landmark from ROI-local normalized coordinates `(x_n, y_n, z_n)` into
/// image-normalized coordinates, accounting for the ROI's rotation.
pub fn project_landmark(roi: &Rect, x_n: f32, y_n: f32, z_n: f32) -> (f32, f32, f32) {
    let (sin, cos) = roi.rotation().sin_cos();
    let dx = (x_n - 0.5) * roi.width();
    let dy = (y_n - 0.5) * roi.height();
    let x = roi.x_center() + dx * cos - dy * sin;
    let y = roi.y_center() + dx * sin + dy * cos;
    let z = z_n * roi.width();
    (x, y, z)
}

/// Projects a world landmark (rotation only, no translation or scaling).
pub fn project_world_landmark(roi: &Rect, x: f32, y: f32) -> (f32, f32) {
    let (sin, cos) = roi.rotation().sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}

/// Copies the `score` field from `from` onto `to`, e.g. to attach 2D-landmark visibility to the
/// corresponding 3D world landmarks. Both slices must have the same length.
pub fn copy_scores(from: &[Keypoint], to: &mut [Keypoint]) {
    assert_eq!(from.len(), to.len(), "landmark sets must have matching length");
    for (src, dst) in from.iter().zip(to.iter_mut()) {
        dst.score = src.score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_landmark_projection() {
        let roi = Rect::new(0.5, 0.5, 1.0, 1.0, 0.0).unwrap();
        let (x, y, z) = project_landmark(&roi, 10.0, 20.0, -0.5);
        assert!((x - 10.0).abs() < 1e-5);
        assert!((y - 20.0).abs() < 1e-5);
        assert!((z - -0.5).abs() < 1e-5);

        let roi = Rect::new(0.5, 0.5, 0.5, 2.0, 0.0).unwrap();
        let (x, y, z) = project_landmark(&roi, 1.0, 1.0, -0.5);
        assert!((x - 0.75).abs() < 1e-5);
        assert!((y - 1.5).abs() < 1e-5);
        assert!((z - -0.25).abs() < 1e-5);
    }

    #[test]
    fn s4_letterbox_removal() {
        let padding = Padding::new(0.0, 0.25, 0.0, 0.25).unwrap();

        let kp = Keypoint::new(0.5, 0.5).with_z(0.2);
        let out = remove_landmark_letterbox(&kp, &padding);
        assert!((out.x - 0.5).abs() < 1e-5);
        assert!((out.y - 0.5).abs() < 1e-5);
        assert!((out.z.unwrap() - 0.2).abs() < 1e-5);

        let kp = Keypoint::new(0.5, 0.25).with_z(0.2);
        let out = remove_landmark_letterbox(&kp, &padding);
        assert!((out.x - 0.5).abs() < 1e-5);
        assert!((out.y - 0.0).abs() < 1e-5);
        assert!((out.z.unwrap() - 0.2).abs() < 1e-5);
    }

    #[test]
    fn world_landmark_projection_ignores_translation() {
        let roi = Rect::new(10.0, 10.0, 2.0, 2.0, std::f32::consts::FRAC_PI_2).unwrap();
        let (x, y) = project_world_landmark(&roi, 1.0, 0.0);
        assert!(x.abs() < 1e-5);
        assert!((y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn copy_scores_overwrites_destination_only() {
        let from = vec![Keypoint::new(0.0, 0.0).with_score(0.9)];
        let mut to = vec![Keypoint::new(1.0, 1.0)];
        copy_scores(&from, &mut to);
        assert_eq!(to[0].x, 1.0);
        assert_eq!(to[0].score, Some(0.9));
    }
}
