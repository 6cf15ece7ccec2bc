//! Segmentation-mask carry-through: the "one-line smoothing rule" spec.md §1 explicitly keeps in
//! scope while scoping the rest of mask post-processing (contour extraction, matting) out.

/// Blends a freshly decoded mask with the previous frame's smoothed mask:
/// `mask = alpha * new + (1 - alpha) * prev`. Masks must have identical length (same model, same
/// resolution every frame); when there's no previous mask yet (first frame after a reset), the
/// new mask is returned unchanged.
pub fn smooth_segmentation_mask(new_mask: &[f32], prev_mask: Option<&[f32]>, alpha: f32) -> Vec<f32> {
    match prev_mask {
        Some(prev) if prev.len() == new_mask.len() => {
            new_mask.iter().zip(prev).map(|(&n, &p)| alpha * n + (1.0 - alpha) * p).collect()
        }
        _ => new_mask.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_passes_through_unchanged() {
        let mask = vec![0.2, 0.8, 0.5];
        assert_eq!(smooth_segmentation_mask(&mask, None, 0.3), mask);
    }

    #[test]
    fn blends_with_previous_mask() {
        let new_mask = vec![1.0, 0.0];
        let prev_mask = vec![0.0, 1.0];
        let blended = smooth_segmentation_mask(&new_mask, Some(&prev_mask), 0.25);
        assert_eq!(blended, vec![0.25, 0.75]);
    }

    #[test]
    fn size_change_reinitializes_instead_of_mixing() {
        let new_mask = vec![1.0, 1.0, 1.0];
        let prev_mask = vec![0.0, 0.0];
        assert_eq!(smooth_segmentation_mask(&new_mask, Some(&prev_mask), 0.5), new_mask);
    }
}
