//! Heatmap-based keypoint refinement.

use argus_geometry::Keypoint;
use argus_nn::Tensor;

/// Refines each of `keypoints` against its corresponding channel of a `[H, W, K]` heatmap
/// tensor: within a `kernel_size`-wide square window centered on the keypoint's integer
/// `(row, col)`, find the maximum heatmap value; if it exceeds `min_confidence_to_refine`,
/// replace the keypoint's `(x, y)` with the window's score-weighted centroid. Keypoints beyond
/// the heatmap's channel count, or whose window max doesn't clear the threshold, are left
/// unchanged.
pub fn refine_with_heatmap(keypoints: &mut [Keypoint], heatmap: &Tensor, kernel_size: usize, min_confidence_to_refine: f32) {
    // Models conventionally wrap this output in a leading size-1 batch dimension
    // (`[1, H, W, K]`); accept that alongside the bare `[H, W, K]` shape.
    let heatmap = heatmap.index([]);
    let heatmap = match heatmap.shape() {
        [1, _, _, _] => heatmap.index([0]),
        [_, _, _] => heatmap,
        other => panic!("heatmap tensor must be [H, W, K] or [1, H, W, K], got {other:?}"),
    };
    let shape = heatmap.shape();
    let (height, width, channels) = (shape[0], shape[1], shape[2]);
    let half = (kernel_size / 2) as isize;

    for (k, kp) in keypoints.iter_mut().enumerate() {
        if k >= channels {
            break;
        }

        let col = (kp.x * width as f32) as isize;
        let row = (kp.y * height as f32) as isize;

        let mut max_value = f32::NEG_INFINITY;
        for dr in -half..=half {
            for dc in -half..=half {
                let (r, c) = (row + dr, col + dc);
                if r < 0 || c < 0 || r >= height as isize || c >= width as isize {
                    continue;
                }
                max_value = max_value.max(heatmap.index([r as usize, c as usize, k]).as_singular());
            }
        }

        if max_value <= min_confidence_to_refine {
            continue;
        }

        let (mut sum_weight, mut sum_x, mut sum_y) = (0.0, 0.0, 0.0);
        for dr in -half..=half {
            for dc in -half..=half {
                let (r, c) = (row + dr, col + dc);
                if r < 0 || c < 0 || r >= height as isize || c >= width as isize {
                    continue;
                }
                let value = heatmap.index([r as usize, c as usize, k]).as_singular();
                sum_weight += value;
                sum_x += value * c as f32;
                sum_y += value * r as f32;
            }
        }

        if sum_weight > 0.0 {
            kp.x = (sum_x / sum_weight + 0.5) / width as f32;
            kp.y = (sum_y / sum_weight + 0.5) / height as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refines_toward_window_peak() {
        // A 4x4, 1-channel heatmap with a sharp peak at (row=1, col=3).
        let heatmap = Tensor::from_array_shape_fn([4, 4, 1], |[r, c, _]| if r == 1 && c == 3 { 10.0 } else { 0.0 });
        let mut kps = vec![Keypoint::new(0.5, 0.25)]; // col=2, row=1 in a 4x4 grid
        refine_with_heatmap(&mut kps, &heatmap, 3, 1.0);
        assert!(kps[0].x > 0.5, "refined x should move toward the peak at col=3");
    }

    #[test]
    fn leaves_keypoint_unchanged_below_threshold() {
        let heatmap = Tensor::from_array_shape_fn([4, 4, 1], |_| 0.1);
        let mut kps = vec![Keypoint::new(0.5, 0.5)];
        refine_with_heatmap(&mut kps, &heatmap, 3, 1.0);
        assert_eq!(kps[0].x, 0.5);
        assert_eq!(kps[0].y, 0.5);
    }
}
