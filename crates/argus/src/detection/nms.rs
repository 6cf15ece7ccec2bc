//! Non-Maximum Suppression and Averaging.
//!
//! Typical Single-Shot MultiBox Detectors (SSD) produce duplicate detections for individual
//! objects. Non-Maximum Suppression (NMS) is an algorithm that filters these duplicates out,
//! leaving only a single detection with high confidence for each object.
//!
//! This module implements 2 variants of NMS, selected with [`SuppressionMode`]: the classic
//! Non-Maximum Suppression algorithm that removes any overlapping detections with lower confidence
//! ([`SuppressionMode::Remove`]), and the slightly smarter Non-Maximum Averaging
//! ([`SuppressionMode::Average`]) which instead computes a weighted average of overlapping
//! detections. Since the latter reduces jitter between frames, and does not seem to have any
//! appreciable drawbacks (outside of a minor computational cost), it is used by default.
//!
//! Similarity between two detections' boxes can be measured by IoU (intersection-over-union) or
//! IoM (intersection-over-minimum); the latter also catches a small box fully contained in a much
//! larger one, where IoU alone would stay low.

use argus_geometry::BoundingBox;
use argus_utils::{iter::zip_exact, num::TotalF32};

use super::RawDetection;

/// The similarity metric used to decide whether two detections overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Similarity {
    IntersectionOverUnion,
    IntersectionOverMinimum,
}

impl Similarity {
    fn compute(self, a: &BoundingBox, b: &BoundingBox) -> f32 {
        match self {
            Similarity::IntersectionOverUnion => a.iou(b),
            Similarity::IntersectionOverMinimum => a.iom(b),
        }
    }
}

/// A non-maximum suppression algorithm.
pub struct NonMaxSuppression {
    suppression_threshold: f32,
    max_detections: Option<usize>,
    similarity: Similarity,
    mode: SuppressionMode,
    avg_buf: Vec<RawDetection>,
    out_buf: Vec<RawDetection>,
}

impl NonMaxSuppression {
    /// The default similarity threshold used to determine if two detections overlap.
    pub const DEFAULT_SUPPRESSION_THRESHOLD: f32 = 0.3;

    /// Creates a new non-maximum suppressor.
    ///
    /// The returned suppression algorithm will use [`SuppressionMode::Average`],
    /// [`Similarity::IntersectionOverUnion`], and a default suppression threshold, with no cap on
    /// the number of detections returned.
    pub fn new() -> Self {
        Self {
            suppression_threshold: Self::DEFAULT_SUPPRESSION_THRESHOLD,
            max_detections: None,
            similarity: Similarity::IntersectionOverUnion,
            mode: SuppressionMode::Average,
            avg_buf: Vec::new(),
            out_buf: Vec::new(),
        }
    }

    /// Sets the similarity threshold above which two detections are considered overlapping.
    ///
    /// By default, [`Self::DEFAULT_SUPPRESSION_THRESHOLD`] is used.
    pub fn set_suppression_threshold(&mut self, threshold: f32) {
        self.suppression_threshold = threshold;
    }

    /// Sets the similarity metric used to compare two detections' boxes.
    pub fn set_similarity(&mut self, similarity: Similarity) {
        self.similarity = similarity;
    }

    /// Sets the suppression mode.
    pub fn set_mode(&mut self, mode: SuppressionMode) {
        self.mode = mode;
    }

    /// Caps the number of detections returned by [`Self::process`] to the `max` highest-confidence
    /// survivors.
    pub fn set_max_detections(&mut self, max: usize) {
        self.max_detections = Some(max);
    }

    /// Performs non-maximum suppression on `detections`.
    ///
    /// `detections` will be modified in the process. The filtered detections are returned as an
    /// iterator, highest confidence first.
    pub fn process(&mut self, detections: &mut Vec<RawDetection>) -> impl Iterator<Item = RawDetection> + '_ {
        self.out_buf.clear();

        // Sort by ascending confidence, process highest confidence first by starting at the back.
        detections.sort_unstable_by_key(|det| TotalF32(det.confidence()));

        while let Some(seed) = detections.pop() {
            if let Some(max) = self.max_detections {
                if self.out_buf.len() >= max {
                    break;
                }
            }

            match self.mode {
                SuppressionMode::Remove => {
                    detections.retain(|other| {
                        let sim = self.similarity.compute(&seed.bounding_box(), &other.bounding_box());
                        sim < self.suppression_threshold
                    });
                    self.out_buf.push(seed);
                }
                SuppressionMode::Average => {
                    self.avg_buf.clear();
                    self.avg_buf.push(seed.clone());
                    let similarity = self.similarity;
                    let threshold = self.suppression_threshold;
                    let avg_buf = &mut self.avg_buf;
                    detections.retain(|other| {
                        let sim = similarity.compute(&seed.bounding_box(), &other.bounding_box());
                        if sim >= threshold {
                            avg_buf.push(other.clone());
                            false
                        } else {
                            true
                        }
                    });

                    self.out_buf.push(average(&self.avg_buf));
                }
            }
        }

        self.avg_buf.clear();
        self.out_buf.drain(..)
    }
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

/// Confidence-weighted average of a set of overlapping detections, keeping the highest
/// confidence score of the group (the averaging only smooths the geometry, not the score).
fn average(detections: &[RawDetection]) -> RawDetection {
    let best_confidence = detections.iter().map(RawDetection::confidence).fold(f32::MIN, f32::max);

    let mut num_keypoints = 0;
    for det in detections {
        if !det.keypoints().is_empty() {
            num_keypoints = det.keypoints().len();
            break;
        }
    }

    let mut acc = RawDetection::with_keypoints(
        best_confidence,
        BoundingBox::from_center(0.0, 0.0, 0.0, 0.0),
        vec![argus_geometry::Keypoint::new(0.0, 0.0); num_keypoints],
    );

    let (mut xc, mut yc, mut w, mut h) = (0.0, 0.0, 0.0, 0.0);
    let mut divisor = 0.0;
    for det in detections {
        assert_eq!(acc.keypoints().len(), det.keypoints().len(), "landmark count must be constant");

        let factor = det.confidence();
        divisor += factor;
        for (acc_kp, kp) in zip_exact(acc.keypoints_mut().iter_mut(), det.keypoints()) {
            acc_kp.x += kp.x * factor;
            acc_kp.y += kp.y * factor;
        }
        let bb = det.bounding_box();
        xc += bb.x_center() * factor;
        yc += bb.y_center() * factor;
        w += bb.width() * factor;
        h += bb.height() * factor;
    }

    for kp in acc.keypoints_mut() {
        kp.x /= divisor;
        kp.y /= divisor;
    }
    acc.set_bounding_box(BoundingBox::from_center(xc / divisor, yc / divisor, w / divisor, h / divisor));
    acc
}

/// Describes how [`NonMaxSuppression`] should deal with overlapping detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SuppressionMode {
    /// Remove overlapping detections, only retain the detection with highest confidence score.
    Remove,

    /// Compute a confidence-weighted average of overlapping detections.
    Average,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nms_suppresses_non_maximum() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);

        let rect = BoundingBox::from_center(0.0, 0.0, 1.0, 1.0);
        let a = RawDetection::new(0.6, rect);
        let b = RawDetection::new(0.55, rect.grow_rel(0.25, 0.25, 0.25, 0.25));
        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence(), 0.6);
    }

    #[test]
    fn nms_ignores_nonoverlapping() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);

        let a = RawDetection::new(1.0, BoundingBox::from_center(0.0, 0.0, 1.0, 1.0));
        let b = RawDetection::new(1.0, BoundingBox::from_center(5.0, 0.0, 1.0, 1.0));

        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 2);
    }

    #[test]
    fn nma_averages_detections() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Average);
        nms.set_suppression_threshold(0.0);

        let rect = BoundingBox::from_center(-1.0, 3.0, 1.0, 1.0);
        let a = RawDetection::new(1.0, rect);
        let b = RawDetection::new(0.5, BoundingBox::from_center(-1.0, 3.0, 4.0, 4.0));
        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        let bb = d.bounding_box();
        assert_eq!(d.confidence(), 1.0);
        assert!((bb.x_center() - -1.0).abs() < 1e-6);
        assert!((bb.y_center() - 3.0).abs() < 1e-6);
        assert!((bb.width() - 2.0).abs() < 1e-6);
        assert!((bb.height() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn s2_keeps_only_higher_scoring_detection() {
        let mut nms = NonMaxSuppression::new();
        nms.set_mode(SuppressionMode::Remove);
        nms.set_suppression_threshold(0.3);

        let a = RawDetection::new(0.9, BoundingBox { x_min: 0.1, y_min: 0.1, x_max: 0.5, y_max: 0.5 });
        let b = RawDetection::new(0.8, BoundingBox { x_min: 0.2, y_min: 0.2, x_max: 0.6, y_max: 0.6 });

        let iou = a.bounding_box().iou(&b.bounding_box());
        assert!((iou - 0.391).abs() < 0.01);

        let detections = nms.process(&mut vec![a, b]).collect::<Vec<_>>();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence(), 0.9);
    }
}
