//! The per-frame pose-estimation state machine (spec.md §4.4): caches a region of interest (ROI)
//! between frames, runs the detector only when that cache is empty, decodes and smooths the
//! landmark model's output, and derives the ROI for the next frame from the smoothed auxiliary
//! landmarks.
//!
//! Mirrors the single-person, ROI-caching architecture of a BlazePose-style pipeline. Tracking
//! *multiple* people across frames is a separate, composable concern — see [`crate::tracker`] —
//! which a caller wires on top of one [`Pipeline`] per detected person, or on top of several
//! independent `Pipeline` instances (spec.md §5: one instance per stream, no shared state).

use argus_nn::backend::NamedTensor;
use argus_nn::{InferenceBackend, Tensor, TensorView};

use argus_geometry::image::Image;
use argus_geometry::{transform, BoundingBox, ImageSize, Keypoint, Padding, Rect};

use crate::anchors::{AnchorParams, Anchors};
use crate::detection::decode::{tensors_to_detections, DecodeParams};
use crate::detection::nms::{NonMaxSuppression, Similarity as NmsSimilarity, SuppressionMode};
use crate::detection::RawDetection;
use crate::filter::{KeypointSmoother, ScalarFilterKind, VisibilityFilter};
use crate::landmark::{self, Activation, LandmarkDecodeParams};
use crate::Error;

/// Which named input/output tensors the detector model exposes.
#[derive(Debug, Clone, Copy)]
pub struct DetectorIo {
    pub input: &'static str,
    pub scores: &'static str,
    pub boxes: &'static str,
}

/// Which named input/output tensors the landmark model exposes. `heatmap` and `world_landmarks`
/// are `None` for model variants that don't produce them (spec.md §6's "Pose B" contract, for
/// instance, has neither).
#[derive(Debug, Clone, Copy)]
pub struct LandmarkIo {
    pub input: &'static str,
    pub landmarks: &'static str,
    pub presence: &'static str,
    pub heatmap: Option<&'static str>,
    pub world_landmarks: Option<&'static str>,
    /// `[H, W]` segmentation-mask output, e.g. `activation_segmentation:[256,256]` (spec.md §6).
    /// `None` for model variants that don't produce one.
    pub segmentation: Option<&'static str>,
}

/// Parameters for the heatmap-argmax refinement step (spec.md §4.3).
#[derive(Debug, Clone, Copy)]
pub struct HeatmapConfig {
    pub kernel_size: usize,
    pub min_confidence_to_refine: f32,
}

/// Which temporal filter each landmark stream is smoothed with (spec.md §4.5). Auxiliary
/// landmarks are typically smoothed more aggressively than the actual keypoints, since their
/// only purpose is stabilizing the next-frame ROI.
#[derive(Debug, Clone)]
pub struct SmoothingConfig {
    pub actual: ScalarFilterKind,
    pub auxiliary: ScalarFilterKind,
    /// `None` when the model variant doesn't produce world landmarks.
    pub world: Option<ScalarFilterKind>,
    pub visibility_alpha: f32,
    /// Blend factor for the segmentation-mask "one-line smoothing rule" (spec.md §4.4, §9):
    /// `mask = alpha * mask_new + (1 - alpha) * mask_prev`. Unused when `LandmarkIo::segmentation`
    /// is `None`.
    pub segmentation_alpha: f32,
}

/// Everything needed to construct a [`Pipeline`] for one model variant: tensor I/O names and
/// shapes, anchor/decode parameters, landmark layout, and the smoothing configuration. This is
/// `createPipeline`'s `modelConfig` argument (spec.md §6).
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub detector_io: DetectorIo,
    pub landmark_io: LandmarkIo,
    pub detector_input_size: (u32, u32),
    pub landmark_input_size: (u32, u32),
    pub anchors: AnchorParams,
    pub detector_decode: DecodeParams,
    pub detector_min_score: f32,
    pub nms_threshold: f32,
    pub nms_mode: SuppressionMode,
    pub nms_similarity: NmsSimilarity,
    pub landmark_decode: LandmarkDecodeParams,
    pub num_actual_landmarks: usize,
    pub num_auxiliary_landmarks: usize,
    /// Indices into a detection's alignment keypoints: `[center, rotation-target]`.
    pub alignment_keypoints: [usize; 2],
    /// Indices into the smoothed auxiliary-landmark set used to derive the next-frame ROI.
    pub aux_alignment_keypoints: [usize; 2],
    pub detection_rect_transform: transform::RectTransformConfig,
    pub auxiliary_rect_transform: transform::RectTransformConfig,
    pub presence_threshold: f32,
    pub heatmap: Option<HeatmapConfig>,
    pub keep_aspect_ratio: bool,
    /// The detector's alignment target rotation, in radians (spec.md §4.4 step 3: 90°).
    pub roi_target_rotation_rad: f32,
    pub smoothing: SmoothingConfig,
}

/// Per-call options (spec.md §6's `estimationConfig`).
#[derive(Debug, Clone, Copy)]
pub struct EstimationConfig {
    pub max_poses: usize,
    pub flip_horizontal: bool,
    pub enable_smoothing: bool,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self { max_poses: 1, flip_horizontal: false, enable_smoothing: true }
    }
}

/// A decoded, smoothed pose: image-normalized actual keypoints, optional world landmarks, and
/// the landmark model's own pose-presence score. `id` is left `None` here — it's filled in by a
/// [`crate::tracker::Tracker`] if the caller composes one on top.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Pose {
    pub keypoints: Vec<Keypoint>,
    pub world_landmarks: Option<Vec<Keypoint>>,
    pub score: f32,
    pub id: Option<u64>,
}

#[derive(Debug, Clone, Default)]
struct PipelineState {
    roi: Option<Rect>,
    last_timestamp_us: Option<i64>,
    /// The smoothed segmentation mask from the previous frame (spec.md §3's
    /// `prevSegmentationMask`), dropped along with everything else on reset.
    prev_segmentation_mask: Option<Vec<f32>>,
}

/// The stateful, per-stream pose pipeline: `createPipeline` / `estimatePoses` / `reset` /
/// `dispose` (spec.md §6). `D` and `L` are the detector and landmark model backends; they're
/// almost always the same concrete type, but are kept independent so a caller can mix backends
/// (e.g. a CPU detector with a GPU landmark model).
pub struct Pipeline<D, L> {
    config: ModelConfig,
    detector: D,
    landmarker: L,
    anchors: Anchors,
    nms: NonMaxSuppression,
    state: PipelineState,
    actual_filter: KeypointSmoother,
    aux_filter: KeypointSmoother,
    world_filter: Option<KeypointSmoother>,
    visibility_filter: VisibilityFilter,
}

impl<D: InferenceBackend, L: InferenceBackend> Pipeline<D, L> {
    pub fn new(config: ModelConfig, detector: D, landmarker: L) -> Result<Self, Error> {
        if config.num_actual_landmarks == 0 {
            return Err(Error::Config("numActualLandmarks must be at least 1".into()));
        }
        let anchors = Anchors::calculate(&config.anchors)?;

        let mut nms = NonMaxSuppression::new();
        nms.set_suppression_threshold(config.nms_threshold);
        nms.set_mode(config.nms_mode);
        nms.set_similarity(config.nms_similarity);

        Ok(Self {
            actual_filter: KeypointSmoother::new(config.smoothing.actual.clone()),
            aux_filter: KeypointSmoother::new(config.smoothing.auxiliary.clone()),
            world_filter: config.smoothing.world.clone().map(KeypointSmoother::new),
            visibility_filter: VisibilityFilter::new(config.smoothing.visibility_alpha),
            anchors,
            nms,
            detector,
            landmarker,
            state: PipelineState::default(),
            config,
        })
    }

    /// The ROI cached from the previous frame, if any. Exposed mainly for tests and diagnostics.
    pub fn cached_roi(&self) -> Option<Rect> {
        self.state.roi
    }

    /// The segmentation mask smoothed so far (spec.md §3's `prevSegmentationMask`), if the model
    /// variant produces one. Exposed mainly for tests and diagnostics; downstream mask
    /// post-processing (contour extraction, matting) is out of scope (spec.md §1).
    pub fn segmentation_mask(&self) -> Option<&[f32]> {
        self.state.prev_segmentation_mask.as_deref()
    }

    /// Drops the cached ROI and all filter state, as if this were a brand-new stream.
    pub fn reset(&mut self) {
        self.state = PipelineState::default();
        self.actual_filter.reset();
        self.aux_filter.reset();
        if let Some(filter) = self.world_filter.as_mut() {
            filter.reset();
        }
        self.visibility_filter.reset();
    }

    /// Releases the pipeline's model backends. Tensors and native model resources are released
    /// through their own `Drop` impls the moment this returns — there is no separate unload step
    /// (spec.md §5's "scoped acquisition pattern" reduces, for an owned pipeline, to ordinary
    /// Rust ownership).
    pub fn dispose(self) {
        drop(self);
    }

    /// Runs one frame through the pipeline. `image = None` is not an error (spec.md §7): it
    /// resets all state and returns an empty pose list, same as a frame with zero detections or
    /// below-threshold presence.
    pub fn estimate_poses(
        &mut self,
        image: Option<&Image>,
        est_config: &EstimationConfig,
        timestamp_ms: Option<f64>,
    ) -> Result<Vec<Pose>, Error> {
        let Some(image) = image else {
            self.reset();
            return Ok(Vec::new());
        };

        let timestamp_us = timestamp_ms.map(|ms| (ms * 1000.0) as i64);
        if let (Some(ts), Some(last)) = (timestamp_us, self.state.last_timestamp_us) {
            if ts <= last {
                log::warn!("pipeline received a non-monotone timestamp ({ts} <= {last}); resetting stream state");
                self.reset();
                return Ok(Vec::new());
            }
        }

        let image_size = (image.width(), image.height());

        let roi = match self.state.roi {
            Some(roi) => roi,
            None => {
                let detections = self.run_detector(image, est_config)?;
                let Some(best) = detections.first() else {
                    self.reset();
                    return Ok(Vec::new());
                };
                let [i0, i1] = self.config.alignment_keypoints;
                let keypoints = best.keypoints();
                assert!(
                    keypoints.len() > i0.max(i1),
                    "detector produced fewer alignment keypoints than configured"
                );
                self.roi_from_alignment(
                    best.bounding_box(),
                    [keypoints[i0], keypoints[i1]],
                    image_size,
                    &self.config.detection_rect_transform,
                )?
            }
        };

        let (tensor, padding, _) =
            self.crop_to_tensor(image, &roi, self.config.landmark_input_size, est_config.flip_horizontal, (0.0, 1.0))?;

        let mut output_names = vec![self.config.landmark_io.landmarks, self.config.landmark_io.presence];
        if let Some(name) = self.config.landmark_io.heatmap {
            output_names.push(name);
        }
        if let Some(name) = self.config.landmark_io.world_landmarks {
            output_names.push(name);
        }
        if let Some(name) = self.config.landmark_io.segmentation {
            output_names.push(name);
        }

        let outputs = self
            .landmarker
            .run(&[NamedTensor { name: self.config.landmark_io.input, tensor }], &output_names)
            .map_err(Error::Backend)?;
        let mut outputs = outputs.into_iter();
        let landmark_tensor =
            outputs.next().ok_or_else(|| Error::ShapeMismatch("landmark model returned no outputs".into()))?;
        let presence_tensor =
            outputs.next().ok_or_else(|| Error::ShapeMismatch("landmark model did not return a presence output".into()))?;
        let heatmap_tensor = if self.config.landmark_io.heatmap.is_some() { outputs.next() } else { None };
        let world_tensor = if self.config.landmark_io.world_landmarks.is_some() { outputs.next() } else { None };
        let segmentation_tensor = if self.config.landmark_io.segmentation.is_some() { outputs.next() } else { None };

        let presence = argus_utils::num::sigmoid(scalar(&presence_tensor));
        if presence < self.config.presence_threshold {
            self.reset();
            return Ok(Vec::new());
        }

        let mut landmarks = landmark::decode_landmarks(landmark_tensor.as_raw_data(), &self.config.landmark_decode);

        if let (Some(heatmap), Some(cfg)) = (&heatmap_tensor, &self.config.heatmap) {
            landmark::refine_with_heatmap(&mut landmarks, heatmap, cfg.kernel_size, cfg.min_confidence_to_refine);
        }

        for kp in &mut landmarks {
            *kp = landmark::remove_landmark_letterbox(kp, &padding);
        }

        let roi_norm = Rect::new(
            roi.x_center() / image_size.0 as f32,
            roi.y_center() / image_size.1 as f32,
            roi.width() / image_size.0 as f32,
            roi.height() / image_size.1 as f32,
            roi.rotation(),
        )?;

        let num_actual = self.config.num_actual_landmarks;
        let num_aux = self.config.num_auxiliary_landmarks;
        assert!(
            landmarks.len() >= num_actual + num_aux,
            "landmark model produced fewer landmarks than configured (actual + auxiliary)"
        );
        let actual: Vec<Keypoint> = landmarks[..num_actual].iter().map(|kp| project(&roi_norm, kp)).collect();
        let auxiliary: Vec<Keypoint> =
            landmarks[num_actual..num_actual + num_aux].iter().map(|kp| project(&roi_norm, kp)).collect();

        let mut world: Option<Vec<Keypoint>> = world_tensor.as_ref().map(|t| {
            t.as_raw_data()
                .chunks_exact(3)
                .map(|c| {
                    let (x, y) = landmark::project_world_landmark(&roi_norm, c[0], c[1]);
                    Keypoint::new(x, y).with_z(c[2])
                })
                .collect::<Vec<_>>()
        });
        if let Some(world) = world.as_mut() {
            if world.len() == actual.len() {
                landmark::copy_scores(&actual, world);
            }
        }

        let object_scale = (roi.width() + roi.height()) / 2.0;

        let (actual, auxiliary, world) = if est_config.enable_smoothing && timestamp_us.is_some() {
            let ts = timestamp_us.unwrap();
            let smoothed_actual = self.actual_filter.apply(&actual, ts, object_scale, Some(image_size));
            let smoothed_actual = self.visibility_filter.apply(&smoothed_actual);
            let smoothed_aux = self.aux_filter.apply(&auxiliary, ts, object_scale, Some(image_size));
            let smoothed_world = match (world, self.world_filter.as_mut()) {
                (Some(w), Some(filter)) => Some(filter.apply(&w, ts, object_scale, None)),
                (w, _) => w,
            };
            (smoothed_actual, smoothed_aux, smoothed_world)
        } else {
            (actual, auxiliary, world)
        };

        let [a0, a1] = self.config.aux_alignment_keypoints;
        assert!(auxiliary.len() > a0.max(a1), "fewer auxiliary landmarks than configured alignment indices");
        let next_roi = self.roi_from_alignment(
            bounding_box_of(&auxiliary),
            [auxiliary[a0], auxiliary[a1]],
            image_size,
            &self.config.auxiliary_rect_transform,
        )?;

        if let Some(mask_tensor) = &segmentation_tensor {
            let smoothed = landmark::smooth_segmentation_mask(
                mask_tensor.as_raw_data(),
                self.state.prev_segmentation_mask.as_deref(),
                self.config.smoothing.segmentation_alpha,
            );
            self.state.prev_segmentation_mask = Some(smoothed);
        }

        self.state.roi = Some(next_roi);
        self.state.last_timestamp_us = timestamp_us.or(self.state.last_timestamp_us);

        Ok(vec![Pose { keypoints: actual, world_landmarks: world, score: presence, id: None }])
    }

    /// Runs the full detector pipeline (spec.md §4.2) against the whole image: image-to-tensor,
    /// detector inference, SSD decode, NMS, letterbox removal. Returns detections sorted
    /// highest-confidence first, capped to `est_config.max_poses`.
    fn run_detector(&mut self, image: &Image, est_config: &EstimationConfig) -> Result<Vec<RawDetection>, Error> {
        let image_size = (image.width(), image.height());
        let full_image_roi = transform::get_roi(image_size, None)?;
        let (tensor, padding, _) =
            self.crop_to_tensor(image, &full_image_roi, self.config.detector_input_size, false, (-1.0, 1.0))?;

        let outputs = self
            .detector
            .run(
                &[NamedTensor { name: self.config.detector_io.input, tensor }],
                &[self.config.detector_io.scores, self.config.detector_io.boxes],
            )
            .map_err(Error::Backend)?;

        let scores = flatten_scores(outputs[0].index([0]));
        let boxes = outputs[1].index([0]).as_raw_data().to_vec();

        let mut decode_params = self.config.detector_decode.clone();
        decode_params.min_score_thresh = self.config.detector_min_score;

        let mut detections = tensors_to_detections(&scores, &boxes, self.anchors.as_slice(), &decode_params);

        self.nms.set_max_detections(est_config.max_poses);
        let mut kept: Vec<RawDetection> = self.nms.process(&mut detections).collect();
        for det in &mut kept {
            remove_detection_letterbox(det, &padding);
        }
        Ok(kept)
    }

    /// Builds the next ROI from a bounding box and a pair of alignment keypoints, all in
    /// image-normalized coordinates: orient by the rotation implied by the two keypoints
    /// (spec.md §4.4 step 3: target rotation 90°), then shift/scale/square per `rect_cfg`
    /// (spec.md §4.1's `transformNormalizedRect`).
    fn roi_from_alignment(
        &self,
        bbox_norm: BoundingBox,
        alignment: [Keypoint; 2],
        image_size: ImageSize,
        rect_cfg: &transform::RectTransformConfig,
    ) -> Result<Rect, Error> {
        let rotation =
            alignment_rotation(alignment[0], alignment[1], image_size, self.config.roi_target_rotation_rad);
        let width = bbox_norm.width().max(1e-6);
        let height = bbox_norm.height().max(1e-6);
        let base = Rect::new(bbox_norm.x_center(), bbox_norm.y_center(), width, height, rotation)?;
        let shaped = transform::transform_normalized_rect(&base, image_size, rect_cfg)?;
        Ok(transform::get_roi(image_size, Some(&shaped))?)
    }

    /// Pads `roi` to the target aspect ratio, builds the sampling matrix, crops `image` into a
    /// `target_size` tensor, and rescales pixel values into `value_range` (spec.md §4.1, §4.4
    /// step 4).
    fn crop_to_tensor(
        &self,
        image: &Image,
        roi: &Rect,
        target_size: (u32, u32),
        flip_horizontal: bool,
        value_range: (f32, f32),
    ) -> Result<(Tensor, Padding, Rect), Error> {
        let image_size = (image.width(), image.height());
        let (padded_roi, padding) = transform::pad_roi(roi, target_size.0, target_size.1, self.config.keep_aspect_ratio)?;
        let matrix = transform::projective_transform_matrix(&padded_roi, image_size, flip_horizontal, target_size)?;
        let cropped = image.sample_affine(&matrix, target_size);
        let tensor = image_to_tensor(&cropped, value_range.0, value_range.1);
        Ok((tensor, padding, padded_roi))
    }
}

fn project(roi_norm: &Rect, kp: &Keypoint) -> Keypoint {
    let (x, y, z) = landmark::project_landmark(roi_norm, kp.x, kp.y, kp.z.unwrap_or(0.0));
    let mut out = Keypoint::new(x, y);
    if kp.z.is_some() {
        out = out.with_z(z);
    }
    if let Some(score) = kp.score {
        out = out.with_score(score);
    }
    out
}

fn alignment_rotation(center: Keypoint, target: Keypoint, image_size: ImageSize, target_angle_rad: f32) -> f32 {
    let (w, h) = (image_size.0 as f32, image_size.1 as f32);
    let (x0, y0) = (center.x * w, center.y * h);
    let (x1, y1) = (target.x * w, target.y * h);
    transform::normalize_radians(target_angle_rad - (-(y1 - y0)).atan2(x1 - x0))
}

fn bounding_box_of(points: &[Keypoint]) -> BoundingBox {
    let mut x_min = f32::INFINITY;
    let mut y_min = f32::INFINITY;
    let mut x_max = f32::NEG_INFINITY;
    let mut y_max = f32::NEG_INFINITY;
    for kp in points {
        x_min = x_min.min(kp.x);
        y_min = y_min.min(kp.y);
        x_max = x_max.max(kp.x);
        y_max = y_max.max(kp.y);
    }
    BoundingBox { x_min, y_min, x_max, y_max }
}

fn remove_detection_letterbox(det: &mut RawDetection, padding: &Padding) {
    let bb = det.bounding_box();
    let (x_min, y_min) = transform::remove_letterbox_padding(bb.x_min, bb.y_min, padding);
    let (x_max, y_max) = transform::remove_letterbox_padding(bb.x_max, bb.y_max, padding);
    det.set_bounding_box(BoundingBox { x_min, y_min, x_max, y_max });
    for kp in det.keypoints_mut() {
        let (x, y) = transform::remove_letterbox_padding(kp.x, kp.y, padding);
        kp.x = x;
        kp.y = y;
    }
}

/// Reduces a tensor to its single value by indexing `0` along every remaining dimension. Used
/// for scalar outputs (e.g. pose presence) that models conventionally wrap in one or more
/// size-1 batch dimensions.
fn scalar(tensor: &Tensor) -> f32 {
    let mut view = tensor.index([]);
    while view.rank() > 0 {
        view = view.index([0]);
    }
    view.as_singular()
}

/// Reduces a post-batch-dimension score view to one best-class score per box (spec.md §4.2:
/// "drop ignored classes, keep the best class per box"). Accepts either a `[num_boxes]` single-
/// class layout or a `[num_boxes, num_classes]` multi-class layout.
fn flatten_scores(view: TensorView<'_>) -> Vec<f32> {
    match view.shape() {
        [] => vec![view.as_singular()],
        [_] => view.as_raw_data().to_vec(),
        &[num_boxes, num_classes] => (0..num_boxes)
            .map(|i| {
                let row = view.index([i]);
                (0..num_classes).map(|c| row.index([c]).as_singular()).fold(f32::NEG_INFINITY, f32::max)
            })
            .collect(),
        _ => panic!("unsupported detector score tensor shape {:?}", view.shape()),
    }
}

/// Builds a `[1, H, W, 3]` model input tensor from a cropped RGB image, rescaling `u8` channel
/// values from `[0, 255]` into `value_range`.
fn image_to_tensor(image: &Image, value_min: f32, value_max: f32) -> Tensor {
    let (w, h) = (image.width() as usize, image.height() as usize);
    Tensor::from_array_shape_fn([1, h, w, 3], |[_, y, x, c]| {
        let p = image.get_pixel(x as u32, y as u32);
        let v = p[c] as f32 / 255.0;
        value_min + v * (value_max - value_min)
    })
}
