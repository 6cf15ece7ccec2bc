//! SSD anchor grid generation.
//!
//! Mirrors the anchor layout used by MediaPipe-style SSD detectors: a multi-layer feature
//! pyramid where each layer contributes one anchor per (cell, aspect ratio) combination, ordered
//! layer-major / row-major / col-major / aspect-minor so the anchor index lines up with the
//! model's flattened box/score output.

use argus_geometry::{Error, Rect};

/// A single anchor: an unrotated prior box in image-normalized coordinates.
pub type Anchor = Rect;

/// Per-layer feature-map stride, in input-tensor pixels.
///
/// `strides[k]` is consulted for layer `k`; consecutive layers sharing the same stride are
/// folded into a single feature-map pass with more aspect ratios per cell, exactly as the
/// reference SSD anchor generator does (this is what lets a single 128x128, stride-[8,16,16,16]
/// configuration produce the 16x16 and 8x8 feature maps of S1 instead of four separate passes).
#[derive(Debug, Clone)]
pub struct AnchorParams {
    pub num_layers: usize,
    pub min_scale: f32,
    pub max_scale: f32,
    pub input_size_w: u32,
    pub input_size_h: u32,
    pub strides: Vec<u32>,
    pub aspect_ratios: Vec<f32>,
    pub anchor_offset_x: f32,
    pub anchor_offset_y: f32,
    pub fixed_anchor_size: bool,
    pub reduce_boxes_in_lowest_layer: bool,
    /// `0.0` disables the extra geometric-mean-scale anchor.
    pub interpolated_scale_aspect_ratio: f32,
}

impl Default for AnchorParams {
    fn default() -> Self {
        Self {
            num_layers: 1,
            min_scale: 0.2,
            max_scale: 0.95,
            input_size_w: 128,
            input_size_h: 128,
            strides: vec![8],
            aspect_ratios: vec![1.0],
            anchor_offset_x: 0.5,
            anchor_offset_y: 0.5,
            fixed_anchor_size: false,
            reduce_boxes_in_lowest_layer: false,
            interpolated_scale_aspect_ratio: 0.0,
        }
    }
}

impl AnchorParams {
    fn validate(&self) -> Result<(), Error> {
        if self.num_layers == 0 || self.strides.len() != self.num_layers {
            return Err(Error::ZeroDimension);
        }
        if self.input_size_w == 0 || self.input_size_h == 0 {
            return Err(Error::ZeroDimension);
        }
        Ok(())
    }
}

fn calculate_scale(min_scale: f32, max_scale: f32, layer_index: usize, num_layers: usize) -> f32 {
    if num_layers == 1 {
        min_scale
    } else {
        min_scale + (max_scale - min_scale) * layer_index as f32 / (num_layers - 1) as f32
    }
}

/// The generated anchor grid, kept both as the original `Vec<Anchor>` and as a struct-of-arrays
/// (`x_centers`/`y_centers`/`widths`/`heights`) for the vectorized decode path in
/// [`crate::detection::decode`].
#[derive(Debug, Clone)]
pub struct Anchors {
    anchors: Vec<Anchor>,
}

impl Anchors {
    /// Generates the anchor grid for `params`.
    pub fn calculate(params: &AnchorParams) -> Result<Self, Error> {
        params.validate()?;

        let mut anchors = Vec::new();
        let mut layer_id = 0;
        while layer_id < params.num_layers {
            let mut aspect_ratios = Vec::new();
            let mut scales = Vec::new();

            // Layers sharing a stride with `layer_id` are processed together, contributing
            // their aspect ratios/scales to the same feature map.
            let mut last = layer_id;
            while last < params.num_layers && params.strides[last] == params.strides[layer_id] {
                let scale = calculate_scale(params.min_scale, params.max_scale, last, params.num_layers);

                if last == 0 && params.reduce_boxes_in_lowest_layer {
                    // The literal fixed-three-box definition from the SSD-anchor literature;
                    // uncalibrated against a reference implementation (spec.md §9).
                    aspect_ratios.extend([1.0, 1.0, 1.0]);
                    scales.extend([0.1, params.min_scale, params.min_scale]);
                } else {
                    for &ratio in &params.aspect_ratios {
                        aspect_ratios.push(ratio);
                        scales.push(scale);
                    }
                    if params.interpolated_scale_aspect_ratio > 0.0 {
                        let next_scale = if last == params.num_layers - 1 {
                            1.0
                        } else {
                            calculate_scale(params.min_scale, params.max_scale, last + 1, params.num_layers)
                        };
                        scales.push((scale * next_scale).sqrt());
                        aspect_ratios.push(params.interpolated_scale_aspect_ratio);
                    }
                }

                last += 1;
            }

            let stride = params.strides[layer_id];
            let feature_map_w = (params.input_size_w as f32 / stride as f32).ceil() as usize;
            let feature_map_h = (params.input_size_h as f32 / stride as f32).ceil() as usize;

            for row in 0..feature_map_h {
                for col in 0..feature_map_w {
                    for (ratio, scale) in aspect_ratios.iter().zip(&scales) {
                        let x_center = (col as f32 + params.anchor_offset_x) / feature_map_w as f32;
                        let y_center = (row as f32 + params.anchor_offset_y) / feature_map_h as f32;

                        let (width, height) = if params.fixed_anchor_size {
                            (1.0, 1.0)
                        } else {
                            let ratio_sqrt = ratio.sqrt();
                            (scale * ratio_sqrt, scale / ratio_sqrt)
                        };

                        anchors.push(Rect::new(x_center, y_center, width, height, 0.0)?);
                    }
                }
            }

            layer_id = last;
        }

        Ok(Self { anchors })
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn get(&self, index: usize) -> Anchor {
        self.anchors[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.iter()
    }

    pub fn as_slice(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn x_centers(&self) -> Vec<f32> {
        self.anchors.iter().map(|a| a.x_center()).collect()
    }

    pub fn y_centers(&self) -> Vec<f32> {
        self.anchors.iter().map(|a| a.y_center()).collect()
    }

    pub fn widths(&self) -> Vec<f32> {
        self.anchors.iter().map(|a| a.width()).collect()
    }

    pub fn heights(&self) -> Vec<f32> {
        self.anchors.iter().map(|a| a.height()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_anchor_count_is_896() {
        let params = AnchorParams {
            num_layers: 4,
            min_scale: 0.1484375,
            max_scale: 0.75,
            input_size_w: 128,
            input_size_h: 128,
            strides: vec![8, 16, 16, 16],
            aspect_ratios: vec![1.0],
            anchor_offset_x: 0.5,
            anchor_offset_y: 0.5,
            fixed_anchor_size: true,
            reduce_boxes_in_lowest_layer: false,
            interpolated_scale_aspect_ratio: 1.0,
        };
        let anchors = Anchors::calculate(&params).unwrap();
        assert_eq!(anchors.len(), 896);
    }

    #[test]
    fn fixed_anchor_size_is_unit_square() {
        let params = AnchorParams { fixed_anchor_size: true, ..Default::default() };
        let anchors = Anchors::calculate(&params).unwrap();
        for anchor in anchors.iter() {
            assert_eq!(anchor.width(), 1.0);
            assert_eq!(anchor.height(), 1.0);
        }
    }

    #[test]
    fn single_layer_uses_min_scale_unmodified() {
        let params = AnchorParams {
            num_layers: 1,
            min_scale: 0.3,
            max_scale: 0.9,
            fixed_anchor_size: false,
            ..Default::default()
        };
        let anchors = Anchors::calculate(&params).unwrap();
        // aspect ratio 1.0 => width = height = scale.
        assert!((anchors.get(0).width() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn reduce_boxes_in_lowest_layer_emits_three_boxes_for_that_layer() {
        let params = AnchorParams {
            num_layers: 2,
            strides: vec![8, 16],
            min_scale: 0.2,
            max_scale: 0.8,
            input_size_w: 16,
            input_size_h: 16,
            reduce_boxes_in_lowest_layer: true,
            interpolated_scale_aspect_ratio: 0.0,
            ..Default::default()
        };
        let anchors = Anchors::calculate(&params).unwrap();
        // layer 0: stride 8 -> 2x2 feature map, 3 anchors/cell = 12
        // layer 1: stride 16 -> 1x1 feature map, 1 anchor/cell = 1
        assert_eq!(anchors.len(), 13);
    }

    #[test]
    fn rejects_mismatched_stride_count() {
        let params = AnchorParams { num_layers: 2, strides: vec![8], ..Default::default() };
        assert!(Anchors::calculate(&params).is_err());
    }
}
