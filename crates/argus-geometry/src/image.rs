//! The pixel buffer used to build a model's input tensor, and the bilinear affine sampler that
//! fills it from a source image given a [`Matrix`](crate::transform::Matrix).

use image::{GenericImageView, Rgb, RgbImage};

use crate::transform::Matrix;

/// An 8-bit RGB image buffer.
///
/// This is a thin wrapper over [`image::RgbImage`]; decoding image files into one is out of
/// scope for this crate (that's handled upstream, e.g. by a camera or file-decoding frontend)
/// and is left to the `image` crate's own codecs or to the caller.
#[derive(Debug, Clone)]
pub struct Image {
    buf: RgbImage,
}

impl Image {
    pub fn new(width: u32, height: u32) -> Self {
        Self { buf: RgbImage::new(width, height) }
    }

    pub fn from_buffer(buf: RgbImage) -> Self {
        Self { buf }
    }

    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    pub fn as_buffer(&self) -> &RgbImage {
        &self.buf
    }

    /// Reads a single pixel's channels without exposing the `image` crate's own pixel type to
    /// callers that only want plain bytes (e.g. when building a model input tensor).
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let Rgb(p) = *self.buf.get_pixel(x, y);
        p
    }

    /// Samples a pixel at (possibly fractional) image coordinates using bilinear interpolation.
    /// Coordinates outside the image bounds contribute a black (zero) border instead of being
    /// clamped, matching how model input tensors are conventionally padded.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> [f32; 3] {
        let (w, h) = (self.buf.width() as i64, self.buf.height() as i64);
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let x0 = x0 as i64;
        let y0 = y0 as i64;

        let at = |xi: i64, yi: i64| -> [f32; 3] {
            if xi < 0 || yi < 0 || xi >= w || yi >= h {
                [0.0; 3]
            } else {
                let Rgb(p) = *self.buf.get_pixel(xi as u32, yi as u32);
                [p[0] as f32, p[1] as f32, p[2] as f32]
            }
        };

        let tl = at(x0, y0);
        let tr = at(x0 + 1, y0);
        let bl = at(x0, y0 + 1);
        let br = at(x0 + 1, y0 + 1);

        let mut out = [0.0; 3];
        for c in 0..3 {
            let top = tl[c] * (1.0 - fx) + tr[c] * fx;
            let bottom = bl[c] * (1.0 - fx) + br[c] * fx;
            out[c] = top * (1.0 - fy) + bottom * fy;
        }
        out
    }

    /// Resamples this image into a `target_size`-shaped tensor by mapping each output pixel
    /// through `matrix` (normalized output coordinates to normalized input coordinates) and
    /// bilinearly sampling the source at the resulting location. Pixels that land outside the
    /// source image sample as zero (the matrix is expected to already encode any ROI crop,
    /// rotation, and letterbox padding).
    pub fn sample_affine(&self, matrix: &Matrix, target_size: (u32, u32)) -> Image {
        let (tw, th) = target_size;
        let (sw, sh) = (self.buf.width() as f32, self.buf.height() as f32);
        let mut out = RgbImage::new(tw, th);

        for py in 0..th {
            for px in 0..tw {
                let u = (px as f32 + 0.5) / tw as f32;
                let v = (py as f32 + 0.5) / th as f32;
                let (nx, ny) = matrix.apply(u, v);
                let sample = self.sample_bilinear(nx * sw, ny * sh);
                out.put_pixel(px, py, Rgb([sample[0] as u8, sample[1] as u8, sample[2] as u8]));
            }
        }

        Image { buf: out }
    }
}

/// A read-only view over a rectangular region of pixels, analogous to [`image::SubImage`].
pub trait AsImageView {
    fn as_image_view(&self) -> &RgbImage;
}

impl AsImageView for Image {
    fn as_image_view(&self) -> &RgbImage {
        &self.buf
    }
}
