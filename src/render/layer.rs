use std::path::Path;

use anyhow::Context as _;
use image::RgbaImage;

use crate::foundation::{
    color::{Rgba8, mul_div255},
    error::{CoverError, CoverResult},
};

/// A pixel buffer in row-major premultiplied RGBA8, the working format of
/// the whole pipeline. Straight alpha only exists at the image-file
/// boundaries (decode and PNG encode).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Layer {
    /// Fully transparent layer. Zero-sized layers are legal no-op layers.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn filled(width: u32, height: u32, color: Rgba8) -> Self {
        let px = color.to_premul();
        let mut data = Vec::with_capacity((width as usize) * (height as usize) * 4);
        for _ in 0..(width as usize) * (height as usize) {
            data.extend_from_slice(&px);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Ingest a straight-alpha image, premultiplying in place.
    pub fn from_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let mut data = image.into_raw();
        for px in data.chunks_exact_mut(4) {
            let a = px[3] as u16;
            if a == 0 {
                px[0] = 0;
                px[1] = 0;
                px[2] = 0;
                continue;
            }
            px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
            px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
            px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Decode an image file into a premultiplied layer.
    pub fn decode_file(path: &Path) -> CoverResult<Self> {
        let dyn_img = image::open(path)
            .map_err(|e| CoverError::asset(format!("decode image '{}': {e}", path.display())))?;
        Ok(Self::from_image(dyn_img.to_rgba8()))
    }

    /// Un-premultiply back to a straight-alpha image for encoding.
    pub fn into_image(self) -> RgbaImage {
        let mut data = self.data;
        for px in data.chunks_exact_mut(4) {
            let a = px[3] as u16;
            if a == 0 || a == 255 {
                continue;
            }
            for c in px.iter_mut().take(3) {
                *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
            }
        }
        RgbaImage::from_raw(self.width, self.height, data)
            .expect("layer buffer matches its dimensions")
    }

    pub fn save_png(self, path: &Path) -> CoverResult<()> {
        let image = self.into_image();
        image::save_buffer_with_format(
            path,
            image.as_raw(),
            image.width(),
            image.height(),
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }

    pub fn get(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }

    pub fn put(&mut self, x: u32, y: u32, px: [u8; 4]) {
        let idx = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        self.data[idx..idx + 4].copy_from_slice(&px);
    }

    /// Source-over composite `src` onto `self` with its top-left corner at
    /// `(dx, dy)`. Off-canvas regions are clipped.
    pub fn composite_over(&mut self, src: &Layer, dx: i64, dy: i64) {
        if src.is_empty() || self.is_empty() {
            return;
        }
        for sy in 0..src.height {
            let ty = dy + i64::from(sy);
            if ty < 0 || ty >= i64::from(self.height) {
                continue;
            }
            for sx in 0..src.width {
                let tx = dx + i64::from(sx);
                if tx < 0 || tx >= i64::from(self.width) {
                    continue;
                }
                let s = src.get(sx, sy);
                if s[3] == 0 {
                    continue;
                }
                let d = self.get(tx as u32, ty as u32);
                self.put(tx as u32, ty as u32, over(d, s));
            }
        }
    }

    /// Uniform opacity multiply across all four channels (valid in premul).
    pub fn apply_opacity(&mut self, opacity: f32) {
        let op = ((opacity.clamp(0.0, 1.0) * 255.0).round() as i32).clamp(0, 255) as u16;
        if op == 255 {
            return;
        }
        for c in &mut self.data {
            *c = mul_div255(u16::from(*c), op);
        }
    }

    /// Multiply all channels by a single-channel coverage mask of the same
    /// dimensions.
    pub fn apply_mask(&mut self, mask: &[u8]) -> CoverResult<()> {
        if mask.len() != (self.width as usize) * (self.height as usize) {
            return Err(CoverError::asset(
                "mask dimensions do not match layer dimensions",
            ));
        }
        for (px, &m) in self.data.chunks_exact_mut(4).zip(mask.iter()) {
            if m == 255 {
                continue;
            }
            for c in px.iter_mut() {
                *c = mul_div255(u16::from(*c), u16::from(m));
            }
        }
        Ok(())
    }

    /// Lanczos3 resample to the given size; zero targets yield an empty
    /// layer.
    pub fn resize_lanczos(&self, width: u32, height: u32) -> Self {
        if width == 0 || height == 0 || self.is_empty() {
            return Self::new(width, height);
        }
        let src = RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .expect("layer buffer matches its dimensions");
        let resized =
            image::imageops::resize(&src, width, height, image::imageops::FilterType::Lanczos3);
        Self {
            width,
            height,
            data: resized.into_raw(),
        }
    }

    /// Copy out a sub-rectangle; the rectangle is clamped to the layer.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Self {
        if self.is_empty() || x >= self.width || y >= self.height {
            return Self::new(0, 0);
        }
        let width = width.min(self.width - x);
        let height = height.min(self.height - y);
        let src = RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .expect("layer buffer matches its dimensions");
        let cropped = image::imageops::crop_imm(&src, x, y, width, height).to_image();
        Self {
            width,
            height,
            data: cropped.into_raw(),
        }
    }
}

/// Premultiplied source-over blend of a single pixel.
pub fn over(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    if src[3] == 255 {
        return src;
    }
    if src[3] == 0 {
        return dst;
    }
    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255(u16::from(dst[i]), inv));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_src_opaque_replaces_dst() {
        let dst = [0, 0, 0, 255];
        let src = [255, 0, 0, 255];
        assert_eq!(over(dst, src), src);
    }

    #[test]
    fn over_src_transparent_is_noop() {
        let dst = [10, 20, 30, 40];
        assert_eq!(over(dst, [0, 0, 0, 0]), dst);
    }

    #[test]
    fn over_dst_transparent_returns_src() {
        let src = [100, 110, 120, 200];
        assert_eq!(over([0, 0, 0, 0], src), src);
    }

    #[test]
    fn composite_clips_out_of_bounds() {
        let mut dst = Layer::new(4, 4);
        let src = Layer::filled(4, 4, Rgba8::new(255, 0, 0, 255));
        dst.composite_over(&src, -2, -2);
        assert_eq!(dst.get(0, 0)[3], 255);
        assert_eq!(dst.get(2, 2)[3], 0);
    }

    #[test]
    fn premul_roundtrip_preserves_opaque_pixels() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([12, 34, 56, 255]));
        img.put_pixel(1, 0, image::Rgba([200, 100, 50, 128]));
        let layer = Layer::from_image(img.clone());
        let back = layer.into_image();
        assert_eq!(back.get_pixel(0, 0), img.get_pixel(0, 0));
        // Half-transparent pixels survive within rounding error.
        let px = back.get_pixel(1, 0);
        assert!((i32::from(px[0]) - 200).abs() <= 1);
        assert_eq!(px[3], 128);
    }

    #[test]
    fn mask_multiplies_coverage() {
        let mut layer = Layer::filled(2, 1, Rgba8::new(255, 255, 255, 255));
        layer.apply_mask(&[255, 0]).unwrap();
        assert_eq!(layer.get(0, 0), [255, 255, 255, 255]);
        assert_eq!(layer.get(1, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn crop_clamps_to_bounds() {
        let layer = Layer::filled(4, 4, Rgba8::new(0, 255, 0, 255));
        let cropped = layer.crop(2, 2, 10, 10);
        assert_eq!((cropped.width, cropped.height), (2, 2));
        let empty = layer.crop(5, 0, 1, 1);
        assert!(empty.is_empty());
    }
}
