use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::geometry::{Rect, Size};

const DEFAULT_LUMA_THRESHOLD: u8 = 200;
const DEFAULT_MIN_AREA_FRACTION: f32 = 0.005;

/// CPU backend that reports the bounding box of the bright region of the
/// image as a single object.
///
/// Confidence is the fraction of the box covered by bright pixels, so a solid
/// blob scores near 1.0 and scattered highlights score low.
pub struct CpuBackend {
    input_size: Size,
    label: String,
    luma_threshold: u8,
    min_area_fraction: f32,
}

impl CpuBackend {
    pub fn new(input_size: Size, label: impl Into<String>) -> Self {
        Self {
            input_size,
            label: label.into(),
            luma_threshold: DEFAULT_LUMA_THRESHOLD,
            min_area_fraction: DEFAULT_MIN_AREA_FRACTION,
        }
    }

    /// Override the default brightness threshold.
    pub fn with_threshold(mut self, luma_threshold: u8) -> Self {
        self.luma_threshold = luma_threshold;
        self
    }
}

fn luma(rgb: &[u8]) -> u8 {
    let y = 0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32;
    y.round().clamp(0.0, 255.0) as u8
}

impl DetectorBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn input_size(&self) -> Size {
        self.input_size
    }

    fn recognize_image(&mut self, pixels: &[u8], size: Size) -> Result<Vec<Detection>> {
        let expected = size
            .rgb_len()
            .ok_or_else(|| anyhow!("image dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected,
                pixels.len()
            ));
        }

        let width = size.width as usize;
        let mut bright = 0usize;
        let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
        let (mut max_x, mut max_y) = (0usize, 0usize);
        for (i, rgb) in pixels.chunks_exact(3).enumerate() {
            if luma(rgb) < self.luma_threshold {
                continue;
            }
            let (x, y) = (i % width, i / width);
            bright += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        let area = expected / 3;
        if bright == 0 || (bright as f32) < self.min_area_fraction * area as f32 {
            return Ok(Vec::new());
        }

        let box_area = (max_x - min_x + 1) * (max_y - min_y + 1);
        let confidence = (bright as f32 / box_area as f32).clamp(0.0, 1.0);
        Ok(vec![Detection::new(
            self.label.clone(),
            confidence,
            Rect::new(
                min_x as f32,
                min_y as f32,
                (max_x + 1) as f32,
                (max_y + 1) as f32,
            ),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_with_block(size: Size, block: (usize, usize, usize, usize)) -> Vec<u8> {
        let (l, t, r, b) = block;
        let mut pixels = vec![20u8; size.rgb_len().unwrap()];
        for y in t..b {
            for x in l..r {
                let i = (y * size.width as usize + x) * 3;
                pixels[i..i + 3].copy_from_slice(&[250, 250, 250]);
            }
        }
        pixels
    }

    #[test]
    fn cpu_backend_boxes_bright_block() {
        let size = Size::new(40, 30);
        let mut backend = CpuBackend::new(size, "object");
        let out = backend
            .recognize_image(&image_with_block(size, (5, 10, 15, 20)), size)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].location, Rect::new(5.0, 10.0, 15.0, 20.0));
        assert_eq!(out[0].confidence, 1.0);
        assert_eq!(out[0].label, "object");
    }

    #[test]
    fn cpu_backend_ignores_dark_image() {
        let size = Size::new(8, 8);
        let mut backend = CpuBackend::new(size, "object");
        let out = backend
            .recognize_image(&vec![0u8; size.rgb_len().unwrap()], size)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn threshold_controls_what_counts_as_bright() {
        let size = Size::new(40, 30);
        let pixels = image_with_block(size, (5, 10, 15, 20));
        let mut strict = CpuBackend::new(size, "object").with_threshold(251);
        assert!(strict.recognize_image(&pixels, size).unwrap().is_empty());

        let mut lax = CpuBackend::new(size, "object").with_threshold(10);
        let out = lax.recognize_image(&pixels, size).unwrap();
        assert_eq!(out[0].location, Rect::new(0.0, 0.0, 40.0, 30.0));
    }
}
