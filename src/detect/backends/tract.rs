#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::geometry::{Rect, Size};

/// Tract-based SSD-style detector for ONNX models.
///
/// Expects an NCHW float input in `[0, 1]` and three outputs:
/// boxes `[1, N, 4]` as normalized `(ymin, xmin, ymax, xmax)`, class indices
/// `[1, N]` and scores `[1, N]`. Class indices resolve through a label map
/// file with one label per line.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    labels: Vec<String>,
    input_size: Size,
}

impl TractBackend {
    /// Load an ONNX model and its label map from disk.
    pub fn new<P: AsRef<Path>, L: AsRef<Path>>(
        model_path: P,
        labels_path: L,
        input_size: Size,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let labels_path = labels_path.as_ref();
        let labels = std::fs::read_to_string(labels_path)
            .with_context(|| format!("failed to read label map {}", labels_path.display()))?
            .lines()
            .map(|line| line.trim().to_string())
            .collect::<Vec<_>>();

        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_size.height as usize, input_size.width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "detector model loaded from {} ({} labels)",
            model_path.display(),
            labels.len()
        );

        Ok(Self {
            model,
            labels,
            input_size,
        })
    }

    fn build_input(&self, pixels: &[u8], size: Size) -> Result<Tensor> {
        if size != self.input_size {
            return Err(anyhow!(
                "image size {} does not match model input {}",
                size,
                self.input_size
            ));
        }
        let expected_len = size
            .rgb_len()
            .ok_or_else(|| anyhow!("image dimensions overflow"))?;
        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let width = size.width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, size.height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );
        Ok(input.into_tensor())
    }

    fn label_for(&self, class: f32) -> String {
        let idx = class.max(0.0) as usize;
        self.labels
            .get(idx)
            .filter(|label| !label.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("class {}", idx))
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_size(&self) -> Size {
        self.input_size
    }

    fn recognize_image(&mut self, pixels: &[u8], size: Size) -> Result<Vec<Detection>> {
        let input = self.build_input(pixels, size)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        if outputs.len() < 3 {
            return Err(anyhow!(
                "detector produced {} outputs, expected boxes, classes and scores",
                outputs.len()
            ));
        }
        let boxes = outputs[0]
            .to_array_view::<f32>()
            .context("box tensor was not f32")?;
        let classes = outputs[1]
            .to_array_view::<f32>()
            .context("class tensor was not f32")?;
        let scores = outputs[2]
            .to_array_view::<f32>()
            .context("score tensor was not f32")?;

        let boxes: Vec<f32> = boxes.iter().copied().collect();
        let classes: Vec<f32> = classes.iter().copied().collect();
        let scores: Vec<f32> = scores.iter().copied().collect();
        let count = scores.len().min(classes.len()).min(boxes.len() / 4);

        let w = size.width as f32;
        let h = size.height as f32;
        let detections = (0..count)
            .map(|i| {
                let b = &boxes[i * 4..i * 4 + 4];
                Detection::new(
                    self.label_for(classes[i]),
                    scores[i].clamp(0.0, 1.0),
                    Rect::new(b[1] * w, b[0] * h, b[3] * w, b[2] * h),
                )
            })
            .collect();
        Ok(detections)
    }

    fn set_thread_count(&mut self, threads: usize) {
        // tract plans run on the calling thread.
        log::debug!("tract detector ignores thread hint {}", threads);
    }
}
