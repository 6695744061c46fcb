#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::depth::buffer::DepthBuffer;
use crate::depth::model::DepthModel;
use crate::geometry::Size;

/// Tract-based monocular depth model.
///
/// Input is NHWC `[1, height, width, 3]` float in `[0, 1]`; the first output
/// holds `height * width` depth values in row-major order.
pub struct TractDepthModel {
    model: TypedRunnableModel<TypedModel>,
    size: Size,
}

impl TractDepthModel {
    pub fn new<P: AsRef<Path>>(model_path: P, size: Size) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load depth model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, size.height as usize, size.width as usize, 3),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize depth model")?
            .into_runnable()
            .context("failed to build runnable depth model")?;
        log::info!("depth model loaded from {}", model_path.display());
        Ok(Self { model, size })
    }
}

impl DepthModel for TractDepthModel {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_size(&self) -> Size {
        self.size
    }

    fn infer(&mut self, input: &[f32], size: Size) -> Result<DepthBuffer> {
        if size != self.size {
            return Err(anyhow!(
                "input size {} does not match depth model {}",
                size,
                self.size
            ));
        }
        let tensor = tract_ndarray::Array4::from_shape_vec(
            (1, size.height as usize, size.width as usize, 3),
            input.to_vec(),
        )
        .context("depth input has the wrong length")?
        .into_tensor();
        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .context("depth inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("depth model produced no outputs"))?;
        let depth = output
            .to_array_view::<f32>()
            .context("depth output tensor was not f32")?;
        Ok(DepthBuffer::new(size, depth.iter().copied().collect()))
    }
}
