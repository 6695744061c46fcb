use anyhow::Result;

use crate::depth::buffer::DepthBuffer;
use crate::geometry::Size;

/// Dense depth estimator seen by the pipeline.
///
/// `input` is interleaved RGB normalized to `[0, 1]` (see
/// `frame::normalize_rgb`), `width * height * 3` long.
pub trait DepthModel: Send {
    fn name(&self) -> &'static str;

    /// Resolution of both the model input and the depth map it returns.
    fn input_size(&self) -> Size;

    fn infer(&mut self, input: &[f32], size: Size) -> Result<DepthBuffer>;
}
