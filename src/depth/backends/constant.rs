use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::depth::buffer::DepthBuffer;
use crate::depth::model::DepthModel;
use crate::geometry::Size;

/// Depth model stub that reports the same depth everywhere.
pub struct ConstantDepth {
    size: Size,
    value: f32,
    calls: Arc<AtomicUsize>,
}

impl ConstantDepth {
    pub fn new(size: Size, value: f32) -> Self {
        Self {
            size,
            value,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of `infer` calls.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl DepthModel for ConstantDepth {
    fn name(&self) -> &'static str {
        "constant"
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
        if Some(input.len()) != size.rgb_len() {
            return Err(anyhow!(
                "expected {} input values, received {}",
                size.rgb_len().unwrap_or(0),
                input.len()
            ));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(DepthBuffer::filled(self.size, self.value))
    }
}
