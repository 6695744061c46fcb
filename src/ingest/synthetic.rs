//! Generated camera for demos and tests.
//!
//! Frames show a dim gradient with a little sensor noise and one bright
//! block that sweeps left to right, so the bright-region detector has
//! something to find in every third of the view.

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};

use super::{FrameSource, SourceStats};
use crate::frame::FrameLease;
use crate::geometry::Size;

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub size: Size,
    /// Buffers the "camera" owns. Once all are on loan, capture fails.
    pub pool_size: usize,
    /// Horizontal block movement per frame, in pixels.
    pub step: u32,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            size: Size::new(640, 480),
            pool_size: 3,
            step: 8,
            seed: 0x5eed,
        }
    }
}

#[derive(Debug)]
struct BufferPool {
    free: Vec<Vec<u8>>,
    outstanding: usize,
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    pool: Arc<Mutex<BufferPool>>,
    rng: StdRng,
    frame_count: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        let len = config
            .size
            .rgb_len()
            .filter(|len| *len > 0)
            .ok_or_else(|| anyhow!("invalid synthetic frame size {}", config.size))?;
        if config.pool_size == 0 {
            return Err(anyhow!("synthetic source needs at least one buffer"));
        }
        let free = (0..config.pool_size).map(|_| vec![0u8; len]).collect();
        log::info!(
            "SyntheticSource: {} frames, {} buffers",
            config.size,
            config.pool_size
        );
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            pool: Arc::new(Mutex::new(BufferPool {
                free,
                outstanding: 0,
            })),
            config,
            frame_count: 0,
        })
    }

    /// Horizontal pixel range of the bright block in frame `frame`.
    pub fn block_span(&self, frame: u64) -> (u32, u32) {
        let Size { width, .. } = self.config.size;
        let block_w = (width / 5).max(1);
        let travel = u64::from(width.saturating_sub(block_w).max(1));
        let left = ((frame * u64::from(self.config.step)) % travel) as u32;
        (left, left + block_w)
    }

    fn render(&mut self, buffer: &mut [u8]) {
        let Size { width, height } = self.config.size;
        let (block_left, block_right) = self.block_span(self.frame_count);
        let block_top = height / 3;
        let block_bottom = block_top + (height / 4).max(1);

        for y in 0..height {
            for x in 0..width {
                let i = ((y * width + x) * 3) as usize;
                let in_block =
                    x >= block_left && x < block_right && y >= block_top && y < block_bottom;
                let value = if in_block {
                    255 - self.rng.gen_range(0..8u8)
                } else {
                    let shade = (x * 64 / width.max(1) + y * 32 / height.max(1)) as u8;
                    shade + self.rng.gen_range(0..8u8)
                };
                buffer[i..i + 3].fill(value);
            }
        }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<FrameLease> {
        let mut buffer = {
            let mut pool = self
                .pool
                .lock()
                .map_err(|_| anyhow!("synthetic buffer pool poisoned"))?;
            let buffer = pool.free.pop().ok_or_else(|| {
                anyhow!(
                    "camera stalled: all {} buffers are still on loan",
                    self.config.pool_size
                )
            })?;
            pool.outstanding += 1;
            buffer
        };

        self.frame_count += 1;
        self.render(&mut buffer);

        let pool = self.pool.clone();
        FrameLease::new(buffer, self.config.size, self.frame_count, move |buffer| {
            if let Ok(mut pool) = pool.lock() {
                pool.outstanding = pool.outstanding.saturating_sub(1);
                pool.free.push(buffer);
            }
        })
    }

    fn preview_size(&self) -> Size {
        self.config.size
    }

    fn is_healthy(&self) -> bool {
        self.pool
            .lock()
            .map(|pool| !pool.free.is_empty())
            .unwrap_or(false)
    }

    fn stats(&self) -> SourceStats {
        let outstanding = self.pool.lock().map(|pool| pool.outstanding).unwrap_or(0);
        SourceStats {
            frames_captured: self.frame_count,
            buffers_outstanding: outstanding,
            description: format!("synthetic {}", self.config.size),
        }
    }
}
