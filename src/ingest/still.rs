//! Repeats one decoded image as a camera feed.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{FrameSource, SourceStats};
use crate::frame::FrameLease;
use crate::geometry::Size;

pub struct StillImageSource {
    path: PathBuf,
    pixels: Vec<u8>,
    size: Size,
    frame_count: u64,
    outstanding: Arc<AtomicUsize>,
}

impl StillImageSource {
    /// Decodes `path` and resizes it to `preview` if needed.
    pub fn open<P: AsRef<Path>>(path: P, preview: Size) -> Result<Self> {
        let path = path.as_ref();
        let decoded = image::open(path)
            .with_context(|| format!("failed to decode image {}", path.display()))?
            .to_rgb8();
        let rgb = if decoded.dimensions() == (preview.width, preview.height) {
            decoded
        } else {
            log::info!(
                "resizing {} from {}x{} to {}",
                path.display(),
                decoded.width(),
                decoded.height(),
                preview
            );
            image::imageops::resize(&decoded, preview.width, preview.height, FilterType::Triangle)
        };
        Ok(Self {
            path: path.to_path_buf(),
            pixels: rgb.into_raw(),
            size: preview,
            frame_count: 0,
            outstanding: Arc::new(AtomicUsize::new(0)),
        })
    }
}

impl FrameSource for StillImageSource {
    fn next_frame(&mut self) -> Result<FrameLease> {
        self.frame_count += 1;
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let outstanding = self.outstanding.clone();
        FrameLease::new(self.pixels.clone(), self.size, self.frame_count, move |_| {
            outstanding.fetch_sub(1, Ordering::SeqCst);
        })
    }

    fn preview_size(&self) -> Size {
        self.size
    }

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            buffers_outstanding: self.outstanding.load(Ordering::SeqCst),
            description: format!("still image {}", self.path.display()),
        }
    }
}
