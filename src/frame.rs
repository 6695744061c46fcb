//! Camera frames.
//!
//! - `FrameLease`: a camera-owned buffer handed to the pipeline. It MUST go
//!   back to the camera, or the camera runs out of buffers and stalls. The
//!   lease returns itself on drop, so every exit path releases it.
//! - `RgbFrame`: an owned copy of the pixels, safe to move into a background
//!   pass while the camera reuses its buffer.

use anyhow::{anyhow, Result};
use std::time::Instant;

use crate::geometry::Size;

type ReleaseFn = Box<dyn FnOnce(Vec<u8>) + Send>;

// ----------------------------------------------------------------------------
// RgbFrame: owned pixel copy
// ----------------------------------------------------------------------------

/// Interleaved 8-bit RGB frame owned by the pipeline.
///
/// Deliberately not `Clone`: a frame is moved (or shared behind an `Arc`)
/// into the pass that consumes it.
#[derive(Debug)]
pub struct RgbFrame {
    data: Vec<u8>,
    size: Size,
    sequence: u64,
    captured_at: Instant,
}

impl RgbFrame {
    pub fn new(data: Vec<u8>, size: Size, sequence: u64) -> Result<Self> {
        validate_rgb_len(data.len(), size)?;
        Ok(Self {
            data,
            size,
            sequence,
            captured_at: Instant::now(),
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// Monotonic frame counter assigned by the source.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn age(&self) -> std::time::Duration {
        self.captured_at.elapsed()
    }
}

pub(crate) fn validate_rgb_len(len: usize, size: Size) -> Result<()> {
    let expected = size
        .rgb_len()
        .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))?;
    if len != expected {
        return Err(anyhow!(
            "RGB frame length mismatch: expected {}, got {}",
            expected,
            len
        ));
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// FrameLease: camera buffer on loan
// ----------------------------------------------------------------------------

/// A frame buffer on loan from a frame source.
///
/// Dropping the lease hands the buffer back to its source. There is no way
/// to keep the buffer: the pipeline copies what it needs with `to_frame`.
pub struct FrameLease {
    buffer: Option<Vec<u8>>,
    size: Size,
    sequence: u64,
    release: Option<ReleaseFn>,
}

impl FrameLease {
    /// Wraps a source buffer. `release` receives the buffer back when the
    /// lease ends.
    pub fn new<F>(buffer: Vec<u8>, size: Size, sequence: u64, release: F) -> Result<Self>
    where
        F: FnOnce(Vec<u8>) + Send + 'static,
    {
        validate_rgb_len(buffer.len(), size)?;
        Ok(Self {
            buffer: Some(buffer),
            size,
            sequence,
            release: Some(Box::new(release)),
        })
    }

    /// A lease over a buffer nobody needs back.
    pub fn detached(buffer: Vec<u8>, size: Size, sequence: u64) -> Result<Self> {
        Self::new(buffer, size, sequence, |_| {})
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn pixels(&self) -> &[u8] {
        self.buffer.as_deref().unwrap_or(&[])
    }

    /// Copies the pixels out so the buffer can be released immediately.
    pub fn to_frame(&self) -> Result<RgbFrame> {
        RgbFrame::new(self.pixels().to_vec(), self.size, self.sequence)
    }

    /// Ends the lease now. Equivalent to dropping it.
    pub fn release(self) {}
}

impl std::fmt::Debug for FrameLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLease")
            .field("size", &self.size)
            .field("sequence", &self.sequence)
            .finish()
    }
}

impl Drop for FrameLease {
    fn drop(&mut self) {
        if let (Some(buffer), Some(release)) = (self.buffer.take(), self.release.take()) {
            release(buffer);
        }
    }
}

/// Flattens RGB bytes into `channel / 255.0` floats, interleaved, for models
/// that take normalized input.
pub fn normalize_rgb(pixels: &[u8]) -> Vec<f32> {
    pixels.iter().map(|&p| p as f32 / 255.0).collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn lease_releases_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let lease = FrameLease::new(vec![0u8; 12], Size::new(2, 2), 1, move |buf| {
            assert_eq!(buf.len(), 12);
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        let frame = lease.to_frame().unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 0);
        drop(lease);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(frame.pixels().len(), 12);
        assert_eq!(frame.sequence(), 1);
    }

    #[test]
    fn explicit_release_runs_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let lease = FrameLease::new(vec![0u8; 3], Size::new(1, 1), 7, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        lease.release();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn frame_rejects_wrong_length() {
        assert!(RgbFrame::new(vec![0u8; 10], Size::new(2, 2), 0).is_err());
        assert!(FrameLease::detached(vec![0u8; 11], Size::new(2, 2), 0).is_err());
    }

    #[test]
    fn normalize_scales_to_unit_range() {
        assert_eq!(normalize_rgb(&[0, 255, 51]), vec![0.0, 1.0, 0.2]);
    }
}
