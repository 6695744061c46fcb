//! Frame ingestion sources.
//!
//! A source stands in for the camera: it owns a set of frame buffers and
//! loans them out as `FrameLease`s. A lease that is never released keeps its
//! buffer away from the source, so a pipeline that leaks leases eventually
//! starves the source.
//!
//! - `SyntheticSource`: generated scene with a moving bright object
//! - `StillImageSource`: one decoded image repeated (feature: ingest-image)

#[cfg(feature = "ingest-image")]
pub mod still;
pub mod synthetic;

use anyhow::Result;

use crate::frame::FrameLease;
use crate::geometry::Size;

#[cfg(feature = "ingest-image")]
pub use still::StillImageSource;
pub use synthetic::{SyntheticConfig, SyntheticSource};

pub trait FrameSource {
    /// Loans out the next frame.
    fn next_frame(&mut self) -> Result<FrameLease>;

    /// Size of every frame this source produces.
    fn preview_size(&self) -> Size;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    /// Leases handed out and not yet released.
    pub buffers_outstanding: usize,
    pub description: String,
}
