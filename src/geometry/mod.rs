//! Coordinate spaces of the pipeline.
//!
//! Three pixel grids are in play for every frame:
//! - preview space: the camera frame as captured
//! - crop space: the detector input
//! - depth space: the depth model input and output
//!
//! `Transform` maps between two grids; `FrameGeometry` owns the set of
//! transforms derived for a session.

mod frame_geometry;
mod transform;
pub mod warp;

pub use frame_geometry::{FrameGeometry, GeometryParams};
pub use transform::{Rect, Rotation, Size, Transform};
