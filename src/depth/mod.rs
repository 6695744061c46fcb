//! Depth side of the pipeline: the external depth model interface and the
//! aggregation of a depth map into per-box distances.

mod aggregate;
mod backends;
mod buffer;
mod model;

pub use aggregate::{DepthAggregator, DistanceEstimate, DEFAULT_DEPTH_DIVISOR};
pub use backends::ConstantDepth;
#[cfg(feature = "backend-tract")]
pub use backends::TractDepthModel;
pub use buffer::DepthBuffer;
pub use model::DepthModel;
