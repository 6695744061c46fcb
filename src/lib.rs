//! Sightline
//!
//! Detection/depth fusion for spoken obstacle guidance: camera frames go
//! through an object detector, a depth model ranges the confident
//! detections, and each ranged object is announced as a sentence such as
//! "The chair is 1.25 meters in front of you."
//!
//! # Architecture
//!
//! 1. **Single flight**: at most one detection pass runs at a time. Frames
//!    that arrive meanwhile are released unprocessed, never queued.
//! 2. **Buffers go back**: every camera buffer (`FrameLease`) is returned to
//!    its source on every path.
//! 3. **One geometry snapshot per pass**: the preview/crop/depth transforms
//!    are derived once per session and replaced as a whole.
//!
//! # Module Structure
//!
//! - `geometry`: preview/crop/depth coordinate spaces and image warping
//! - `detect`: detector interface and backends
//! - `depth`: depth model interface, backends, per-box distance aggregation
//! - `direction`: left/center/right classification
//! - `scheduler`: single-flight detection scheduling and the worker thread
//! - `speech`: utterance formatting and speech sinks
//! - `frame`, `ingest`: camera frames and frame sources
//! - `config`, `ui`: session configuration and terminal reporting

pub mod config;
pub mod depth;
pub mod detect;
pub mod direction;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod scheduler;
pub mod speech;
pub mod ui;

pub use config::{PipelineConfig, SpeechEngine};
pub use depth::{DepthAggregator, DepthBuffer, DepthModel, DistanceEstimate};
pub use detect::{Detection, DetectorBackend};
pub use direction::Direction;
pub use frame::{FrameLease, RgbFrame};
pub use geometry::{FrameGeometry, GeometryParams, Rect, Rotation, Size, Transform};
pub use ingest::{FrameSource, SourceStats};
pub use scheduler::{
    DetectionScheduler, FrameDisposition, PassKind, PassReport, RangedDetection, SchedulerSettings,
    SchedulerState, SchedulerStats, TriggerOutcome,
};
pub use speech::{Annunciator, QueueMode, SpeechSink};
