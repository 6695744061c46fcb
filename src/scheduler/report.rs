use std::time::Duration;

use crate::depth::DistanceEstimate;
use crate::detect::Detection;
use crate::direction::Direction;
use crate::geometry::{Rect, Size};

/// What a background pass did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassKind {
    /// Detection on a fresh frame, optionally followed by ranging.
    Detection,
    /// Ranging only, over the latest frame and detections.
    Ranging,
}

/// One detection with its distance and direction.
#[derive(Clone, Debug)]
pub struct RangedDetection {
    /// Detection in crop space.
    pub detection: Detection,
    /// The detection box mapped into depth space.
    pub depth_location: Rect,
    /// `None` when no depth sample fell inside the box.
    pub estimate: Option<DistanceEstimate>,
    pub direction: Direction,
}

/// Result of a background pass, delivered to the interaction thread.
#[derive(Clone, Debug)]
pub struct PassReport {
    pub kind: PassKind,
    /// Sequence number of the frame the pass ran on.
    pub sequence: u64,
    pub preview_size: Size,
    pub crop_size: Size,
    /// Raw detector output in crop space.
    pub detections: Vec<Detection>,
    /// Detections above the tracking threshold, in preview space.
    pub tracked: Vec<Detection>,
    /// Detections above the speech threshold with their distances.
    pub ranged: Vec<RangedDetection>,
    pub inference_time: Duration,
    pub depth_time: Option<Duration>,
    /// Sentences handed to speech when the report was applied.
    pub utterances: Vec<String>,
}
