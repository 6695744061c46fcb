use crate::geometry::Rect;

/// One object reported by a detector.
///
/// `location` is in whatever space the producer works in: crop space as
/// returned by a detector, preview space once remapped for tracking.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub location: Rect,
    pub label: String,
    /// 0.0..=1.0
    pub confidence: f32,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, location: Rect) -> Self {
        Self {
            location,
            label: label.into(),
            confidence,
        }
    }

    /// Same detection with its box replaced.
    pub fn with_location(&self, location: Rect) -> Self {
        Self {
            location,
            label: self.label.clone(),
            confidence: self.confidence,
        }
    }

    pub fn meets(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }
}
