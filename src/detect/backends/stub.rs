use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::geometry::Size;

/// Stub backend for testing. Returns the same scripted detections for every
/// image and counts how often it ran.
pub struct StubBackend {
    input_size: Size,
    detections: Vec<Detection>,
    calls: Arc<AtomicUsize>,
}

impl StubBackend {
    pub fn new(input_size: Size, detections: Vec<Detection>) -> Self {
        Self {
            input_size,
            detections,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared counter of `recognize_image` calls, readable after the backend
    /// has moved to the worker.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn input_size(&self) -> Size {
        self.input_size
    }

    fn recognize_image(&mut self, pixels: &[u8], size: Size) -> Result<Vec<Detection>> {
        if size != self.input_size {
            return Err(anyhow!(
                "image size {} does not match detector input {}",
                size,
                self.input_size
            ));
        }
        if Some(pixels.len()) != size.rgb_len() {
            return Err(anyhow!("expected RGB image of {}", size));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.detections.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    #[test]
    fn stub_returns_script_and_counts() {
        let det = Detection::new("chair", 0.9, Rect::new(1.0, 2.0, 3.0, 4.0));
        let mut backend = StubBackend::new(Size::new(2, 2), vec![det.clone()]);
        let calls = backend.call_counter();

        let out = backend.recognize_image(&[0u8; 12], Size::new(2, 2)).unwrap();
        assert_eq!(out, vec![det]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(backend.recognize_image(&[0u8; 12], Size::new(3, 1)).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn runtime_hints_leave_results_unchanged() {
        let det = Detection::new("door", 0.8, Rect::new(0.0, 0.0, 1.0, 1.0));
        let mut backend = StubBackend::new(Size::new(2, 2), vec![det.clone()]);
        backend.set_thread_count(8);
        backend.set_acceleration_enabled(true);
        let out = backend.recognize_image(&[0u8; 12], Size::new(2, 2)).unwrap();
        assert_eq!(out, vec![det]);
    }
}
