use crate::depth::buffer::DepthBuffer;
use crate::geometry::Rect;

/// Default divisor turning raw depth-network units into meters.
pub const DEFAULT_DEPTH_DIVISOR: f64 = 8.0;

/// Distance derived from the depth samples under one box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceEstimate {
    /// Mean raw depth over the contributing samples.
    pub mean_depth: f64,
    /// Number of samples that contributed.
    pub sample_count: usize,
    /// `mean_depth / divisor`.
    pub meters: f64,
}

/// Averages depth samples under a rectangle expressed in depth space.
#[derive(Clone, Copy, Debug)]
pub struct DepthAggregator {
    divisor: f64,
}

impl Default for DepthAggregator {
    fn default() -> Self {
        Self {
            divisor: DEFAULT_DEPTH_DIVISOR,
        }
    }
}

impl DepthAggregator {
    /// `divisor` must be finite and non-zero; configuration validates it.
    pub fn new(divisor: f64) -> Self {
        Self { divisor }
    }

    pub fn divisor(&self) -> f64 {
        self.divisor
    }

    /// Mean depth over integer pixels `left <= x < right`, `top <= y < bottom`.
    ///
    /// Pixels outside the grid are left out of both the sum and the count,
    /// so a box hanging off the frame is averaged over its visible part only.
    /// An in-grid pixel past the end of a short buffer still counts but adds
    /// nothing to the sum. Returns `None` when no in-grid pixel remains.
    pub fn estimate_distance(&self, buffer: &DepthBuffer, rect: &Rect) -> Option<DistanceEstimate> {
        let width = buffer.width() as i64;
        let height = buffer.height() as i64;
        let data = buffer.data();

        // Truncation toward zero matches integer pixel addressing of the box.
        let x0 = (rect.left as i64).max(0);
        let x1 = (rect.right as i64).min(width);
        let y0 = (rect.top as i64).max(0);
        let y1 = (rect.bottom as i64).min(height);

        let mut sum = 0.0f64;
        let mut count = 0usize;
        for y in y0..y1 {
            let row = y * width;
            for x in x0..x1 {
                count += 1;
                if let Some(&sample) = data.get((row + x) as usize) {
                    sum += sample as f64;
                }
            }
        }

        if count == 0 {
            return None;
        }
        let mean_depth = sum / count as f64;
        let meters = mean_depth / self.divisor;
        if !meters.is_finite() {
            return None;
        }
        Some(DistanceEstimate {
            mean_depth,
            sample_count: count,
            meters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;

    fn column_ramp(size: Size) -> DepthBuffer {
        let mut data = Vec::with_capacity(size.area().unwrap());
        for _y in 0..size.height {
            for x in 0..size.width {
                data.push(x as f32);
            }
        }
        DepthBuffer::new(size, data)
    }

    #[test]
    fn constant_buffer_yields_scaled_value() {
        let buffer = DepthBuffer::filled(Size::new(640, 448), 80.0);
        let estimate = DepthAggregator::default()
            .estimate_distance(&buffer, &Rect::new(100.0, 100.0, 200.0, 200.0))
            .unwrap();
        assert_eq!(estimate.sample_count, 100 * 100);
        assert!((estimate.mean_depth - 80.0).abs() < 1e-9);
        assert!((estimate.meters - 10.0).abs() < 1e-9);
    }

    #[test]
    fn right_edge_columns_are_excluded() {
        let buffer = column_ramp(Size::new(640, 448));
        let estimate = DepthAggregator::new(1.0)
            .estimate_distance(&buffer, &Rect::new(600.0, 0.0, 700.0, 10.0))
            .unwrap();
        // Only columns 600..640 remain: mean of 600..=639.
        assert_eq!(estimate.sample_count, 40 * 10);
        assert!((estimate.mean_depth - 619.5).abs() < 1e-9);
    }

    #[test]
    fn negative_origin_is_clipped() {
        let buffer = column_ramp(Size::new(10, 10));
        let estimate = DepthAggregator::new(1.0)
            .estimate_distance(&buffer, &Rect::new(-5.0, -5.0, 2.0, 2.0))
            .unwrap();
        assert_eq!(estimate.sample_count, 4);
        assert!((estimate.mean_depth - 0.5).abs() < 1e-9);
    }

    #[test]
    fn box_outside_buffer_fails() {
        let buffer = DepthBuffer::filled(Size::new(64, 48), 5.0);
        let aggregator = DepthAggregator::default();
        assert!(aggregator
            .estimate_distance(&buffer, &Rect::new(100.0, 10.0, 120.0, 20.0))
            .is_none());
        assert!(aggregator
            .estimate_distance(&buffer, &Rect::new(-30.0, -30.0, -1.0, -1.0))
            .is_none());
    }

    #[test]
    fn degenerate_box_fails() {
        let buffer = DepthBuffer::filled(Size::new(64, 48), 5.0);
        assert!(DepthAggregator::default()
            .estimate_distance(&buffer, &Rect::new(10.0, 10.0, 10.0, 30.0))
            .is_none());
    }

    #[test]
    fn missing_samples_of_short_buffer_count_as_zero() {
        // Grid claims 4x4 but only the first row exists.
        let buffer = DepthBuffer::new(Size::new(4, 4), vec![2.0; 4]);
        let aggregator = DepthAggregator::new(1.0);

        let whole = aggregator
            .estimate_distance(&buffer, &Rect::new(0.0, 0.0, 4.0, 4.0))
            .unwrap();
        assert_eq!(whole.sample_count, 16);
        assert!((whole.mean_depth - 0.5).abs() < 1e-9);

        let missing = aggregator
            .estimate_distance(&buffer, &Rect::new(0.0, 2.0, 4.0, 4.0))
            .unwrap();
        assert_eq!(missing.sample_count, 8);
        assert_eq!(missing.mean_depth, 0.0);
        assert_eq!(missing.meters, 0.0);
    }
}
