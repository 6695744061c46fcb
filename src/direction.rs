use crate::geometry::Rect;

/// Horizontal position of an object relative to the camera axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Center,
    Right,
}

/// Splits `[0, reference_width)` into thirds.
///
/// `center_x` must be measured in the same coordinate space as
/// `reference_width`; this is not checked.
pub fn classify(center_x: f32, reference_width: f32) -> Direction {
    if center_x <= reference_width / 3.0 {
        Direction::Left
    } else if center_x <= reference_width * 2.0 / 3.0 {
        Direction::Center
    } else {
        Direction::Right
    }
}

/// Classifies a box by its horizontal center.
pub fn classify_rect(rect: &Rect, reference_width: f32) -> Direction {
    classify(rect.center_x(), reference_width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirds_boundaries_are_inclusive_on_the_left() {
        assert_eq!(classify(0.0, 300.0), Direction::Left);
        assert_eq!(classify(100.0, 300.0), Direction::Left);
        assert_eq!(classify(100.5, 300.0), Direction::Center);
        assert_eq!(classify(200.0, 300.0), Direction::Center);
        assert_eq!(classify(200.5, 300.0), Direction::Right);
        assert_eq!(classify(299.0, 300.0), Direction::Right);
    }

    #[test]
    fn classification_is_monotonic() {
        let rank = |d: Direction| match d {
            Direction::Left => 0,
            Direction::Center => 1,
            Direction::Right => 2,
        };
        let mut last = 0;
        for x in 0..640 {
            let r = rank(classify(x as f32, 640.0));
            assert!(r >= last, "x={} went backwards", x);
            last = r;
        }
        assert_eq!(last, 2);
    }

    #[test]
    fn rect_center_drives_classification() {
        assert_eq!(
            classify_rect(&Rect::new(100.0, 100.0, 200.0, 200.0), 300.0),
            Direction::Center
        );
        assert_eq!(
            classify_rect(&Rect::new(0.0, 100.0, 10.0, 200.0), 300.0),
            Direction::Left
        );
    }
}
