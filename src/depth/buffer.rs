use crate::geometry::Size;

/// Dense row-major depth map as produced by a depth model.
///
/// The data length is not forced to `width * height`; readers bound every
/// index against the actual length.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthBuffer {
    size: Size,
    data: Vec<f32>,
}

impl DepthBuffer {
    pub fn new(size: Size, data: Vec<f32>) -> Self {
        if Some(data.len()) != size.area() {
            log::debug!(
                "depth buffer of {} holds {} samples",
                size,
                data.len()
            );
        }
        Self { size, data }
    }

    /// Buffer with every sample set to `value`.
    pub fn filled(size: Size, value: f32) -> Self {
        Self {
            size,
            data: vec![value; size.area().unwrap_or(0)],
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}
