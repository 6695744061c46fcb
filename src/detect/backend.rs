use anyhow::Result;

use crate::detect::result::Detection;
use crate::geometry::Size;

/// Object detector seen by the pipeline: crop-space image in, crop-space
/// boxes out.
///
/// Implementations are moved onto the detection worker thread and only ever
/// called from there.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Resolution the detector expects (the crop size).
    fn input_size(&self) -> Size;

    /// Run detection on an interleaved RGB image of `input_size()`.
    ///
    /// Boxes are returned in the pixel coordinates of the input image.
    fn recognize_image(&mut self, pixels: &[u8], size: Size) -> Result<Vec<Detection>>;

    /// Hint for the number of inference threads. Backends may ignore it.
    fn set_thread_count(&mut self, _threads: usize) {}

    /// Hint to enable hardware acceleration. Backends may ignore it.
    fn set_acceleration_enabled(&mut self, _enabled: bool) {}

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
