use anyhow::{Context, Result};

use super::transform::{Rect, Rotation, Size, Transform};

/// Inputs that determine every transform of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeometryParams {
    /// Camera preview resolution.
    pub preview: Size,
    /// Detector input resolution.
    pub crop: Size,
    /// Depth model input/output resolution.
    pub depth: Size,
    pub rotation: Rotation,
    pub maintain_aspect: bool,
}

/// The named transforms used by the pipeline, derived together from one
/// `GeometryParams`.
///
/// The value is immutable. Reconfiguring builds a fresh `FrameGeometry` and
/// replaces the old one wholesale, so readers holding a snapshot never see
/// transforms computed from mismatched dimensions.
#[derive(Clone, Debug)]
pub struct FrameGeometry {
    params: GeometryParams,
    preview_to_crop: Transform,
    crop_to_preview: Transform,
    preview_to_depth: Transform,
    crop_to_depth: Transform,
    depth_to_crop: Transform,
}

impl FrameGeometry {
    pub fn configure(params: GeometryParams) -> Result<Self> {
        params.preview.ensure_positive("preview size")?;
        params.crop.ensure_positive("crop size")?;
        params.depth.ensure_positive("depth size")?;

        let preview_to_crop = Transform::new(
            params.preview,
            params.crop,
            params.rotation,
            params.maintain_aspect,
        )
        .context("building preview->crop transform")?;
        let crop_to_preview = preview_to_crop
            .invert()
            .context("inverting preview->crop transform")?;
        let preview_to_depth = Transform::new(
            params.preview,
            params.depth,
            params.rotation,
            params.maintain_aspect,
        )
        .context("building preview->depth transform")?;
        // Both crop and depth images are rendered from the preview, so the
        // crop<->depth mapping goes through preview space.
        let crop_to_depth = crop_to_preview.compose(&preview_to_depth);
        let depth_to_crop = crop_to_depth
            .invert()
            .context("inverting crop->depth transform")?;

        log::info!(
            "frame geometry configured: preview={} crop={} depth={} rotation={} maintain_aspect={}",
            params.preview,
            params.crop,
            params.depth,
            params.rotation.degrees(),
            params.maintain_aspect
        );

        Ok(Self {
            params,
            preview_to_crop,
            crop_to_preview,
            preview_to_depth,
            crop_to_depth,
            depth_to_crop,
        })
    }

    pub fn params(&self) -> &GeometryParams {
        &self.params
    }

    pub fn preview_size(&self) -> Size {
        self.params.preview
    }

    pub fn crop_size(&self) -> Size {
        self.params.crop
    }

    pub fn depth_size(&self) -> Size {
        self.params.depth
    }

    pub fn preview_to_crop_transform(&self) -> &Transform {
        &self.preview_to_crop
    }

    pub fn preview_to_depth_transform(&self) -> &Transform {
        &self.preview_to_depth
    }

    pub fn preview_to_crop(&self, rect: &Rect) -> Rect {
        self.preview_to_crop.map_rect(rect)
    }

    pub fn crop_to_preview(&self, rect: &Rect) -> Rect {
        self.crop_to_preview.map_rect(rect)
    }

    pub fn preview_to_depth(&self, rect: &Rect) -> Rect {
        self.preview_to_depth.map_rect(rect)
    }

    pub fn crop_to_depth(&self, rect: &Rect) -> Rect {
        self.crop_to_depth.map_rect(rect)
    }

    pub fn depth_to_crop(&self, rect: &Rect) -> Rect {
        self.depth_to_crop.map_rect(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(rotation: Rotation) -> GeometryParams {
        GeometryParams {
            preview: Size::new(640, 480),
            crop: Size::new(300, 300),
            depth: Size::new(640, 448),
            rotation,
            maintain_aspect: false,
        }
    }

    fn assert_rect_close(a: &Rect, b: &Rect) {
        let eps = 1e-2;
        assert!(
            (a.left - b.left).abs() < eps
                && (a.top - b.top).abs() < eps
                && (a.right - b.right).abs() < eps
                && (a.bottom - b.bottom).abs() < eps,
            "{:?} != {:?}",
            a,
            b
        );
    }

    #[test]
    fn crop_to_depth_scales_axes_without_rotation() {
        let geometry = FrameGeometry::configure(params(Rotation::Deg0)).unwrap();
        let mapped = geometry.crop_to_depth(&Rect::new(0.0, 0.0, 150.0, 150.0));
        assert_rect_close(&mapped, &Rect::new(0.0, 0.0, 320.0, 224.0));
    }

    #[test]
    fn crop_and_preview_round_trip() {
        for rotation in [Rotation::Deg0, Rotation::Deg90, Rotation::Deg180, Rotation::Deg270] {
            let geometry = FrameGeometry::configure(params(rotation)).unwrap();
            let rect = Rect::new(40.0, 60.0, 120.0, 200.0);
            let back = geometry.preview_to_crop(&geometry.crop_to_preview(&rect));
            assert_rect_close(&back, &rect);
            let back = geometry.depth_to_crop(&geometry.crop_to_depth(&rect));
            assert_rect_close(&back, &rect);
        }
    }

    #[test]
    fn crop_to_depth_agrees_with_preview_path() {
        let geometry = FrameGeometry::configure(params(Rotation::Deg90)).unwrap();
        let rect = Rect::new(10.0, 20.0, 90.0, 140.0);
        let direct = geometry.crop_to_depth(&rect);
        let via_preview = geometry.preview_to_depth(&geometry.crop_to_preview(&rect));
        assert_rect_close(&direct, &via_preview);
    }

    #[test]
    fn non_positive_sizes_are_rejected() {
        let mut bad = params(Rotation::Deg0);
        bad.depth = Size::new(640, 0);
        assert!(FrameGeometry::configure(bad).is_err());
    }
}
