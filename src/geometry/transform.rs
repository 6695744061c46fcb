use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

/// Pixel grid dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_positive(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Number of pixels, `None` on overflow.
    pub fn area(&self) -> Option<usize> {
        (self.width as usize).checked_mul(self.height as usize)
    }

    /// Byte length of an interleaved RGB buffer of this size.
    pub fn rgb_len(&self) -> Option<usize> {
        self.area().and_then(|v| v.checked_mul(3))
    }

    pub(crate) fn ensure_positive(&self, what: &str) -> Result<()> {
        if !self.is_positive() {
            bail!(
                "{} must have positive dimensions, got {}x{}",
                what,
                self.width,
                self.height
            );
        }
        Ok(())
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Axis-aligned rectangle, `left <= right`, `top <= bottom` once normalized.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> f32 {
        self.left + self.width() / 2.0
    }
}

/// Clockwise rotation applied when mapping between grids.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Normalizes any multiple of 90 degrees (negative values included).
    pub fn from_degrees(degrees: i32) -> Result<Self> {
        match degrees.rem_euclid(360) {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            _ => Err(anyhow!(
                "rotation must be a multiple of 90 degrees, got {}",
                degrees
            )),
        }
    }

    pub fn degrees(self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// True when the rotation swaps the width and height axes.
    pub fn transposes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    pub fn inverse(self) -> Self {
        match self {
            Rotation::Deg0 => Rotation::Deg0,
            Rotation::Deg90 => Rotation::Deg270,
            Rotation::Deg180 => Rotation::Deg180,
            Rotation::Deg270 => Rotation::Deg90,
        }
    }

    fn then(self, next: Rotation) -> Self {
        match (self.degrees() + next.degrees()) % 360 {
            90 => Rotation::Deg90,
            180 => Rotation::Deg180,
            270 => Rotation::Deg270,
            _ => Rotation::Deg0,
        }
    }

    /// (cos, sin) with exact values for right angles.
    fn cos_sin(self) -> (f64, f64) {
        match self {
            Rotation::Deg0 => (1.0, 0.0),
            Rotation::Deg90 => (0.0, 1.0),
            Rotation::Deg180 => (-1.0, 0.0),
            Rotation::Deg270 => (0.0, -1.0),
        }
    }
}

/// Row-major 2x3 affine matrix: `x' = a*x + b*y + tx`, `y' = c*x + d*y + ty`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Affine {
    a: f64,
    b: f64,
    tx: f64,
    c: f64,
    d: f64,
    ty: f64,
}

impl Affine {
    const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        tx: 0.0,
        c: 0.0,
        d: 1.0,
        ty: 0.0,
    };

    fn translate(dx: f64, dy: f64) -> Self {
        Affine {
            tx: dx,
            ty: dy,
            ..Self::IDENTITY
        }
    }

    fn scale(sx: f64, sy: f64) -> Self {
        Affine {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    fn rotate(rotation: Rotation) -> Self {
        let (cos, sin) = rotation.cos_sin();
        Affine {
            a: cos,
            b: -sin,
            tx: 0.0,
            c: sin,
            d: cos,
            ty: 0.0,
        }
    }

    /// Applies `self` first, then `next`.
    fn then(&self, next: &Affine) -> Affine {
        Affine {
            a: next.a * self.a + next.b * self.c,
            b: next.a * self.b + next.b * self.d,
            tx: next.a * self.tx + next.b * self.ty + next.tx,
            c: next.c * self.a + next.d * self.c,
            d: next.c * self.b + next.d * self.d,
            ty: next.c * self.tx + next.d * self.ty + next.ty,
        }
    }

    fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    fn invert(&self) -> Option<Affine> {
        let det = self.determinant();
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Affine {
            a,
            b,
            tx: -(a * self.tx + b * self.ty),
            c,
            d,
            ty: -(c * self.tx + d * self.ty),
        })
    }

    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.b * y + self.tx,
            self.c * x + self.d * y + self.ty,
        )
    }
}

/// Invertible affine mapping between two fixed-size pixel grids.
///
/// Built from source/destination sizes, a rotation and an aspect policy:
/// the source center is moved to the origin, rotated, scaled (non-uniformly
/// to fill the destination exactly, or uniformly by the larger factor when
/// `maintain_aspect` is set) and moved to the destination center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    src: Size,
    dst: Size,
    rotation: Rotation,
    maintain_aspect: bool,
    matrix: Affine,
}

impl Transform {
    pub fn new(src: Size, dst: Size, rotation: Rotation, maintain_aspect: bool) -> Result<Self> {
        src.ensure_positive("transform source")?;
        dst.ensure_positive("transform destination")?;

        let (in_width, in_height) = if rotation.transposes() {
            (src.height as f64, src.width as f64)
        } else {
            (src.width as f64, src.height as f64)
        };
        let scale_x = dst.width as f64 / in_width;
        let scale_y = dst.height as f64 / in_height;
        let (scale_x, scale_y) = if maintain_aspect {
            let uniform = scale_x.max(scale_y);
            (uniform, uniform)
        } else {
            (scale_x, scale_y)
        };

        let matrix = Affine::translate(-(src.width as f64) / 2.0, -(src.height as f64) / 2.0)
            .then(&Affine::rotate(rotation))
            .then(&Affine::scale(scale_x, scale_y))
            .then(&Affine::translate(dst.width as f64 / 2.0, dst.height as f64 / 2.0));

        Ok(Self {
            src,
            dst,
            rotation,
            maintain_aspect,
            matrix,
        })
    }

    /// Convenience constructor taking the rotation in degrees.
    pub fn from_degrees(src: Size, dst: Size, degrees: i32, maintain_aspect: bool) -> Result<Self> {
        Self::new(src, dst, Rotation::from_degrees(degrees)?, maintain_aspect)
    }

    pub fn src(&self) -> Size {
        self.src
    }

    pub fn dst(&self) -> Size {
        self.dst
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn maintain_aspect(&self) -> bool {
        self.maintain_aspect
    }

    /// Mapping that applies `self` and then `next`.
    ///
    /// `next` is expected to start in the grid `self` ends in.
    pub fn compose(&self, next: &Transform) -> Transform {
        if self.dst != next.src {
            log::debug!(
                "composing transforms over mismatched grids ({} then {})",
                self.dst,
                next.src
            );
        }
        Transform {
            src: self.src,
            dst: next.dst,
            rotation: self.rotation.then(next.rotation),
            maintain_aspect: self.maintain_aspect && next.maintain_aspect,
            matrix: self.matrix.then(&next.matrix),
        }
    }

    pub fn invert(&self) -> Result<Transform> {
        let matrix = self.matrix.invert().ok_or_else(|| {
            anyhow!(
                "transform {} -> {} is singular and cannot be inverted",
                self.src,
                self.dst
            )
        })?;
        Ok(Transform {
            src: self.dst,
            dst: self.src,
            rotation: self.rotation.inverse(),
            maintain_aspect: self.maintain_aspect,
            matrix,
        })
    }

    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        let (mx, my) = self.matrix.apply(x as f64, y as f64);
        (mx as f32, my as f32)
    }

    /// Maps all four corners and returns their bounding box.
    pub fn map_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            self.matrix.apply(rect.left as f64, rect.top as f64),
            self.matrix.apply(rect.right as f64, rect.top as f64),
            self.matrix.apply(rect.left as f64, rect.bottom as f64),
            self.matrix.apply(rect.right as f64, rect.bottom as f64),
        ];
        let mut left = f64::INFINITY;
        let mut top = f64::INFINITY;
        let mut right = f64::NEG_INFINITY;
        let mut bottom = f64::NEG_INFINITY;
        for (x, y) in corners {
            left = left.min(x);
            top = top.min(y);
            right = right.max(x);
            bottom = bottom.max(y);
        }
        Rect::new(left as f32, top as f32, right as f32, bottom as f32)
    }

    /// True when the mapping moves no point by more than `epsilon` at the
    /// corners of the source grid.
    pub fn is_identity_within(&self, epsilon: f32) -> bool {
        let w = self.src.width as f32;
        let h = self.src.height as f32;
        [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)]
            .into_iter()
            .all(|(x, y)| {
                let (mx, my) = self.map_point(x, y);
                (mx - x).abs() <= epsilon && (my - y).abs() <= epsilon
            })
    }
}
