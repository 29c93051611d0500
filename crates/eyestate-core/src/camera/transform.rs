//! Buffer-to-view transform for the preview surface.
//!
//! The camera renders into a buffer in sensor orientation. When the display
//! is rotated sideways the buffer has to be mapped onto the view, scaled to
//! fill it and turned by a quarter turn.

#![allow(clippy::cast_precision_loss)]

use serde::Serialize;

use crate::domain::{DisplayRotation, Size};

/// Axis-aligned rectangle in floating point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RectF {
    /// Left edge.
    pub left: f32,
    /// Top edge.
    pub top: f32,
    /// Right edge.
    pub right: f32,
    /// Bottom edge.
    pub bottom: f32,
}

impl RectF {
    /// Rectangle at the origin with the given size.
    #[must_use]
    pub fn from_size(width: f32, height: f32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            right: width,
            bottom: height,
        }
    }

    /// Width.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Height.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Horizontal center.
    #[must_use]
    pub fn center_x(&self) -> f32 {
        (self.left + self.right) / 2.0
    }

    /// Vertical center.
    #[must_use]
    pub fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }

    /// Moves the rectangle by `(dx, dy)`.
    #[must_use]
    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            right: self.right + dx,
            bottom: self.bottom + dy,
        }
    }
}

/// 2D affine matrix `[sx kx tx; ky sy ty; 0 0 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Matrix {
    /// X scale.
    pub scale_x: f32,
    /// X skew.
    pub skew_x: f32,
    /// X translation.
    pub trans_x: f32,
    /// Y skew.
    pub skew_y: f32,
    /// Y scale.
    pub scale_y: f32,
    /// Y translation.
    pub trans_y: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    /// The identity transform.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            scale_x: 1.0,
            skew_x: 0.0,
            trans_x: 0.0,
            skew_y: 0.0,
            scale_y: 1.0,
            trans_y: 0.0,
        }
    }

    /// Pure translation.
    #[must_use]
    pub const fn translate(dx: f32, dy: f32) -> Self {
        Self {
            trans_x: dx,
            trans_y: dy,
            ..Self::identity()
        }
    }

    /// Scale about the pivot `(px, py)`.
    #[must_use]
    pub fn scale(sx: f32, sy: f32, px: f32, py: f32) -> Self {
        Self {
            scale_x: sx,
            scale_y: sy,
            trans_x: px - sx * px,
            trans_y: py - sy * py,
            ..Self::identity()
        }
    }

    /// Rotation by `degrees` (clockwise in screen space) about `(px, py)`.
    #[must_use]
    pub fn rotate(degrees: f32, px: f32, py: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            scale_x: cos,
            skew_x: -sin,
            trans_x: px - cos * px + sin * py,
            skew_y: sin,
            scale_y: cos,
            trans_y: py - sin * px - cos * py,
        }
    }

    /// Maps `src` onto `dst`, stretching each axis independently.
    #[must_use]
    pub fn rect_to_rect_fill(src: RectF, dst: RectF) -> Self {
        if src.width() == 0.0 || src.height() == 0.0 {
            return Self::identity();
        }
        let sx = dst.width() / src.width();
        let sy = dst.height() / src.height();
        Self {
            scale_x: sx,
            scale_y: sy,
            trans_x: dst.left - src.left * sx,
            trans_y: dst.top - src.top * sy,
            ..Self::identity()
        }
    }

    /// `self` followed by `other`.
    #[must_use]
    pub fn then(self, other: Self) -> Self {
        let a = other;
        let b = self;
        Self {
            scale_x: a.scale_x * b.scale_x + a.skew_x * b.skew_y,
            skew_x: a.scale_x * b.skew_x + a.skew_x * b.scale_y,
            trans_x: a.scale_x * b.trans_x + a.skew_x * b.trans_y + a.trans_x,
            skew_y: a.skew_y * b.scale_x + a.scale_y * b.skew_y,
            scale_y: a.skew_y * b.skew_x + a.scale_y * b.scale_y,
            trans_y: a.skew_y * b.trans_x + a.scale_y * b.trans_y + a.trans_y,
        }
    }

    /// Applies the transform to a point.
    #[must_use]
    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.scale_x * x + self.skew_x * y + self.trans_x,
            self.skew_y * x + self.scale_y * y + self.trans_y,
        )
    }

    /// Net rotation in degrees, in `(-180, 180]`.
    #[must_use]
    pub fn rotation_degrees(&self) -> f32 {
        self.skew_y.atan2(self.scale_x).to_degrees()
    }
}

/// Transform applied to the preview surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayTransform {
    /// Buffer-to-view matrix.
    pub matrix: Matrix,
    /// Uniform scale applied to fill the view.
    pub fill_scale: f32,
    /// Rotation applied, in degrees.
    pub rotation_degrees: f32,
}

impl DisplayTransform {
    /// No scaling or rotation.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            matrix: Matrix::identity(),
            fill_scale: 1.0,
            rotation_degrees: 0.0,
        }
    }
}

/// Computes the preview transform for a `view` showing `reader` sized buffers.
///
/// Sideways rotations map the view onto the centered, transposed buffer,
/// scale uniformly to fill and rotate by `90 × (index − 2)` degrees. A
/// half turn rotates by 180. `legacy_translate`, when set, replaces the
/// result with a bare translation.
#[must_use]
pub fn configure_transform(
    view: Size,
    reader: Size,
    rotation: DisplayRotation,
    legacy_translate: Option<(f32, f32)>,
) -> DisplayTransform {
    if let Some((dx, dy)) = legacy_translate {
        return DisplayTransform {
            matrix: Matrix::translate(dx, dy),
            ..DisplayTransform::identity()
        };
    }

    let (view_w, view_h) = (view.width as f32, view.height as f32);
    let (reader_w, reader_h) = (reader.width as f32, reader.height as f32);
    let view_rect = RectF::from_size(view_w, view_h);
    let (center_x, center_y) = (view_rect.center_x(), view_rect.center_y());

    if rotation.is_sideways() {
        let buffer_rect = RectF::from_size(reader_h, reader_w);
        let buffer_rect = buffer_rect.offset(
            center_x - buffer_rect.center_x(),
            center_y - buffer_rect.center_y(),
        );
        let fill_scale = if reader_w > 0.0 && reader_h > 0.0 {
            (view_h / reader_h).max(view_w / reader_w)
        } else {
            1.0
        };
        let degrees = (90 * (rotation.index() - 2)) as f32;

        let matrix = Matrix::rect_to_rect_fill(view_rect, buffer_rect)
            .then(Matrix::scale(fill_scale, fill_scale, center_x, center_y))
            .then(Matrix::rotate(degrees, center_x, center_y));

        DisplayTransform {
            matrix,
            fill_scale,
            rotation_degrees: degrees,
        }
    } else if rotation == DisplayRotation::Rotation180 {
        DisplayTransform {
            matrix: Matrix::rotate(180.0, center_x, center_y),
            fill_scale: 1.0,
            rotation_degrees: 180.0,
        }
    } else {
        DisplayTransform::identity()
    }
}
