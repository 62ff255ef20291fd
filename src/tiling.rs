//! Tile placement for the rotated watermark grid.
//!
//! Anchors are laid out on an axis-aligned grid in a frame whose origin is the
//! canvas center. The whole grid is then rotated about that center when drawn.
//! Sweeping both axes over `[-diagonal, diagonal)` guarantees coverage at any
//! rotation: every canvas point lies within `diagonal / 2` of the center, so
//! the swept square contains the canvas's circumscribing circle.
//!
//! Rotation never changes the anchors; it only changes [`FrameTransform`].

use crate::error::{Error, Result};

/// Upper bound on anchors in one plan. Past this the grid is too dense to
/// render in reasonable time.
pub const MAX_ANCHORS: usize = 1 << 24;

/// A single position at which one copy of the text is drawn.
///
/// Coordinates are in the rotated frame, relative to the canvas center. The
/// anchor is the left end of the text's baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    /// Horizontal offset from the canvas center.
    pub x: f32,
    /// Vertical offset from the canvas center (y grows downward).
    pub y: f32,
}

/// Affine map between the rotated frame and canvas pixels.
///
/// Equivalent to translating to the canvas center and then rotating by the
/// configured angle (positive angles turn clockwise on a y-down raster).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransform {
    cos: f32,
    sin: f32,
    center_x: f32,
    center_y: f32,
}

impl FrameTransform {
    /// Build the transform for a canvas of the given size.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(canvas_width: u32, canvas_height: u32, rotation_degrees: f32) -> Self {
        let radians = rotation_degrees * std::f32::consts::PI / 180.0;
        Self {
            cos: radians.cos(),
            sin: radians.sin(),
            center_x: canvas_width as f32 / 2.0,
            center_y: canvas_height as f32 / 2.0,
        }
    }

    /// Map a point in the rotated frame to canvas coordinates.
    #[must_use]
    pub fn to_canvas(&self, u: f32, v: f32) -> (f32, f32) {
        (
            self.cos * u - self.sin * v + self.center_x,
            self.sin * u + self.cos * v + self.center_y,
        )
    }

    /// Map a canvas point back into the rotated frame.
    #[must_use]
    pub fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        let dx = x - self.center_x;
        let dy = y - self.center_y;
        (self.cos * dx + self.sin * dy, -self.sin * dx + self.cos * dy)
    }
}

/// A planned tiling: grid geometry plus the frame it is drawn in.
///
/// The plan is cheap to keep around; [`TilePlan::anchors`] can be called any
/// number of times and always yields the same sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct TilePlan {
    diagonal: f64,
    step_x: f64,
    step_y: f64,
    columns: usize,
    rows: usize,
    transform: FrameTransform,
}

impl TilePlan {
    /// Plan the grid for one render.
    ///
    /// `text_box_width` is the measured advance width of the text at
    /// `font_size`. Callers must not plan tiles for empty text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGeometry`] if either step is zero, negative, or
    /// not finite, or if the grid would hold more than [`MAX_ANCHORS`] anchors.
    pub fn new(
        canvas_width: u32,
        canvas_height: u32,
        text_box_width: f32,
        font_size: f32,
        spacing: f32,
        rotation_degrees: f32,
    ) -> Result<Self> {
        let step_x = f64::from(text_box_width) + f64::from(spacing);
        let step_y = f64::from(font_size) + f64::from(spacing);
        if !(step_x.is_finite() && step_x > 0.0 && step_y.is_finite() && step_y > 0.0) {
            return Err(Error::InvalidGeometry(format!(
                "step {step_x}x{step_y} must be finite and positive"
            )));
        }

        let diagonal = f64::from(canvas_width).hypot(f64::from(canvas_height));
        let columns = axis_count(diagonal, step_x);
        let rows = axis_count(diagonal, step_y);
        match columns.checked_mul(rows) {
            Some(total) if total <= MAX_ANCHORS => {}
            _ => {
                return Err(Error::InvalidGeometry(format!(
                    "step {step_x}x{step_y} yields a {columns}x{rows} grid, over {MAX_ANCHORS} anchors"
                )));
            }
        }

        tracing::debug!(
            canvas_width,
            canvas_height,
            diagonal,
            step_x,
            step_y,
            columns,
            rows,
            "planned watermark tiling"
        );

        Ok(Self {
            diagonal,
            step_x,
            step_y,
            columns,
            rows,
            transform: FrameTransform::new(canvas_width, canvas_height, rotation_degrees),
        })
    }

    /// Length of the canvas diagonal, the sweep half-extent on both axes.
    #[must_use]
    pub fn diagonal(&self) -> f64 {
        self.diagonal
    }

    /// Distance between neighboring anchors as `(x, y)`.
    #[must_use]
    pub fn step(&self) -> (f64, f64) {
        (self.step_x, self.step_y)
    }

    /// Number of anchors per row.
    #[must_use]
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Total number of anchors, at most [`MAX_ANCHORS`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns * self.rows
    }

    /// Whether the plan has no anchors (zero-sized canvas).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The transform from the rotated frame to canvas pixels.
    #[must_use]
    pub fn transform(&self) -> &FrameTransform {
        &self.transform
    }

    /// Anchors in row-major order (y outer, x inner).
    #[must_use]
    pub fn anchors(&self) -> Anchors<'_> {
        Anchors {
            plan: self,
            index: 0,
        }
    }
}

/// Coordinates on one axis are `-diagonal + n * step` for every `n` that keeps
/// them below `diagonal`, i.e. `ceil(2 * diagonal / step)` of them.
/// Saturates at `usize::MAX` for absurdly small steps.
fn axis_count(diagonal: f64, step: f64) -> usize {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = (2.0 * diagonal / step).ceil() as usize;
    count
}

/// Iterator over the anchors of a [`TilePlan`].
#[derive(Debug, Clone)]
pub struct Anchors<'a> {
    plan: &'a TilePlan,
    index: usize,
}

impl Iterator for Anchors<'_> {
    type Item = Anchor;

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn next(&mut self) -> Option<Anchor> {
        let plan = self.plan;
        if self.index >= plan.len() {
            return None;
        }
        let row = self.index / plan.columns;
        let col = self.index % plan.columns;
        self.index += 1;

        // Narrowed only after the full-precision sum.
        Some(Anchor {
            x: (-plan.diagonal + col as f64 * plan.step_x) as f32,
            y: (-plan.diagonal + row as f64 * plan.step_y) as f32,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.plan.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Anchors<'_> {}
