//! Watermark rendering onto a drawing surface.
//!
//! Every render starts from scratch: the surface is reset to the source pixels,
//! then the text is stamped at each tile anchor through the rotated frame.
//! There is no drawing-context state to save or restore; the frame transform
//! and alpha are values scoped to a single call.

use std::time::Instant;

use image::{Rgba, RgbaImage};

use crate::error::{Error, Result};
use crate::settings::{Color, WatermarkSettings};
use crate::source::SourceImage;
use crate::text::{TextFont, TextMask};
use crate::tiling::{Anchor, FrameTransform, TilePlan};

/// Coverage below this contributes nothing visible after rounding.
const MIN_COVERAGE: f32 = 1.0 / 1024.0;

/// The raster a watermark is rendered into.
///
/// Always the exact size of the source image it was last rendered from.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Default for Surface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface {
    /// An empty 0x0 surface.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pixels: RgbaImage::new(0, 0),
        }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Whether the surface has no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pixels.width() == 0 || self.pixels.height() == 0
    }

    /// The rendered pixels.
    #[must_use]
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Take the rendered pixels.
    #[must_use]
    pub fn into_pixels(self) -> RgbaImage {
        self.pixels
    }

    /// Overwrite with a copy of `base`, reusing the allocation when the size
    /// is unchanged.
    fn reset_from(&mut self, base: &RgbaImage) {
        if self.pixels.dimensions() == base.dimensions() {
            self.pixels.copy_from_slice(base.as_raw());
        } else {
            self.pixels = base.clone();
        }
    }
}

impl From<RgbaImage> for Surface {
    fn from(pixels: RgbaImage) -> Self {
        Self { pixels }
    }
}

/// Renders tiled text watermarks.
///
/// Create once and reuse; the renderer only holds the parsed font.
#[derive(Debug, Clone)]
pub struct Renderer {
    font: TextFont,
}

impl Renderer {
    /// Create a renderer using the embedded font.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Font`] if the embedded font cannot be parsed.
    pub fn new() -> Result<Self> {
        Ok(Self::with_font(TextFont::embedded()?))
    }

    /// Create a renderer drawing with `font`.
    #[must_use]
    pub fn with_font(font: TextFont) -> Self {
        Self { font }
    }

    /// The font used for measuring and drawing.
    #[must_use]
    pub fn font(&self) -> &TextFont {
        &self.font
    }

    /// Render `settings` over `source` into a new surface.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGeometry`] for degenerate font size, spacing or
    /// rotation, or when the text or tile grid is too large to draw.
    pub fn render(&self, source: &SourceImage, settings: &WatermarkSettings) -> Result<Surface> {
        let mut surface = Surface::new();
        self.render_into(&mut surface, source, settings)?;
        Ok(surface)
    }

    /// Render into an existing surface, resizing it to the source.
    ///
    /// The base layer is always drawn first, so on error the surface holds
    /// the unwatermarked source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGeometry`] for degenerate font size, spacing or
    /// rotation, or when the text or tile grid is too large to draw.
    pub fn render_into(
        &self,
        surface: &mut Surface,
        source: &SourceImage,
        settings: &WatermarkSettings,
    ) -> Result<()> {
        let started = Instant::now();
        surface.reset_from(source.pixels());

        if !settings.has_watermark() {
            return Ok(());
        }

        let out_of_range = settings.out_of_range();
        if !out_of_range.is_empty() {
            tracing::warn!(fields = ?out_of_range, "watermark settings outside tested ranges");
        }
        if !(settings.font_size.is_finite() && settings.font_size > 0.0) {
            return Err(Error::InvalidGeometry(format!(
                "font size {} must be finite and positive",
                settings.font_size
            )));
        }
        if !settings.rotation.is_finite() {
            return Err(Error::InvalidGeometry(format!(
                "rotation {} must be finite",
                settings.rotation
            )));
        }

        let text_width = self.font.measure(&settings.text, settings.font_size);
        let plan = TilePlan::new(
            surface.width(),
            surface.height(),
            text_width,
            settings.font_size,
            settings.spacing,
            settings.rotation,
        )?;

        let opacity = if settings.opacity.is_nan() {
            0.0
        } else {
            settings.opacity.clamp(0.0, 1.0)
        };
        let mask = self.font.rasterize(&settings.text, settings.font_size)?;
        if mask.is_blank() || opacity <= 0.0 {
            return Ok(());
        }

        let pen = Pen {
            mask: &mask,
            transform: plan.transform(),
            color: settings.color,
            opacity,
        };
        let mut drawn = 0usize;
        for anchor in plan.anchors() {
            if pen.stamp(&mut surface.pixels, anchor) {
                drawn += 1;
            }
        }

        tracing::debug!(
            width = surface.width(),
            height = surface.height(),
            anchors = plan.len(),
            drawn,
            elapsed = ?started.elapsed(),
            "rendered watermark"
        );
        Ok(())
    }
}

/// Per-render drawing state: the rasterized text and how to place it.
struct Pen<'a> {
    mask: &'a TextMask,
    transform: &'a FrameTransform,
    color: Color,
    opacity: f32,
}

impl Pen<'_> {
    /// Draw one copy of the text at `anchor`.
    ///
    /// Returns `false` without touching the canvas when the rotated tile lies
    /// entirely outside it.
    fn stamp(&self, canvas: &mut RgbaImage, anchor: Anchor) -> bool {
        let (left, top) = self.mask.offset();
        #[allow(clippy::cast_precision_loss)]
        let (w, h) = (self.mask.width() as f32, self.mask.height() as f32);
        let u0 = anchor.x + left;
        let v0 = anchor.y + top;

        let corners = [
            self.transform.to_canvas(u0, v0),
            self.transform.to_canvas(u0 + w, v0),
            self.transform.to_canvas(u0, v0 + h),
            self.transform.to_canvas(u0 + w, v0 + h),
        ];
        let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
        let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
        for (x, y) in corners {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        // One pixel of slack for the bilinear fade at the mask edge.
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let (x_start, y_start, x_end, y_end) = (
            (min_x - 1.0).floor().max(0.0) as u32,
            (min_y - 1.0).floor().max(0.0) as u32,
            (max_x + 1.0).ceil().clamp(0.0, canvas.width() as f32) as u32,
            (max_y + 1.0).ceil().clamp(0.0, canvas.height() as f32) as u32,
        );
        if x_start >= x_end || y_start >= y_end {
            return false;
        }

        for py in y_start..y_end {
            for px in x_start..x_end {
                #[allow(clippy::cast_precision_loss)]
                let (u, v) = self
                    .transform
                    .to_frame(px as f32 + 0.5, py as f32 + 0.5);
                let coverage = self.mask.sample(u - u0 - 0.5, v - v0 - 0.5);
                if coverage < MIN_COVERAGE {
                    continue;
                }
                let pixel = canvas.get_pixel_mut(px, py);
                *pixel = blend_over(*pixel, self.color, coverage * self.opacity);
            }
        }
        true
    }
}

/// Composite `color` at `alpha` over `background` (Porter-Duff "over").
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend_over(background: Rgba<u8>, color: Color, alpha: f32) -> Rgba<u8> {
    let fg_alpha = alpha.clamp(0.0, 1.0);
    let bg_alpha = f32::from(background[3]) / 255.0;
    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);
    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |fg: u8, bg: u8| -> u8 {
        let fg = f32::from(fg) / 255.0;
        let bg = f32::from(bg) / 255.0;
        let value = (fg * fg_alpha + bg * bg_alpha * (1.0 - fg_alpha)) / out_alpha;
        (value * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(color.r, background[0]),
        channel(color.g, background[1]),
        channel(color.b, background[2]),
        (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
