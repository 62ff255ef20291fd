//! Text measurement and rasterization.
//!
//! The watermark text is rasterized once per render into a [`TextMask`], an
//! anti-aliased coverage map positioned relative to the text's baseline
//! origin. The renderer stamps that mask at every tile anchor.

use std::path::Path;
use std::sync::Arc;

use ab_glyph::{Font, FontArc, GlyphId, PxScale, ScaleFont};

use crate::error::{Error, Result};

/// Embedded default face (DejaVu Sans, see `fonts/DejaVuSans-LICENSE.txt`).
const EMBEDDED_FONT_DATA: &[u8] = include_bytes!("fonts/DejaVuSans.ttf");

/// Largest text mask, in pixels, that [`TextFont::rasterize`] will allocate.
pub const MAX_MASK_PIXELS: u64 = 1 << 26;

/// A parsed font used to measure and draw watermark text.
#[derive(Clone)]
pub struct TextFont {
    font: FontArc,
}

impl std::fmt::Debug for TextFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextFont")
            .field("glyphs", &self.font.glyph_count())
            .finish()
    }
}

impl TextFont {
    /// The embedded DejaVu Sans face.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Font`] if the embedded data fails to parse.
    pub fn embedded() -> Result<Self> {
        Ok(Self {
            font: FontArc::try_from_slice(EMBEDDED_FONT_DATA)?,
        })
    }

    /// Parse a TrueType/OpenType font from owned bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Font`] if the bytes are not a usable font.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Ok(Self {
            font: FontArc::try_from_vec(data)?,
        })
    }

    /// Read and parse a font file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the file cannot be read, or
    /// [`crate::Error::Font`] if it is not a usable font.
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    /// Advance width of `text` at `font_size` pixels, kerning included.
    #[must_use]
    pub fn measure(&self, text: &str, font_size: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(font_size));
        let mut width = 0.0f32;
        let mut prev: Option<GlyphId> = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(p) = prev {
                width += scaled.kern(p, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        width
    }

    /// Rasterize `text` at `font_size` pixels into a coverage mask.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGeometry`] if the mask would exceed
    /// [`MAX_MASK_PIXELS`].
    pub fn rasterize(&self, text: &str, font_size: f32) -> Result<TextMask> {
        let scale = PxScale::from(font_size);
        let scaled = self.font.as_scaled(scale);

        // Lay out along the baseline starting at the origin and collect the
        // outlines so the mask can be sized to their union.
        let mut outlines = Vec::new();
        let mut cursor = 0.0f32;
        let mut prev: Option<GlyphId> = None;
        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(p) = prev {
                cursor += scaled.kern(p, id);
            }
            let glyph = id.with_scale_and_position(scale, ab_glyph::point(cursor, 0.0));
            if let Some(outlined) = self.font.outline_glyph(glyph) {
                outlines.push(outlined);
            }
            cursor += scaled.h_advance(id);
            prev = Some(id);
        }

        let Some(first) = outlines.first() else {
            return Ok(TextMask::empty());
        };
        let mut min = first.px_bounds().min;
        let mut max = first.px_bounds().max;
        for o in &outlines[1..] {
            let b = o.px_bounds();
            min.x = min.x.min(b.min.x);
            min.y = min.y.min(b.min.y);
            max.x = max.x.max(b.max.x);
            max.y = max.y.max(b.max.y);
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (left, top, width, height) = {
            let left = min.x.floor();
            let top = min.y.floor();
            (
                left,
                top,
                (max.x.ceil() - left).max(0.0) as u32,
                (max.y.ceil() - top).max(0.0) as u32,
            )
        };
        let pixels = u64::from(width) * u64::from(height);
        if pixels > MAX_MASK_PIXELS {
            return Err(Error::InvalidGeometry(format!(
                "text mask of {width}x{height} pixels at font size {font_size} is too large"
            )));
        }
        let (width_px, height_px) = (width as usize, height as usize);
        let mut coverage = vec![0.0f32; width_px * height_px];

        for outlined in &outlines {
            let bounds = outlined.px_bounds();
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let (ox, oy) = (
                (bounds.min.x - left) as u32,
                (bounds.min.y - top) as u32,
            );
            outlined.draw(|px, py, c| {
                let x = ox as usize + px as usize;
                let y = oy as usize + py as usize;
                if x < width_px && y < height_px {
                    let cell = &mut coverage[y * width_px + x];
                    // Overlapping glyphs (tight kerning) accumulate like paint.
                    *cell = (*cell + c).min(1.0);
                }
            });
        }

        Ok(TextMask {
            coverage: Arc::from(coverage),
            width,
            height,
            left,
            top,
        })
    }
}

/// Anti-aliased coverage of a line of text.
///
/// Mask pixel `(0, 0)` sits at `(left, top)` relative to the baseline origin;
/// `top` is negative for glyphs that rise above the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextMask {
    coverage: Arc<[f32]>,
    width: u32,
    height: u32,
    left: f32,
    top: f32,
}

impl TextMask {
    fn empty() -> Self {
        Self {
            coverage: Arc::from(Vec::new()),
            width: 0,
            height: 0,
            left: 0.0,
            top: 0.0,
        }
    }

    /// Mask width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Offset of the mask's top-left corner from the baseline origin.
    #[must_use]
    pub fn offset(&self) -> (f32, f32) {
        (self.left, self.top)
    }

    /// Whether the text produced no visible pixels (e.g. only spaces).
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.coverage.iter().all(|&c| c <= 0.0)
    }

    /// Coverage at an integer mask pixel, `0.0` outside the mask.
    #[must_use]
    pub fn at(&self, x: i64, y: i64) -> f32 {
        if !(0..i64::from(self.width)).contains(&x) || !(0..i64::from(self.height)).contains(&y) {
            return 0.0;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let idx = (y as usize) * self.width as usize + x as usize;
        self.coverage[idx]
    }

    /// Bilinearly interpolated coverage at a fractional mask position, where
    /// `(0.0, 0.0)` is the center of pixel `(0, 0)`.
    #[must_use]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        #[allow(clippy::cast_possible_truncation)]
        let (ix, iy) = (x0 as i64, y0 as i64);

        let c00 = self.at(ix, iy);
        let c10 = self.at(ix + 1, iy);
        let c01 = self.at(ix, iy + 1);
        let c11 = self.at(ix + 1, iy + 1);

        c00 * (1.0 - fx) * (1.0 - fy) + c10 * fx * (1.0 - fy) + c01 * (1.0 - fx) * fy + c11 * fx * fy
    }
}
