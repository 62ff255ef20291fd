//! Encoding rendered surfaces for download.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};

use crate::error::{Error, Result};
use crate::render::Surface;

/// JPEG quality, the 0.92 quality factor on the encoder's 1-100 scale.
pub const JPEG_QUALITY: u8 = 92;

/// Base name of exported files.
const EXPORT_STEM: &str = "watermarked";

/// Output encodings offered for download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExportFormat {
    /// Lossless, keeps alpha.
    #[default]
    Png,
    /// Lossy at [`JPEG_QUALITY`], alpha discarded.
    Jpeg,
    /// Lossless WebP, keeps alpha.
    WebP,
}

impl ExportFormat {
    /// Every export format.
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Png, ExportFormat::Jpeg, ExportFormat::WebP];

    /// File extension, also the format's short name.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::WebP => "webp",
        }
    }

    /// MIME type of the encoded bytes.
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Download file name, e.g. `watermarked.png`.
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{EXPORT_STEM}.{}", self.extension())
    }

    /// Whether the encoding preserves the alpha channel.
    #[must_use]
    pub fn keeps_alpha(self) -> bool {
        !matches!(self, Self::Jpeg)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::WebP),
            _ => Err(Error::UnsupportedFormat(s.to_string())),
        }
    }
}

/// An encoded export ready to hand to a file-save collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    /// Suggested file name, `watermarked.<ext>`.
    pub file_name: String,
    /// MIME type of `bytes`.
    pub mime_type: &'static str,
    /// Encoded image. Never empty.
    pub bytes: Vec<u8>,
}

impl ExportedFile {
    /// Write the file into `dir` under its suggested name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created or the file
    /// cannot be written.
    pub fn save_in(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);
        self.save_as(&path)?;
        Ok(path)
    }

    /// Write the file to an explicit path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the parent directory cannot be created or the
    /// file cannot be written.
    pub fn save_as(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, &self.bytes)?;
        tracing::info!(path = %path.display(), bytes = self.bytes.len(), "saved export");
        Ok(())
    }
}

/// Encode a rendered surface.
///
/// # Errors
///
/// Returns [`Error::Encode`] if the surface is empty or the encoder fails.
pub fn export_surface(surface: &Surface, format: ExportFormat) -> Result<Vec<u8>> {
    let encode_err = |reason: String| Error::Encode {
        format: format.extension(),
        reason,
    };
    if surface.is_empty() {
        return Err(encode_err("surface is empty".to_string()));
    }

    let pixels = surface.pixels();
    let (width, height) = pixels.dimensions();
    let mut out = Cursor::new(Vec::new());

    let encoded = match format {
        ExportFormat::Png => PngEncoder::new(&mut out).write_image(
            pixels.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        ExportFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(pixels.clone()).into_rgb8();
            JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
        ExportFormat::WebP => WebPEncoder::new_lossless(&mut out).write_image(
            pixels.as_raw(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
    };
    encoded.map_err(|e| encode_err(e.to_string()))?;

    let bytes = out.into_inner();
    if bytes.is_empty() {
        return Err(encode_err("encoder produced no output".to_string()));
    }
    tracing::debug!(format = %format, width, height, bytes = bytes.len(), "encoded surface");
    Ok(bytes)
}

/// Encode a surface and package it with its download name.
///
/// # Errors
///
/// Returns [`Error::Encode`] if encoding fails.
pub fn export_file(surface: &Surface, format: ExportFormat) -> Result<ExportedFile> {
    Ok(ExportedFile {
        file_name: format.file_name(),
        mime_type: format.mime_type(),
        bytes: export_surface(surface, format)?,
    })
}

/// Encode the same surface in several formats.
///
/// The surface is shared immutably for the whole call, so it cannot change
/// between encodings. Runs in parallel when the `cli` feature is enabled
/// (via rayon). Results are in the order of `formats`.
#[must_use]
pub fn export_many(surface: &Surface, formats: &[ExportFormat]) -> Vec<Result<ExportedFile>> {
    #[cfg(feature = "cli")]
    {
        use rayon::prelude::*;
        formats
            .par_iter()
            .map(|&format| export_file(surface, format))
            .collect()
    }

    #[cfg(not(feature = "cli"))]
    {
        formats
            .iter()
            .map(|&format| export_file(surface, format))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn checker(width: u32, height: u32) -> Surface {
        Surface::from(RgbaImage::from_fn(width, height, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgba([240, 30, 30, 255])
            } else {
                Rgba([20, 20, 200, 128])
            }
        }))
    }

    #[test]
    fn format_names_and_file_names() {
        assert_eq!(ExportFormat::Png.file_name(), "watermarked.png");
        assert_eq!(ExportFormat::Jpeg.file_name(), "watermarked.jpeg");
        assert_eq!(ExportFormat::WebP.file_name(), "watermarked.webp");
        assert_eq!(ExportFormat::Jpeg.mime_type(), "image/jpeg");
        assert!(!ExportFormat::Jpeg.keeps_alpha());
        assert!(ExportFormat::WebP.keeps_alpha());
    }

    #[test]
    fn parse_format_names() {
        assert_eq!("PNG".parse::<ExportFormat>().unwrap(), ExportFormat::Png);
        assert_eq!("jpg".parse::<ExportFormat>().unwrap(), ExportFormat::Jpeg);
        assert_eq!("webp".parse::<ExportFormat>().unwrap(), ExportFormat::WebP);
        assert!(matches!(
            "gif".parse::<ExportFormat>(),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn empty_surface_is_an_encode_error() {
        for format in ExportFormat::ALL {
            let err = export_surface(&Surface::new(), format).unwrap_err();
            assert!(matches!(err, Error::Encode { .. }), "{format}");
        }
    }

    #[test]
    fn png_and_webp_round_trip_with_alpha() {
        let surface = checker(32, 24);
        for format in [ExportFormat::Png, ExportFormat::WebP] {
            let bytes = export_surface(&surface, format).unwrap();
            let decoded = image::load_from_memory(&bytes).unwrap().into_rgba8();
            assert_eq!(&decoded, surface.pixels(), "{format}");
        }
    }

    #[test]
    fn jpeg_drops_alpha_and_uses_fixed_quality() {
        let surface = checker(32, 24);
        let bytes = export_surface(&surface, ExportFormat::Jpeg).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
        assert_eq!((decoded.width(), decoded.height()), (32, 24));

        let mut expected = Cursor::new(Vec::new());
        let rgb = DynamicImage::ImageRgba8(surface.pixels().clone()).into_rgb8();
        JpegEncoder::new_with_quality(&mut expected, 92)
            .write_image(rgb.as_raw(), 32, 24, ExtendedColorType::Rgb8)
            .unwrap();
        assert_eq!(bytes, expected.into_inner());
    }

    #[test]
    fn export_many_preserves_requested_order() {
        let surface = checker(16, 16);
        let files = export_many(&surface, &[ExportFormat::WebP, ExportFormat::Png]);
        let names: Vec<_> = files
            .into_iter()
            .map(|r| r.unwrap().file_name)
            .collect();
        assert_eq!(names, ["watermarked.webp", "watermarked.png"]);
    }

    #[test]
    fn save_in_writes_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = export_file(&checker(8, 8), ExportFormat::Png).unwrap();
        let path = file.save_in(&dir.path().join("out")).unwrap();
        assert_eq!(path.file_name().unwrap(), "watermarked.png");
        assert_eq!(std::fs::read(&path).unwrap(), file.bytes);
    }
}
