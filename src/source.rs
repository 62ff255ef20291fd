//! Upload intake: media type checks and decoding into a [`SourceImage`].

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::{Error, Result};

/// Media types accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// `image/jpeg`
    Jpeg,
    /// `image/png`
    Png,
    /// `image/webp`
    WebP,
}

impl MediaType {
    /// Every accepted media type.
    pub const ALL: [MediaType; 3] = [MediaType::Jpeg, MediaType::Png, MediaType::WebP];

    /// Match an exact MIME type string (parameters such as `; charset=` are
    /// ignored, comparison is case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for any other type.
    pub fn from_mime(mime: &str) -> Result<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        Self::ALL
            .into_iter()
            .find(|t| t.mime().eq_ignore_ascii_case(essence))
            .ok_or_else(|| Error::UnsupportedFormat(mime.to_string()))
    }

    /// Infer the media type from a file extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for missing or unknown extensions.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;
        match ext.as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::WebP),
            _ => Err(Error::UnsupportedFormat(format!(".{ext}"))),
        }
    }

    /// The MIME type string.
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::WebP => ImageFormat::WebP,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_mime(s)
    }
}

/// Check if a file has an extension accepted for upload.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    MediaType::from_path(path).is_ok()
}

/// An immutable decoded bitmap, stored as 8-bit RGBA.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pixels: RgbaImage,
}

impl SourceImage {
    /// Decode uploaded bytes declared as `media_type`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the bytes are not a valid image of that type.
    pub fn decode(bytes: &[u8], media_type: MediaType) -> Result<Self> {
        let img = image::load_from_memory_with_format(bytes, media_type.image_format())
            .map_err(Error::Decode)?;
        tracing::info!(
            media_type = %media_type,
            width = img.width(),
            height = img.height(),
            "decoded source image"
        );
        Ok(Self::from(img))
    }

    /// Read and decode a file, inferring its type from the extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for unknown extensions (checked
    /// before the file is read), [`Error::Io`] if reading fails, and
    /// [`Error::Decode`] if decoding fails.
    pub fn open(path: &Path) -> Result<Self> {
        let media_type = MediaType::from_path(path)?;
        let bytes = std::fs::read(path)?;
        Self::decode(&bytes, media_type)
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

    /// The decoded pixels.
    #[must_use]
    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

impl From<RgbaImage> for SourceImage {
    fn from(pixels: RgbaImage) -> Self {
        Self { pixels }
    }
}

impl From<DynamicImage> for SourceImage {
    fn from(img: DynamicImage) -> Self {
        Self {
            pixels: img.into_rgba8(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn accepts_exactly_three_mime_types() {
        assert_eq!(MediaType::from_mime("image/jpeg").unwrap(), MediaType::Jpeg);
        assert_eq!(MediaType::from_mime("image/png").unwrap(), MediaType::Png);
        assert_eq!(MediaType::from_mime("image/webp").unwrap(), MediaType::WebP);
        assert_eq!(MediaType::from_mime("IMAGE/PNG").unwrap(), MediaType::Png);
        assert_eq!(
            MediaType::from_mime("image/png; name=x").unwrap(),
            MediaType::Png
        );
    }

    #[test]
    fn rejects_other_mime_types() {
        for mime in ["text/plain", "image/gif", "image/jpg", "image/bmp", ""] {
            assert!(
                matches!(MediaType::from_mime(mime), Err(Error::UnsupportedFormat(_))),
                "{mime} should be rejected"
            );
        }
    }

    #[test]
    fn is_supported_image_accepts_upload_extensions() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPEG")));
        assert!(is_supported_image(Path::new("photo.png")));
        assert!(is_supported_image(Path::new("photo.webp")));
        assert!(!is_supported_image(Path::new("photo.bmp")));
        assert!(!is_supported_image(Path::new("photo.txt")));
        assert!(!is_supported_image(Path::new("photo")));
    }

    #[test]
    fn decode_keeps_natural_dimensions() {
        let img = SourceImage::decode(&png_bytes(40, 30), MediaType::Png).unwrap();
        assert_eq!((img.width(), img.height()), (40, 30));
        assert_eq!(img.pixels().get_pixel(5, 5).0, [10, 20, 30, 255]);
    }

    #[test]
    fn decode_failure_is_reported() {
        let err = SourceImage::decode(b"not an image", MediaType::Png).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));

        // Declared type wins over content.
        let err = SourceImage::decode(&png_bytes(4, 4), MediaType::Jpeg).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn open_checks_extension_before_reading() {
        let err = SourceImage::open(Path::new("/nonexistent/notes.txt")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));

        let err = SourceImage::open(Path::new("/nonexistent/photo.png")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
