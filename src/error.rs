//! Error types for the text-watermark crate.

/// Errors that can occur while loading, watermarking, or exporting an image.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The uploaded file is not one of the accepted media types.
    #[error("unsupported image format: {0} (expected image/jpeg, image/png or image/webp)")]
    UnsupportedFormat(String),

    /// The file had an accepted media type but could not be decoded.
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// Tiling inputs would produce a degenerate or unbounded grid.
    #[error("invalid tiling geometry: {0}")]
    InvalidGeometry(String),

    /// Encoding the rendered surface failed; no bytes were produced.
    #[error("failed to encode {format}: {reason}")]
    Encode {
        /// Target format name.
        format: &'static str,
        /// Encoder message.
        reason: String,
    },

    /// Export was requested with no image loaded or no watermark text.
    #[error("export unavailable: {0}")]
    ExportUnavailable(&'static str),

    /// The color string is not `#RGB` or `#RRGGBB`.
    #[error("invalid color {0:?}: expected #RGB or #RRGGBB")]
    InvalidColor(String),

    /// The font bytes could not be parsed.
    #[error("invalid font data: {0}")]
    Font(#[from] ab_glyph::InvalidFont),

    /// A settings record could not be parsed.
    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let io_err = Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));

        let unsupported = Error::UnsupportedFormat("text/plain".to_string());
        assert!(unsupported.to_string().contains("text/plain"));

        let geometry = Error::InvalidGeometry("step 0x124 must be finite and positive".into());
        assert!(geometry.to_string().contains("0x124"));

        let encode = Error::Encode {
            format: "webp",
            reason: "surface is empty".to_string(),
        };
        assert!(encode.to_string().contains("webp"));
        assert!(encode.to_string().contains("surface is empty"));

        let color = Error::InvalidColor("red".to_string());
        assert!(color.to_string().contains("\"red\""));
    }
}
