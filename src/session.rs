//! Explicit editing state: the loaded image, its settings, and the preview.
//!
//! A [`Session`] replaces ambient UI globals. Each change event (upload,
//! settings change, reset) is a method call that fully re-renders before it
//! returns, so there is never more than one render in flight.
//!
//! Changes are rendered into a spare surface first and only committed when
//! the render succeeds, so the preview always matches the stored image and
//! settings.

use std::path::Path;

use crate::error::{Error, Result};
use crate::export::{self, ExportFormat, ExportedFile};
use crate::render::{Renderer, Surface};
use crate::settings::WatermarkSettings;
use crate::source::{MediaType, SourceImage};

/// Holds the current image, settings, and rendered preview.
#[derive(Debug)]
pub struct Session {
    renderer: Renderer,
    settings: WatermarkSettings,
    image: Option<SourceImage>,
    surface: Surface,
    scratch: Surface,
}

impl Session {
    /// Start a session with default settings and no image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Font`] if the embedded font cannot be parsed.
    pub fn new() -> Result<Self> {
        Ok(Self::with_renderer(Renderer::new()?))
    }

    /// Start a session drawing with a specific renderer.
    #[must_use]
    pub fn with_renderer(renderer: Renderer) -> Self {
        Self {
            renderer,
            settings: WatermarkSettings::default(),
            image: None,
            surface: Surface::new(),
            scratch: Surface::new(),
        }
    }

    /// Accept uploaded bytes with a declared MIME type.
    ///
    /// On success the previous image is released and the preview re-rendered.
    /// On failure, including a failed render, nothing changes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedFormat`] for MIME types other than
    /// `image/jpeg`, `image/png` and `image/webp`, [`Error::Decode`] if the
    /// bytes do not decode, or a render error.
    pub fn upload(&mut self, bytes: &[u8], mime: &str) -> Result<()> {
        let media_type = MediaType::from_mime(mime)?;
        let image = SourceImage::decode(bytes, media_type)?;
        self.replace_image(image)
    }

    /// Accept a file from disk, typed by its extension.
    ///
    /// # Errors
    ///
    /// Same as [`Session::upload`], plus [`Error::Io`] if reading fails.
    pub fn upload_file(&mut self, path: &Path) -> Result<()> {
        let image = SourceImage::open(path)?;
        self.replace_image(image)
    }

    /// Install an already-decoded image.
    ///
    /// # Errors
    ///
    /// Returns a render error; the previous image, if any, stays installed.
    pub fn replace_image(&mut self, image: SourceImage) -> Result<()> {
        commit_render(
            &self.renderer,
            &mut self.surface,
            &mut self.scratch,
            &image,
            &self.settings,
        )?;
        if let Some(old) = self.image.replace(image) {
            tracing::debug!(
                width = old.width(),
                height = old.height(),
                "released previous image"
            );
        }
        Ok(())
    }

    /// Replace the settings wholesale and re-render.
    ///
    /// With no image loaded the settings are stored without rendering.
    ///
    /// # Errors
    ///
    /// Returns a render error; the previous settings stay installed.
    pub fn set_settings(&mut self, settings: WatermarkSettings) -> Result<()> {
        if let Some(image) = &self.image {
            commit_render(
                &self.renderer,
                &mut self.surface,
                &mut self.scratch,
                image,
                &settings,
            )?;
        }
        self.settings = settings;
        Ok(())
    }

    /// Drop the image and preview. Settings are kept.
    pub fn reset(&mut self) {
        self.image = None;
        self.surface = Surface::new();
        self.scratch = Surface::new();
        tracing::debug!("session reset");
    }

    /// The current settings.
    #[must_use]
    pub fn settings(&self) -> &WatermarkSettings {
        &self.settings
    }

    /// The loaded image, if any.
    #[must_use]
    pub fn image(&self) -> Option<&SourceImage> {
        self.image.as_ref()
    }

    /// The rendered preview, if an image is loaded.
    #[must_use]
    pub fn preview(&self) -> Option<&Surface> {
        self.image.as_ref().map(|_| &self.surface)
    }

    /// Whether export is currently allowed.
    #[must_use]
    pub fn can_export(&self) -> bool {
        self.image.is_some() && self.settings.has_watermark()
    }

    /// Encode the current preview.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExportUnavailable`] with no image or empty text, and
    /// [`Error::Encode`] if encoding fails.
    pub fn export(&self, format: ExportFormat) -> Result<ExportedFile> {
        if self.image.is_none() {
            return Err(Error::ExportUnavailable("no image loaded"));
        }
        if !self.settings.has_watermark() {
            return Err(Error::ExportUnavailable("watermark text is empty"));
        }
        let file = export::export_file(&self.surface, format)?;
        tracing::info!(
            file = %file.file_name,
            bytes = file.bytes.len(),
            "exported watermarked image"
        );
        Ok(file)
    }
}

/// Render into `scratch` and swap it into `preview` only on success.
fn commit_render(
    renderer: &Renderer,
    preview: &mut Surface,
    scratch: &mut Surface,
    image: &SourceImage,
    settings: &WatermarkSettings,
) -> Result<()> {
    if let Err(err) = renderer.render_into(scratch, image, settings) {
        tracing::warn!(error = %err, "render failed, keeping previous preview");
        return Err(err);
    }
    std::mem::swap(preview, scratch);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_upload(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn new_session_has_nothing_to_export() {
        let session = Session::new().unwrap();
        assert!(session.preview().is_none());
        assert!(!session.can_export());
        assert!(matches!(
            session.export(ExportFormat::Png),
            Err(Error::ExportUnavailable(_))
        ));
    }

    #[test]
    fn export_requires_text() {
        let mut session = Session::new().unwrap();
        session.upload(&png_upload(40, 30), "image/png").unwrap();
        assert!(session.preview().is_some());
        assert!(!session.can_export());

        session
            .set_settings(WatermarkSettings::with_text("SAMPLE"))
            .unwrap();
        assert!(session.can_export());
        let file = session.export(ExportFormat::Png).unwrap();
        assert_eq!(file.file_name, "watermarked.png");
        assert!(!file.bytes.is_empty());
    }

    #[test]
    fn rejected_upload_keeps_previous_image() {
        let mut session = Session::new().unwrap();
        session.upload(&png_upload(40, 30), "image/png").unwrap();

        let err = session.upload(b"hello", "text/plain").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
        let err = session.upload(b"garbage", "image/png").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));

        let image = session.image().unwrap();
        assert_eq!((image.width(), image.height()), (40, 30));
    }

    #[test]
    fn settings_change_rerenders_preview() {
        let mut session = Session::new().unwrap();
        session.upload(&png_upload(200, 150), "image/png").unwrap();
        let plain = session.preview().unwrap().clone();

        session
            .set_settings(WatermarkSettings::with_text("SAMPLE"))
            .unwrap();
        assert_ne!(session.preview().unwrap(), &plain);

        session.set_settings(WatermarkSettings::default()).unwrap();
        assert_eq!(session.preview().unwrap(), &plain);
    }

    #[test]
    fn failed_settings_change_keeps_previous_state() {
        let mut session = Session::new().unwrap();
        session.upload(&png_upload(100, 80), "image/png").unwrap();
        let plain = session.preview().unwrap().clone();

        // Nothing exportable before, so nothing exportable after.
        let err = session
            .set_settings(WatermarkSettings {
                font_size: 0.0,
                ..WatermarkSettings::with_text("CONFIDENTIAL")
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry(_)));
        assert!(session.settings().text.is_empty());
        assert!(!session.can_export());
        assert!(matches!(
            session.export(ExportFormat::Png),
            Err(Error::ExportUnavailable(_))
        ));

        session
            .set_settings(WatermarkSettings::with_text("SAMPLE"))
            .unwrap();
        let watermarked = session.preview().unwrap().clone();
        assert_ne!(watermarked, plain);

        let err = session
            .set_settings(WatermarkSettings {
                spacing: -10_000.0,
                ..WatermarkSettings::with_text("CONFIDENTIAL")
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry(_)));
        assert_eq!(session.settings().text, "SAMPLE");
        assert_eq!(session.preview().unwrap(), &watermarked);

        // Export still encodes the watermarked preview, never the bare image.
        assert!(session.can_export());
        let file = session.export(ExportFormat::Png).unwrap();
        let decoded = image::load_from_memory(&file.bytes).unwrap().to_rgba8();
        assert_eq!(&decoded, watermarked.pixels());
        assert_ne!(&decoded, plain.pixels());
    }

    #[test]
    fn failed_image_render_keeps_previous_image() {
        let mut session = Session::new().unwrap();
        // Stored without rendering while no image is loaded.
        session
            .set_settings(WatermarkSettings {
                font_size: 0.0,
                ..WatermarkSettings::with_text("CONFIDENTIAL")
            })
            .unwrap();

        let err = session
            .upload(&png_upload(40, 30), "image/png")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry(_)));
        assert!(session.image().is_none());
        assert!(session.preview().is_none());
        assert!(!session.can_export());

        session
            .set_settings(WatermarkSettings::with_text("SAMPLE"))
            .unwrap();
        session.upload(&png_upload(40, 30), "image/png").unwrap();
        assert!(session.can_export());
    }

    #[test]
    fn reset_releases_image_but_keeps_settings() {
        let mut session = Session::new().unwrap();
        session
            .set_settings(WatermarkSettings::with_text("KEEP"))
            .unwrap();
        session.upload(&png_upload(20, 20), "image/png").unwrap();

        session.reset();
        assert!(session.image().is_none());
        assert!(session.preview().is_none());
        assert_eq!(session.settings().text, "KEEP");
    }
}
