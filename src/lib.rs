//! Overlay a repeating, rotated, semi-transparent text watermark on images.
//!
//! The text is tiled on a grid that spans the canvas diagonal in both
//! directions, then the whole grid is rotated about the canvas center, so the
//! pattern covers every pixel at any angle. Output is encoded as PNG, JPEG or
//! WebP.
//!
//! # Quick Start
//!
//! ```no_run
//! use text_watermark::{export_surface, ExportFormat, Renderer, SourceImage, WatermarkSettings};
//!
//! let renderer = Renderer::new().expect("failed to load font");
//! let image = SourceImage::open("photo.jpg".as_ref()).unwrap();
//! let settings = WatermarkSettings::with_text("CONFIDENTIAL");
//! let surface = renderer.render(&image, &settings).unwrap();
//! let png = export_surface(&surface, ExportFormat::Png).unwrap();
//! std::fs::write("watermarked.png", png).unwrap();
//! ```
//!
//! # Sessions
//!
//! [`Session`] keeps an uploaded image and the current settings together and
//! re-renders the preview after every change, the way an interactive editor
//! would drive the renderer.
//!
//! ```no_run
//! use text_watermark::{ExportFormat, Session, WatermarkSettings};
//!
//! let mut session = Session::new().unwrap();
//! let bytes = std::fs::read("photo.png").unwrap();
//! session.upload(&bytes, "image/png").unwrap();
//! session.set_settings(WatermarkSettings::with_text("DRAFT")).unwrap();
//! let file = session.export(ExportFormat::Jpeg).unwrap();
//! file.save_in(".".as_ref()).unwrap();
//! ```

#![deny(missing_docs)]

pub mod error;
pub mod export;
mod render;
mod session;
pub mod settings;
mod source;
pub mod text;
pub mod tiling;

pub use error::{Error, Result};
pub use export::{export_file, export_many, export_surface, ExportFormat, ExportedFile};
pub use render::{Renderer, Surface};
pub use session::Session;
pub use settings::{Color, WatermarkSettings};
pub use source::{is_supported_image, MediaType, SourceImage};
pub use text::TextFont;
pub use tiling::{Anchor, TilePlan};
