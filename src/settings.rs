//! Watermark style settings and color parsing.
//!
//! [`WatermarkSettings`] is a plain value: callers replace it wholesale on every
//! control change and pass it into the renderer explicitly. The documented
//! ranges are what interactive controls enforce; the renderer accepts values
//! outside them, but that behavior is untested.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Font size range in pixels, step 1.
pub const FONT_SIZE_RANGE: RangeInclusive<f32> = 12.0..=72.0;
/// Opacity range, step 0.05.
pub const OPACITY_RANGE: RangeInclusive<f32> = 0.1..=0.8;
/// Rotation range in degrees, step 5.
pub const ROTATION_RANGE: RangeInclusive<f32> = -90.0..=90.0;
/// Spacing range in pixels, step 10.
pub const SPACING_RANGE: RangeInclusive<f32> = 50.0..=300.0;

fn default_font_size() -> f32 {
    24.0
}

fn default_opacity() -> f32 {
    0.3
}

fn default_rotation() -> f32 {
    -30.0
}

fn default_spacing() -> f32 {
    100.0
}

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Color {
    /// Create a color from its channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Black, the default watermark color.
    #[must_use]
    pub const fn black() -> Self {
        Self::new(0, 0, 0)
    }

    /// Parse `#RGB` or `#RRGGBB` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidColor`] for anything else.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let invalid = || Error::InvalidColor(hex.to_string());
        let digits = hex.strip_prefix('#').ok_or_else(invalid)?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
        match digits.len() {
            // #RGB: each digit doubled, 0xA -> 0xAA
            3 => Ok(Self::new(
                channel(&digits[0..1])? * 17,
                channel(&digits[1..2])? * 17,
                channel(&digits[2..3])? * 17,
            )),
            6 => Ok(Self::new(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Style of the tiled text watermark.
///
/// Serialized with camelCase keys (`fontSize`); missing keys take their
/// defaults, so `{"text": "DRAFT"}` is a complete record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatermarkSettings {
    /// Text to tile. Empty text disables watermarking.
    pub text: String,
    /// Font size in pixels.
    pub font_size: f32,
    /// Alpha applied uniformly to every tile.
    pub opacity: f32,
    /// Rotation of the whole grid about the canvas center, degrees clockwise.
    pub rotation: f32,
    /// Extra gap between tiles on both axes, pixels.
    pub spacing: f32,
    /// Fill color of the text.
    pub color: Color,
}

impl Default for WatermarkSettings {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size: default_font_size(),
            opacity: default_opacity(),
            rotation: default_rotation(),
            spacing: default_spacing(),
            color: Color::black(),
        }
    }
}

impl WatermarkSettings {
    /// Default settings with the given text.
    #[must_use]
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Whether rendering these settings draws any tiles.
    #[must_use]
    pub fn has_watermark(&self) -> bool {
        !self.text.is_empty()
    }

    /// Parse a JSON settings record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Settings`] on malformed JSON or an invalid color.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Copy of these settings with every numeric field clamped into its
    /// control range and snapped to the control step.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            text: self.text.clone(),
            font_size: snap(self.font_size, &FONT_SIZE_RANGE, 1.0),
            opacity: snap(self.opacity, &OPACITY_RANGE, 0.05),
            rotation: snap(self.rotation, &ROTATION_RANGE, 5.0),
            spacing: snap(self.spacing, &SPACING_RANGE, 10.0),
            color: self.color,
        }
    }

    /// Names of the fields that fall outside their control ranges.
    ///
    /// Out-of-range values still render; this only reports them.
    #[must_use]
    pub fn out_of_range(&self) -> Vec<&'static str> {
        let checks = [
            ("fontSize", FONT_SIZE_RANGE.contains(&self.font_size)),
            ("opacity", OPACITY_RANGE.contains(&self.opacity)),
            ("rotation", ROTATION_RANGE.contains(&self.rotation)),
            ("spacing", SPACING_RANGE.contains(&self.spacing)),
        ];
        checks
            .into_iter()
            .filter_map(|(name, ok)| (!ok).then_some(name))
            .collect()
    }
}

/// Clamp into `range`, then round to the nearest multiple of `step` measured
/// from the range start.
fn snap(value: f32, range: &RangeInclusive<f32>, step: f32) -> f32 {
    let (lo, hi) = (*range.start(), *range.end());
    if !value.is_finite() {
        return lo;
    }
    let clamped = value.clamp(lo, hi);
    let snapped = lo + ((clamped - lo) / step).round() * step;
    // Two decimals is enough for every step in use and keeps 0.1 + n*0.05 tidy.
    ((snapped * 100.0).round() / 100.0).clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_match_control_defaults() {
        let s = WatermarkSettings::default();
        assert!(s.text.is_empty());
        assert!((s.font_size - 24.0).abs() < f32::EPSILON);
        assert!((s.opacity - 0.3).abs() < f32::EPSILON);
        assert!((s.rotation + 30.0).abs() < f32::EPSILON);
        assert!((s.spacing - 100.0).abs() < f32::EPSILON);
        assert_eq!(s.color, Color::black());
        assert!(!s.has_watermark());
    }

    #[test]
    fn parse_hex_color_long_and_short_forms() {
        assert_eq!(Color::from_hex("#FF0000").unwrap(), Color::new(255, 0, 0));
        assert_eq!(Color::from_hex("#00ff00").unwrap(), Color::new(0, 255, 0));
        assert_eq!(Color::from_hex("#00F").unwrap(), Color::new(0, 0, 255));
        assert_eq!(Color::from_hex("#abc").unwrap(), Color::new(170, 187, 204));
    }

    #[test]
    fn parse_hex_color_rejects_malformed_input() {
        assert!(Color::from_hex("FF0000").is_err());
        assert!(Color::from_hex("#FF00").is_err());
        assert!(Color::from_hex("#GGGGGG").is_err());
        assert!(Color::from_hex("#+1+2+3").is_err());
        assert!(Color::from_hex("").is_err());
    }

    #[test]
    fn color_displays_as_lowercase_hex() {
        assert_eq!(Color::new(255, 128, 0).to_string(), "#ff8000");
    }

    #[test]
    fn settings_json_uses_camel_case_and_fills_defaults() {
        let s = WatermarkSettings::from_json(r##"{"text":"DRAFT","fontSize":36,"color":"#fff"}"##)
            .unwrap();
        assert_eq!(s.text, "DRAFT");
        assert!((s.font_size - 36.0).abs() < f32::EPSILON);
        assert_eq!(s.color, Color::new(255, 255, 255));
        assert!((s.spacing - 100.0).abs() < f32::EPSILON);

        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"fontSize\":36"));
        assert!(json.contains("\"#ffffff\""));
    }

    #[test]
    fn settings_json_rejects_bad_color() {
        let err = WatermarkSettings::from_json(r#"{"color":"blue"}"#).unwrap_err();
        assert!(matches!(err, Error::Settings(_)));
    }

    #[test]
    fn clamped_snaps_to_control_steps() {
        let s = WatermarkSettings {
            text: "x".into(),
            font_size: 200.0,
            opacity: 0.33,
            rotation: -93.0,
            spacing: 12.0,
            color: Color::black(),
        }
        .clamped();
        assert!((s.font_size - 72.0).abs() < f32::EPSILON);
        assert!((s.opacity - 0.35).abs() < 1e-6);
        assert!((s.rotation + 90.0).abs() < f32::EPSILON);
        assert!((s.spacing - 50.0).abs() < f32::EPSILON);
    }

    #[test]
    fn out_of_range_reports_offending_fields() {
        assert!(WatermarkSettings::default().out_of_range().is_empty());

        let s = WatermarkSettings {
            opacity: 1.0,
            spacing: 0.0,
            ..WatermarkSettings::default()
        };
        assert_eq!(s.out_of_range(), vec!["opacity", "spacing"]);
    }
}
