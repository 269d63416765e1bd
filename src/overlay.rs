use ab_glyph::{FontRef, PxScale};
use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use std::io::Cursor;
use thiserror::Error;

use crate::camera::{FacingMode, RawFrame};
use crate::geocode::ResolvedAddress;
use crate::location::LocationSample;

static FONT_BYTES: &[u8] = include_bytes!("../assets/fonts/DejaVuSans-Bold.ttf");

/// Frames at most this wide get the compact band layout.
const COMPACT_MAX_WIDTH: u32 = 1280;
const JPEG_QUALITY: u8 = 90;
const MAX_ADDRESS_CHARS: usize = 60;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("failed to decode the captured frame")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode the stamped image")]
    Encode(#[source] image::ImageError),

    #[error("the bundled overlay font is invalid")]
    Font,
}

/// Band geometry and type metrics, derived from the frame dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
struct BandMetrics {
    band_top: u32,
    font_px: f32,
    line_height: f32,
    padding: i32,
    compact: bool,
}

impl BandMetrics {
    fn for_frame(width: u32, height: u32) -> Self {
        let compact = width <= COMPACT_MAX_WIDTH;
        let band_fraction = if compact { 0.25 } else { 0.20 };
        let font_px = if compact {
            (width as f32 / 80.0).max(16.0)
        } else {
            (width as f32 / 60.0).max(24.0)
        };
        let band_height = (height as f32 * band_fraction).round() as u32;
        Self {
            band_top: height.saturating_sub(band_height),
            font_px,
            line_height: font_px * 1.2,
            padding: if compact { 15 } else { 20 },
            compact,
        }
    }
}

/// Burns the info band onto captured frames.
///
/// The band covers the bottom fifth of the frame (a quarter on compact
/// frames) and carries four lines: coordinates, the resolved address, the
/// capture date and time, and which camera was used.
pub struct OverlayStamper {
    font: FontRef<'static>,
}

impl OverlayStamper {
    pub fn new() -> Result<Self, OverlayError> {
        let font = FontRef::try_from_slice(FONT_BYTES).map_err(|_| OverlayError::Font)?;
        Ok(Self { font })
    }

    /// Composite the info band onto a raw frame and encode the result as
    /// JPEG. Deterministic: identical inputs produce identical bytes.
    pub fn stamp(
        &self,
        frame: &RawFrame,
        location: &LocationSample,
        address: &ResolvedAddress,
        taken_at: DateTime<Local>,
        facing: FacingMode,
    ) -> Result<Vec<u8>, OverlayError> {
        let decoded = image::load_from_memory(&frame.jpeg).map_err(OverlayError::Decode)?;
        let mut canvas: RgbImage = decoded.to_rgb8();
        let (width, height) = canvas.dimensions();
        let metrics = BandMetrics::for_frame(width, height);

        darken_band(&mut canvas, metrics.band_top);

        let lines = [
            format!(
                "Lat: {:.6}, Lon: {:.6}",
                location.latitude, location.longitude
            ),
            format!("Address: {}", ellipsize(&address.text, metrics.compact)),
            format!(
                "Date: {} | Time: {}",
                format_date(taken_at, metrics.compact),
                taken_at.format("%I:%M %p")
            ),
            format!("Camera: {}", facing.label()),
        ];

        let scale = PxScale::from(metrics.font_px);
        let white = Rgb([255u8, 255, 255]);
        let mut line_top = metrics.band_top as f32 + (metrics.line_height - metrics.font_px);
        for line in &lines {
            draw_text_mut(
                &mut canvas,
                white,
                metrics.padding,
                line_top.round() as i32,
                scale,
                &self.font,
                line,
            );
            line_top += metrics.line_height;
        }

        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
            .encode_image(&canvas)
            .map_err(OverlayError::Encode)?;
        Ok(out.into_inner())
    }
}

/// Composite 60% black over every pixel from `band_top` down.
fn darken_band(canvas: &mut RgbImage, band_top: u32) {
    for (_, y, pixel) in canvas.enumerate_pixels_mut() {
        if y >= band_top {
            let Rgb([r, g, b]) = *pixel;
            *pixel = Rgb([scale_channel(r), scale_channel(g), scale_channel(b)]);
        }
    }
}

fn scale_channel(channel: u8) -> u8 {
    (f32::from(channel) * 0.4).round() as u8
}

/// Compact outputs truncate long addresses with an ellipsis.
fn ellipsize(address: &str, compact: bool) -> String {
    if compact && address.chars().count() > MAX_ADDRESS_CHARS {
        let truncated: String = address.chars().take(MAX_ADDRESS_CHARS - 3).collect();
        format!("{truncated}...")
    } else {
        address.to_string()
    }
}

fn format_date(taken_at: DateTime<Local>, compact: bool) -> String {
    if compact {
        taken_at.format("%b %-d, %Y").to_string()
    } else {
        taken_at.format("%-m/%-d/%Y").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_frame(width: u32, height: u32) -> RawFrame {
        let canvas = RgbImage::from_pixel(width, height, Rgb([100u8, 150, 200]));
        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, 90)
            .encode_image(&canvas)
            .unwrap();
        RawFrame {
            jpeg: out.into_inner(),
        }
    }

    fn test_sample() -> LocationSample {
        LocationSample {
            latitude: 40.820888,
            longitude: 14.422817,
            accuracy_m: 12.0,
            captured_at: chrono::Utc.with_ymd_and_hms(2025, 6, 3, 18, 30, 0).unwrap(),
        }
    }

    fn test_taken_at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 3, 20, 30, 0).unwrap()
    }

    #[test]
    fn stamping_is_deterministic() {
        let stamper = OverlayStamper::new().unwrap();
        let frame = test_frame(640, 480);
        let address = ResolvedAddress::resolved("Via Vesuvio, Massa di Somma, Campania, Italy");

        let first = stamper
            .stamp(
                &frame,
                &test_sample(),
                &address,
                test_taken_at(),
                FacingMode::Environment,
            )
            .unwrap();
        let second = stamper
            .stamp(
                &frame,
                &test_sample(),
                &address,
                test_taken_at(),
                FacingMode::Environment,
            )
            .unwrap();

        assert!(!first.is_empty());
        assert_eq!(first, second, "identical inputs must produce identical bytes");
    }

    #[test]
    fn stamping_keeps_the_frame_dimensions_and_darkens_the_band() {
        let stamper = OverlayStamper::new().unwrap();
        let frame = test_frame(640, 480);
        let address = ResolvedAddress::resolved("Massa di Somma, Italy");

        let stamped = stamper
            .stamp(
                &frame,
                &test_sample(),
                &address,
                test_taken_at(),
                FacingMode::User,
            )
            .unwrap();
        let decoded = image::load_from_memory(&stamped).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (640, 480));

        // Untouched area keeps the original fill; the band is much darker.
        let above = decoded.get_pixel(5, 5);
        let inside = decoded.get_pixel(5, 478);
        assert!(above[2] > 150, "area above the band should stay bright");
        assert!(inside[2] < 110, "band pixels should be darkened");
    }

    #[test]
    fn wide_frames_are_stamped_with_the_wide_layout() {
        let metrics = BandMetrics::for_frame(1920, 1080);
        assert!(!metrics.compact);
        assert_eq!(metrics.band_top, 1080 - 216);
        assert_eq!(metrics.font_px, 32.0);
        assert_eq!(metrics.padding, 20);

        let stamper = OverlayStamper::new().unwrap();
        let stamped = stamper.stamp(
            &test_frame(1920, 1080),
            &test_sample(),
            &ResolvedAddress::resolved("Massa di Somma, Italy"),
            test_taken_at(),
            FacingMode::Environment,
        );
        assert!(stamped.is_ok());
    }

    #[test]
    fn compact_frames_use_the_larger_band_and_floor_font() {
        let metrics = BandMetrics::for_frame(640, 480);
        assert!(metrics.compact);
        assert_eq!(metrics.band_top, 480 - 120);
        assert_eq!(metrics.font_px, 16.0);
        assert_eq!(metrics.padding, 15);
    }

    #[test]
    fn long_addresses_are_ellipsized_only_on_compact_outputs() {
        let long = "a very long street name, a neighbourhood, a suburb, a town, a country";
        assert_eq!(long.chars().count(), 69);

        let compact = ellipsize(long, true);
        assert_eq!(compact.chars().count(), MAX_ADDRESS_CHARS);
        assert!(compact.ends_with("..."));

        assert_eq!(ellipsize(long, false), long);
        assert_eq!(ellipsize("short", true), "short");
    }

    #[test]
    fn dates_format_per_form_factor() {
        let taken_at = test_taken_at();
        assert_eq!(format_date(taken_at, true), "Jun 3, 2025");
        assert_eq!(format_date(taken_at, false), "6/3/2025");
        assert_eq!(taken_at.format("%I:%M %p").to_string(), "08:30 PM");
    }
}
