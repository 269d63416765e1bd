//! Drive the whole capture pipeline with a synthetic camera and a fixed
//! location, then upload the stamped photo if an endpoint is configured.
//!
//! ```sh
//! GEOSTAMP_API_BASE=https://api.example.com GEOSTAMP_TOKEN=... \
//!     cargo run --example capture_and_upload
//! ```
//!
//! Without `GEOSTAMP_API_BASE` the stamped photo is only written to
//! `stamped.jpeg` in the working directory.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use geostamp::{
    CameraError, CameraSource, CameraStream, CapturePipeline, FacingMode, HttpUploader,
    LocationError, LocationFix, LocationRequest, LocationSource, NominatimResolver,
    PermissionState, Phase, RawFrame, Resolution,
};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

/// Renders a gradient test card instead of talking to real hardware.
struct SyntheticCamera;

struct SyntheticStream {
    facing: FacingMode,
    hint: Resolution,
}

#[async_trait]
impl CameraSource for SyntheticCamera {
    async fn permission(&self) -> PermissionState {
        PermissionState::Granted
    }

    async fn open(
        &self,
        facing: FacingMode,
        hint: Resolution,
    ) -> Result<Box<dyn CameraStream>, CameraError> {
        Ok(Box::new(SyntheticStream { facing, hint }))
    }
}

#[async_trait]
impl CameraStream for SyntheticStream {
    fn facing(&self) -> FacingMode {
        self.facing
    }

    async fn still_frame(&mut self) -> Result<RawFrame, CameraError> {
        let (width, height) = (self.hint.width, self.hint.height);
        let canvas = RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                (x * 255 / width) as u8,
                (y * 255 / height) as u8,
                160,
            ])
        });
        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, 90)
            .encode_image(&canvas)
            .map_err(|err| CameraError::Frame(err.to_string()))?;
        Ok(RawFrame {
            jpeg: out.into_inner(),
        })
    }
}

/// Always reports the same spot with a sharp accuracy.
struct FixedLocator {
    latitude: f64,
    longitude: f64,
}

#[async_trait]
impl LocationSource for FixedLocator {
    async fn permission(&self) -> PermissionState {
        PermissionState::Granted
    }

    async fn current_position(
        &self,
        _request: LocationRequest,
    ) -> Result<LocationFix, LocationError> {
        Ok(LocationFix {
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy_m: 8.0,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let api_base = std::env::var("GEOSTAMP_API_BASE").ok();
    let auth_token = std::env::var("GEOSTAMP_TOKEN").ok();

    let uploader = HttpUploader::builder()
        .base_url(
            api_base
                .clone()
                .unwrap_or_else(|| "http://localhost:8000".to_string()),
        )
        .maybe_auth_token(auth_token)
        .build()?;

    let pipeline = CapturePipeline::builder()
        .camera(Arc::new(SyntheticCamera))
        .locator(Arc::new(FixedLocator {
            latitude: 40.820888,
            longitude: 14.422817,
        }))
        .resolver(Arc::new(NominatimResolver::builder().build()?))
        .uploader(Arc::new(uploader))
        .build()?;

    if pipeline.initialize().await != Phase::Granted {
        return Err("camera or location access denied".into());
    }

    while !pipeline.ready_to_capture() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let location = pipeline.current_location().map(|sample| sample.summary());
    let address = pipeline.current_address().map(|address| address.text);
    info!(?location, ?address, "ready to capture");

    pipeline.capture().await?;
    let artifact = pipeline.artifact().ok_or("capture produced no artifact")?;
    std::fs::write("stamped.jpeg", &artifact.stamped_jpeg)?;
    println!("wrote stamped.jpeg ({} bytes)", artifact.stamped_jpeg.len());

    if api_base.is_some() {
        match pipeline.confirm().await {
            Ok(_) => println!("upload accepted"),
            Err(err) => eprintln!("upload failed: {err}"),
        }
    } else {
        println!("GEOSTAMP_API_BASE not set, skipping upload");
    }

    pipeline.close().await;
    Ok(())
}
