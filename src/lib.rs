//! # Geostamp
//!
//! Capture photos, stamp them with where and when they were taken, and hand
//! them to a photo service.
//!
//! This crate is the headless core of a photo capture-and-geotagging client:
//! it owns the camera and geolocation permission lifecycle, keeps a best-known
//! location up to date, resolves coordinates into a human-readable address,
//! burns an info band onto every captured frame, and uploads the result.
//!
//! ## Key Features
//!
//! - **Permission Lifecycle**: Checks camera and geolocation access up front
//!   and probes the camera before the capture flow is presented; a denial is
//!   terminal for the session.
//! - **Location Polling**: Reads the position immediately and then on a fixed
//!   cadence, discarding imprecise fixes and keeping the sharpest recent one.
//! - **Address Resolution**: Queries a reverse geocoder at three detail
//!   levels concurrently and picks the best result, degrading to a
//!   coordinate label instead of failing.
//! - **Overlay Stamping**: Deterministically composites coordinates, address,
//!   timestamp and camera label onto the captured frame.
//! - **Upload Handoff**: Ships the stamped JPEG with its metadata as a
//!   multipart request; a rejected upload keeps the artifact for retry.
//!
//! ## Usage
//!
//! Camera and geolocation are trait seams ([`CameraSource`],
//! [`LocationSource`]) implemented by the embedding application; the network
//! collaborators come ready-made.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use geostamp::{CapturePipeline, HttpUploader, NominatimResolver, Phase};
//!
//! # async fn run(
//! #     camera: Arc<dyn geostamp::CameraSource>,
//! #     locator: Arc<dyn geostamp::LocationSource>,
//! # ) -> Result<(), geostamp::GeostampError> {
//! let pipeline = CapturePipeline::builder()
//!     .camera(camera)
//!     .locator(locator)
//!     .resolver(Arc::new(NominatimResolver::builder().build()?))
//!     .uploader(Arc::new(
//!         HttpUploader::builder()
//!             .base_url("https://api.example.com".to_string())
//!             .auth_token("bearer-token".to_string())
//!             .build()?,
//!     ))
//!     .build()?;
//!
//! if pipeline.initialize().await == Phase::Granted {
//!     while !pipeline.ready_to_capture() {
//!         tokio::time::sleep(std::time::Duration::from_millis(250)).await;
//!     }
//!     pipeline.capture().await?;
//!     pipeline.confirm().await?;
//! }
//! pipeline.close().await;
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod camera;
pub mod error;
pub mod geocode;
pub mod location;
pub mod overlay;
pub mod pipeline;
pub mod upload;

pub use artifact::CapturedArtifact;
pub use camera::{CameraError, CameraSource, CameraStream, FacingMode, PermissionState, RawFrame, Resolution};
pub use error::GeostampError;
pub use geocode::{AddressResolver, GeocodeError, NominatimResolver, ResolvedAddress};
pub use location::{LocationError, LocationFix, LocationRequest, LocationSample, LocationSource};
pub use overlay::{OverlayError, OverlayStamper};
pub use pipeline::{CapturePipeline, Phase, ViewMode};
pub use upload::{HttpUploader, PhotoUploader, UploadError, UploadReceipt};
