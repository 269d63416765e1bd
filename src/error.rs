use thiserror::Error;

/// The primary error type for the geostamp crate.
#[derive(Error, Debug)]
pub enum GeostampError {
    #[error("camera access failed: {0}")]
    Camera(#[from] crate::camera::CameraError),

    #[error("location read failed: {0}")]
    Location(#[from] crate::location::LocationError),

    #[error("address resolution failed: {0}")]
    Geocode(#[from] crate::geocode::GeocodeError),

    #[error("image compositing failed: {0}")]
    Overlay(#[from] crate::overlay::OverlayError),

    #[error("upload failed: {0}")]
    Upload(#[from] crate::upload::UploadError),

    // --- Pipeline state errors ---
    #[error("capture requires granted camera and location permissions")]
    NotGranted,

    #[error("capture is not ready: {0}")]
    NotReady(&'static str),

    #[error("no captured artifact to act on")]
    NoArtifact,
}
