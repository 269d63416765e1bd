use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which physical camera a capture binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// The outward (rear) camera.
    Environment,
    /// The inward (selfie) camera.
    User,
}

impl FacingMode {
    /// The other camera.
    pub fn toggled(self) -> Self {
        match self {
            FacingMode::Environment => FacingMode::User,
            FacingMode::User => FacingMode::Environment,
        }
    }

    /// The live preview is mirrored horizontally only for the selfie camera.
    pub fn is_mirrored(self) -> bool {
        matches!(self, FacingMode::User)
    }

    /// Label shown in the HUD and burned into the overlay.
    pub fn label(self) -> &'static str {
        match self {
            FacingMode::Environment => "Back Camera",
            FacingMode::User => "Front Camera",
        }
    }

    /// Wire value sent with uploads.
    pub fn as_param(self) -> &'static str {
        match self {
            FacingMode::Environment => "back",
            FacingMode::User => "front",
        }
    }
}

/// Resolution hint passed to the camera when acquiring a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// 1280x720, the hint for compact targets.
    pub const HD: Resolution = Resolution {
        width: 1280,
        height: 720,
    };

    /// 1920x1080, the hint for larger targets.
    pub const FULL_HD: Resolution = Resolution {
        width: 1920,
        height: 1080,
    };
}

/// A still frame straight from the camera, as encoded JPEG bytes.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub jpeg: Vec<u8>,
}

/// Browser-style permission state for a capability.
///
/// `Prompt` does not block the pipeline; only an explicit denial does. The
/// probe stream request is the authoritative test for camera access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Prompt,
    Denied,
}

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("camera access was denied")]
    AccessDenied,

    #[error("camera device is busy")]
    DeviceBusy,

    #[error("no camera device available")]
    NoDevice,

    #[error("failed to acquire camera stream: {0}")]
    Acquisition(String),

    #[error("failed to capture still frame: {0}")]
    Frame(String),
}

/// The device camera seam.
#[async_trait]
pub trait CameraSource: Send + Sync {
    /// Current permission state for camera access.
    async fn permission(&self) -> PermissionState;

    /// Acquire a live stream bound to one physical camera.
    ///
    /// Callers must drop any previously acquired stream first; at most one
    /// stream is active per facing mode.
    async fn open(
        &self,
        facing: FacingMode,
        hint: Resolution,
    ) -> Result<Box<dyn CameraStream>, CameraError>;
}

/// A live device stream. Dropping the stream stops the underlying tracks.
#[async_trait]
pub trait CameraStream: Send + Sync {
    /// Which physical camera this stream is bound to.
    fn facing(&self) -> FacingMode;

    /// Grab a single still frame from the live stream.
    async fn still_frame(&mut self) -> Result<RawFrame, CameraError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_mode_labels_and_params() {
        assert_eq!(FacingMode::Environment.label(), "Back Camera");
        assert_eq!(FacingMode::User.label(), "Front Camera");
        assert_eq!(FacingMode::Environment.as_param(), "back");
        assert_eq!(FacingMode::User.as_param(), "front");
    }

    #[test]
    fn only_the_selfie_camera_is_mirrored() {
        assert!(FacingMode::User.is_mirrored());
        assert!(!FacingMode::Environment.is_mirrored());
    }

    #[test]
    fn toggling_switches_between_the_two_cameras() {
        assert_eq!(FacingMode::Environment.toggled(), FacingMode::User);
        assert_eq!(FacingMode::User.toggled(), FacingMode::Environment);
    }
}
