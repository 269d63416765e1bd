use chrono::{DateTime, Local};

use crate::camera::{FacingMode, RawFrame};
use crate::geocode::ResolvedAddress;
use crate::location::LocationSample;

/// The finished, upload-ready result of one capture action.
///
/// One-shot: discarded by retake, handed to the uploader by confirm. Kept
/// around after a failed upload so the user can retry without recapturing.
#[derive(Debug, Clone)]
pub struct CapturedArtifact {
    /// The still frame exactly as the camera produced it.
    pub raw_frame: RawFrame,
    /// The frame with the info band burned in, JPEG encoded.
    pub stamped_jpeg: Vec<u8>,
    /// The location sample the overlay was rendered from.
    pub location: LocationSample,
    /// The address the overlay was rendered from.
    pub address: ResolvedAddress,
    pub captured_at: DateTime<Local>,
    pub facing: FacingMode,
}

impl CapturedArtifact {
    /// Multipart file name for the upload, `photo_<unix millis>.jpeg`.
    pub fn upload_filename(&self) -> String {
        format!("photo_{}.jpeg", self.captured_at.timestamp_millis())
    }
}
