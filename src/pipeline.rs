use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use bon::bon;
use chrono::{Local, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::artifact::CapturedArtifact;
use crate::camera::{CameraSource, CameraStream, FacingMode, PermissionState, Resolution};
use crate::error::GeostampError;
use crate::geocode::{AddressResolver, ResolvedAddress};
use crate::location::{self, LocationRequest, LocationSample, LocationSource};
use crate::overlay::OverlayStamper;
use crate::upload::{PhotoUploader, UploadReceipt};

/// Permission lifecycle of the capture flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Capability checks are still running.
    Checking,
    /// Camera and geolocation are usable; preview and capture operate here.
    Granted,
    /// Terminal until the pipeline is rebuilt.
    Denied,
}

/// Which of the two screens the capture flow is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Camera,
    Preview,
}

struct LiveState {
    phase: Phase,
    view: ViewMode,
    facing: FacingMode,
    location: Option<LocationSample>,
    address: Option<ResolvedAddress>,
    /// Bumped for every accepted sample; address results arriving with an
    /// older generation are discarded.
    generation: u64,
    artifact: Option<CapturedArtifact>,
    upload_error: Option<String>,
}

/// The capture pipeline controller.
///
/// Owns the permission lifecycle, the camera stream, the location poll loop,
/// address resolution dispatch, and the capture, retake, confirm state
/// machine. Collaborators are injected through trait seams; live state is
/// readable at any time through the accessor methods.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use geostamp::{CapturePipeline, GeostampError, HttpUploader, NominatimResolver, Phase};
/// # async fn run(
/// #     camera: Arc<dyn geostamp::CameraSource>,
/// #     locator: Arc<dyn geostamp::LocationSource>,
/// # ) -> Result<(), GeostampError> {
/// let pipeline = CapturePipeline::builder()
///     .camera(camera)
///     .locator(locator)
///     .resolver(Arc::new(NominatimResolver::builder().build()?))
///     .uploader(Arc::new(
///         HttpUploader::builder()
///             .base_url("https://api.example.com".to_string())
///             .build()?,
///     ))
///     .build()?;
/// if pipeline.initialize().await == Phase::Granted {
///     // wait for pipeline.ready_to_capture(), then:
///     pipeline.capture().await?;
///     pipeline.confirm().await?;
/// }
/// pipeline.close().await;
/// # Ok(())
/// # }
/// ```
pub struct CapturePipeline {
    weak: Weak<CapturePipeline>,
    camera: Arc<dyn CameraSource>,
    locator: Arc<dyn LocationSource>,
    resolver: Arc<dyn AddressResolver>,
    uploader: Arc<dyn PhotoUploader>,
    stamper: OverlayStamper,
    resolution: Resolution,
    accuracy_limit_m: f64,
    poll_interval: Duration,
    read_timeout: Duration,
    max_fix_age: Duration,
    state: Mutex<LiveState>,
    stream: tokio::sync::Mutex<Option<Box<dyn CameraStream>>>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

#[bon]
impl CapturePipeline {
    /// Constructs a pipeline via a builder pattern.
    ///
    /// # Builder Arguments
    ///
    /// * `camera: Arc<dyn CameraSource>` - The device camera.
    /// * `locator: Arc<dyn LocationSource>` - The geolocation source.
    /// * `resolver: Arc<dyn AddressResolver>` - Reverse geocoder, e.g.
    ///   [`crate::NominatimResolver`].
    /// * `uploader: Arc<dyn PhotoUploader>` - The upload endpoint, e.g.
    ///   [`crate::HttpUploader`].
    /// * `resolution: Resolution` - (Default: [`Resolution::HD`]) Hint passed
    ///   to the camera when acquiring streams.
    /// * `accuracy_limit_m: f64` - (Default: `100.0`) Fixes less accurate
    ///   than this are discarded outright.
    /// * `poll_interval: Duration` - (Default: 10s) Cadence of location
    ///   reads while the flow is active.
    /// * `read_timeout: Duration` - (Default: 10s) Timeout for a single
    ///   location read.
    /// * `max_fix_age: Duration` - (Default: 30s) Oldest cached fix a read
    ///   may reuse.
    /// * `initial_facing: FacingMode` - (Default: `Environment`) Camera the
    ///   flow starts on.
    ///
    /// # Errors
    ///
    /// Fails if the bundled overlay font cannot be loaded.
    #[builder]
    pub fn new(
        camera: Arc<dyn CameraSource>,
        locator: Arc<dyn LocationSource>,
        resolver: Arc<dyn AddressResolver>,
        uploader: Arc<dyn PhotoUploader>,
        #[builder(default = Resolution::HD)] resolution: Resolution,
        #[builder(default = 100.0)] accuracy_limit_m: f64,
        #[builder(default = Duration::from_secs(10))] poll_interval: Duration,
        #[builder(default = Duration::from_secs(10))] read_timeout: Duration,
        #[builder(default = Duration::from_secs(30))] max_fix_age: Duration,
        #[builder(default = FacingMode::Environment)] initial_facing: FacingMode,
    ) -> Result<Arc<Self>, GeostampError> {
        let stamper = OverlayStamper::new()?;
        Ok(Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            camera,
            locator,
            resolver,
            uploader,
            stamper,
            resolution,
            accuracy_limit_m,
            poll_interval,
            read_timeout,
            max_fix_age,
            state: Mutex::new(LiveState {
                phase: Phase::Checking,
                view: ViewMode::Camera,
                facing: initial_facing,
                location: None,
                address: None,
                generation: 0,
                artifact: None,
                upload_error: None,
            }),
            stream: tokio::sync::Mutex::new(None),
            poll_task: Mutex::new(None),
        }))
    }

    /// Runs the capability checks and, on success, starts live polling.
    ///
    /// Both permissions are queried first; an explicit denial of either is
    /// terminal. Otherwise a probe stream is requested with the selfie
    /// camera, and any acquisition failure (busy device, cancelled prompt,
    /// missing hardware) also lands in [`Phase::Denied`]. On success the
    /// poll loop starts with an immediate location read.
    pub async fn initialize(&self) -> Phase {
        let camera_permission = self.camera.permission().await;
        let location_permission = self.locator.permission().await;
        if camera_permission == PermissionState::Denied
            || location_permission == PermissionState::Denied
        {
            warn!(
                ?camera_permission,
                ?location_permission,
                "capability denied before probe"
            );
            self.state().phase = Phase::Denied;
            return Phase::Denied;
        }

        // Probe with the selfie camera so both cameras are known to work.
        match self.camera.open(FacingMode::User, self.resolution).await {
            Ok(probe) => drop(probe),
            Err(err) => {
                warn!(%err, "camera probe failed");
                self.state().phase = Phase::Denied;
                return Phase::Denied;
            }
        }

        info!("camera and location access granted");
        self.state().phase = Phase::Granted;
        self.spawn_poll_task();
        Phase::Granted
    }

    fn spawn_poll_task(&self) {
        let weak = self.weak.clone();
        let interval = self.poll_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(pipeline) = weak.upgrade() else {
                    break;
                };
                pipeline.poll_location_once().await;
            }
        });
        if let Some(previous) = self.tasks().replace(handle) {
            previous.abort();
        }
    }

    /// One poll cycle: read a position, filter it, and dispatch address
    /// resolution when the sample is replaced. Read failures are logged and
    /// leave the current sample untouched.
    async fn poll_location_once(&self) {
        let request = LocationRequest {
            high_accuracy: true,
            timeout: self.read_timeout,
            max_age: self.max_fix_age,
        };
        let fix = match self.locator.current_position(request).await {
            Ok(fix) => fix,
            Err(err) => {
                warn!(%err, "position read failed");
                return;
            }
        };

        if fix.accuracy_m > self.accuracy_limit_m {
            debug!(accuracy_m = fix.accuracy_m, "discarding imprecise fix");
            return;
        }

        let accepted = {
            let mut state = self.state();
            if !location::supersedes(state.location.as_ref(), &fix) {
                None
            } else {
                let sample = LocationSample::from_fix(&fix, Utc::now());
                debug!(
                    latitude = sample.latitude,
                    longitude = sample.longitude,
                    accuracy_m = sample.accuracy_m,
                    "accepted location sample"
                );
                state.location = Some(sample.clone());
                state.generation += 1;
                state.address = Some(ResolvedAddress::pending());
                Some((state.generation, sample))
            }
        };

        if let Some((generation, sample)) = accepted {
            self.spawn_resolve_task(generation, sample.latitude, sample.longitude);
        }
    }

    fn spawn_resolve_task(&self, generation: u64, latitude: f64, longitude: f64) {
        let resolver = Arc::clone(&self.resolver);
        let weak = self.weak.clone();
        tokio::spawn(async move {
            let address = resolver.resolve(latitude, longitude).await;
            if let Some(pipeline) = weak.upgrade() {
                pipeline.install_address(generation, address);
            }
        });
    }

    fn install_address(&self, generation: u64, address: ResolvedAddress) {
        let mut state = self.state();
        if state.generation == generation {
            state.address = Some(address);
        } else {
            debug!(
                generation,
                current = state.generation,
                "discarding stale address result"
            );
        }
    }

    /// Bind the live preview to the active facing mode, acquiring a stream
    /// if none is held yet.
    pub async fn start_preview(&self) -> Result<(), GeostampError> {
        self.ensure_stream().await
    }

    /// Switch between the rear and selfie cameras.
    ///
    /// The active stream is released immediately; the next preview or
    /// capture acquires a stream bound to the new camera. Permissions are
    /// not re-checked.
    pub async fn switch_facing(&self, facing: FacingMode) {
        {
            let mut slot = self.stream.lock().await;
            *slot = None;
        }
        self.state().facing = facing;
        debug!(label = facing.label(), "switched camera");
    }

    async fn ensure_stream(&self) -> Result<(), GeostampError> {
        let facing = self.state().facing;
        let mut slot = self.stream.lock().await;
        if matches!(slot.as_ref(), Some(stream) if stream.facing() == facing) {
            return Ok(());
        }
        // Release the previous stream before acquiring the next one.
        *slot = None;
        *slot = Some(self.camera.open(facing, self.resolution).await?);
        Ok(())
    }

    /// Whether the capture action is currently enabled.
    pub fn ready_to_capture(&self) -> bool {
        let state = self.state();
        state.phase == Phase::Granted
            && state.location.is_some()
            && state.address.as_ref().is_some_and(|address| address.valid)
    }

    /// Grab a still frame, stamp it, and move to the preview screen.
    ///
    /// Only permitted with an accepted location sample and a valid address;
    /// otherwise returns [`GeostampError::NotReady`] without touching the
    /// camera.
    pub async fn capture(&self) -> Result<(), GeostampError> {
        let (location, address, facing) = {
            let state = self.state();
            if state.phase != Phase::Granted {
                return Err(GeostampError::NotGranted);
            }
            let Some(location) = state.location.clone() else {
                return Err(GeostampError::NotReady("waiting for a location fix"));
            };
            let address = state
                .address
                .clone()
                .filter(|address| address.valid)
                .ok_or(GeostampError::NotReady("waiting for the address"))?;
            (location, address, state.facing)
        };

        self.ensure_stream().await?;
        let frame = {
            let mut slot = self.stream.lock().await;
            let stream = slot
                .as_mut()
                .ok_or(GeostampError::NotReady("camera stream was released"))?;
            stream.still_frame().await?
        };

        let taken_at = Local::now();
        let stamped = self
            .stamper
            .stamp(&frame, &location, &address, taken_at, facing)?;

        let mut state = self.state();
        state.artifact = Some(CapturedArtifact {
            raw_frame: frame,
            stamped_jpeg: stamped,
            location,
            address,
            captured_at: taken_at,
            facing,
        });
        state.view = ViewMode::Preview;
        state.upload_error = None;
        info!("captured and stamped a frame");
        Ok(())
    }

    /// Discard the pending artifact and return to the live camera.
    pub fn retake(&self) {
        let mut state = self.state();
        state.artifact = None;
        state.upload_error = None;
        state.view = ViewMode::Camera;
    }

    /// Hand the pending artifact to the uploader.
    ///
    /// On success the artifact is consumed and the flow returns to the
    /// camera screen. On failure the artifact is retained and the server
    /// message recorded (see [`Self::upload_error`]) so the upload can be
    /// retried without recapturing.
    pub async fn confirm(&self) -> Result<UploadReceipt, GeostampError> {
        let artifact = self
            .state()
            .artifact
            .clone()
            .ok_or(GeostampError::NoArtifact)?;
        match self.uploader.upload(&artifact).await {
            Ok(receipt) => {
                let mut state = self.state();
                state.artifact = None;
                state.upload_error = None;
                state.view = ViewMode::Camera;
                Ok(receipt)
            }
            Err(err) => {
                warn!(%err, "upload rejected");
                self.state().upload_error = Some(err.to_string());
                Err(err.into())
            }
        }
    }

    /// Tear down the poll loop and release the camera stream.
    ///
    /// Outstanding address resolutions are left to settle; their results are
    /// discarded on arrival.
    pub async fn close(&self) {
        if let Some(task) = self.tasks().take() {
            task.abort();
        }
        *self.stream.lock().await = None;
        debug!("capture pipeline closed");
    }

    pub fn phase(&self) -> Phase {
        self.state().phase
    }

    pub fn view(&self) -> ViewMode {
        self.state().view
    }

    pub fn facing(&self) -> FacingMode {
        self.state().facing
    }

    pub fn current_location(&self) -> Option<LocationSample> {
        self.state().location.clone()
    }

    pub fn current_address(&self) -> Option<ResolvedAddress> {
        self.state().address.clone()
    }

    pub fn artifact(&self) -> Option<CapturedArtifact> {
        self.state().artifact.clone()
    }

    /// Message from the last rejected upload, cleared by retake or a
    /// successful confirm.
    pub fn upload_error(&self) -> Option<String> {
        self.state().upload_error.clone()
    }

    fn state(&self) -> MutexGuard<'_, LiveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tasks(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.poll_task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        if let Some(task) = self.tasks().take() {
            task.abort();
        }
    }
}
