//! DSLR backend driven over a widget-tree configuration protocol.
//!
//! The camera is reached through a [`VendorSession`]; the real transport is
//! the `gphoto2` command-line tool. Live view is pulled by a background loop
//! into a [`LatestFrame`] mailbox so preview polling never waits on USB.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::{
    BackendKind, CaptureDevice, FlashCallback, LatestFrame, capture_failed, crop_preview, lock,
    with_flash, write_capture,
};
use crate::error::Result;
use crate::frame::Frame;

/// Delay between two live view grabs.
pub const PREVIEW_INTERVAL: Duration = Duration::from_millis(40);
const PAUSED_POLL: Duration = Duration::from_millis(20);
const ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// Transport to one camera speaking the configuration protocol.
pub trait VendorSession: Send {
    /// Manufacturer string reported by the camera.
    fn manufacturer(&mut self) -> Result<String>;

    /// Read the value of a setting by tree path.
    fn get_setting(&mut self, path: &str) -> Result<String>;

    /// Write the value of a setting by tree path.
    fn set_setting(&mut self, path: &str, value: &str) -> Result<()>;

    /// Grab one live view frame as encoded JPEG bytes.
    fn capture_preview(&mut self) -> Result<Vec<u8>>;

    /// Take a full-resolution photo and download it to `output_path`.
    fn capture_image(&mut self, output_path: &Path) -> Result<()>;
}

/// Settings the booth reads or writes, addressed by tree path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Setting {
    Aperture,
    ShutterSpeed,
    Iso,
    FocusMode,
    AutoExposureMode,
    ImageQuality,
    ImageFormat,
    LiveViewAfFocus,
    ViewFinder,
}

impl Setting {
    pub const fn path(self) -> &'static str {
        match self {
            Self::Aperture => "/main/capturesettings/aperture",
            Self::ShutterSpeed => "/main/capturesettings/shutterspeed",
            Self::Iso => "/main/imgsettings/iso",
            Self::FocusMode => "/main/capturesettings/focusmode",
            Self::AutoExposureMode => "/main/capturesettings/autoexposuremode",
            Self::ImageQuality => "/main/capturesettings/imagequality",
            Self::ImageFormat => "/main/imgsettings/imageformat",
            Self::LiveViewAfFocus => "/main/capturesettings/liveviewaffocus",
            Self::ViewFinder => "/main/actions/viewfinder",
        }
    }
}

/// Snapshot of the exposure-related settings. Unreadable ones are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CameraSettings {
    pub aperture: Option<String>,
    pub shutter_speed: Option<String>,
    pub iso: Option<String>,
    pub focus_mode: Option<String>,
    pub autoexposure_mode: Option<String>,
}

impl CameraSettings {
    fn read(session: &mut dyn VendorSession) -> Self {
        let mut get = |setting: Setting| session.get_setting(setting.path()).ok();
        Self {
            aperture: get(Setting::Aperture),
            shutter_speed: get(Setting::ShutterSpeed),
            iso: get(Setting::Iso),
            focus_mode: get(Setting::FocusMode),
            autoexposure_mode: get(Setting::AutoExposureMode),
        }
    }
}

/// Capture defaults for one manufacturer.
#[derive(Debug)]
pub struct ManufacturerProfile {
    /// Matched case-insensitively as a substring of the reported manufacturer.
    pub id: &'static str,
    pub defaults: &'static [(Setting, &'static str)],
}

pub const MANUFACTURERS: &[ManufacturerProfile] = &[
    ManufacturerProfile {
        id: "canon",
        defaults: &[
            (Setting::ImageFormat, "Large Fine JPEG"),
            (Setting::FocusMode, "AI Servo"),
        ],
    },
    ManufacturerProfile {
        id: "nikon",
        defaults: &[
            (Setting::ImageQuality, "JPEG Fine"),
            (Setting::LiveViewAfFocus, "Full-time-servo AF"),
        ],
    },
    ManufacturerProfile {
        id: "sony",
        defaults: &[(Setting::ImageQuality, "Extra Fine"), (Setting::FocusMode, "AF-C")],
    },
    ManufacturerProfile {
        id: "fuji",
        defaults: &[(Setting::ImageQuality, "Fine"), (Setting::FocusMode, "Continuous AF")],
    },
];

/// Profile for a reported manufacturer string, `None` if unknown.
pub fn lookup_manufacturer(manufacturer: &str) -> Option<&'static ManufacturerProfile> {
    let manufacturer = manufacturer.to_ascii_lowercase();
    MANUFACTURERS
        .iter()
        .find(|profile| manufacturer.contains(profile.id))
}

/// Apply the manufacturer defaults, returning how many settings were written.
///
/// Unknown manufacturers are left untouched. A setting the body refuses is
/// logged and skipped.
pub fn apply_manufacturer_defaults(session: &mut dyn VendorSession, manufacturer: &str) -> usize {
    let Some(profile) = lookup_manufacturer(manufacturer) else {
        info!(manufacturer, "Unknown camera manufacturer, keeping camera settings");
        return 0;
    };

    let mut applied = 0;
    for (setting, value) in profile.defaults {
        match session.set_setting(setting.path(), value) {
            Ok(()) => {
                debug!(path = setting.path(), value, "Applied camera default");
                applied += 1;
            }
            Err(e) => warn!(path = setting.path(), value, error = %e, "Camera refused setting"),
        }
    }
    applied
}

type SharedSession = Arc<Mutex<Box<dyn VendorSession>>>;

/// DSLR capture device. Has a physical flash.
pub struct VendorCamera {
    session: SharedSession,
    manufacturer: String,
    mailbox: Arc<LatestFrame>,
    paused: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    preview_loop: Option<JoinHandle<()>>,
}

impl VendorCamera {
    /// Initialise the camera and start its live view loop.
    pub fn open(session: Box<dyn VendorSession>) -> Result<Self> {
        Self::open_with_interval(session, PREVIEW_INTERVAL)
    }

    pub fn open_with_interval(
        mut session: Box<dyn VendorSession>,
        interval: Duration,
    ) -> Result<Self> {
        let manufacturer = session.manufacturer()?;
        info!(%manufacturer, "Opening vendor-protocol camera");

        // Settings cannot be changed before live view has run once
        let first = session.capture_preview()?;
        apply_manufacturer_defaults(session.as_mut(), &manufacturer);

        let mailbox = Arc::new(LatestFrame::new());
        match Frame::decode(&first) {
            Ok(frame) => mailbox.publish(frame),
            Err(e) => trace!(error = %e, "First live view frame not decodable"),
        }

        let session: SharedSession = Arc::new(Mutex::new(session));
        let paused = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));

        let preview_loop = {
            let session = Arc::clone(&session);
            let mailbox = Arc::clone(&mailbox);
            let paused = Arc::clone(&paused);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("vendor-preview".to_string())
                .spawn(move || run_preview_loop(&session, &mailbox, &paused, &stop, interval))?
        };

        Ok(Self {
            session,
            manufacturer,
            mailbox,
            paused,
            stop,
            preview_loop: Some(preview_loop),
        })
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    /// Read the current exposure settings.
    pub fn read_settings(&self) -> CameraSettings {
        let _pause = PauseGuard::engage(&self.paused);
        let mut session = lock(&self.session);
        CameraSettings::read(session.as_mut())
    }

    /// Write one setting.
    pub fn set(&self, setting: Setting, value: &str) -> Result<()> {
        let _pause = PauseGuard::engage(&self.paused);
        lock(&self.session).set_setting(setting.path(), value)
    }

    /// Frames published by the live view loop so far.
    pub fn preview_generation(&self) -> u64 {
        self.mailbox.generation()
    }
}

impl CaptureDevice for VendorCamera {
    fn kind(&self) -> BackendKind {
        BackendKind::VendorProtocol
    }

    fn get_preview(&self, aspect_ratio: Option<f64>) -> Option<Frame> {
        let frame = self.mailbox.latest()?;
        crop_preview(&frame, aspect_ratio)
    }

    fn capture(
        &self,
        output_path: &Path,
        aspect_ratio: Option<f64>,
        flash: Option<FlashCallback<'_>>,
    ) -> Result<()> {
        with_flash(self.has_physical_flash(), flash, || {
            let _pause = PauseGuard::engage(&self.paused);
            let mut session = lock(&self.session);
            if let Err(e) = session.set_setting(Setting::ViewFinder.path(), "0") {
                warn!(error = %e, "Failed to leave live view before capture");
            }
            session
                .capture_image(output_path)
                .map_err(|e| capture_failed(output_path, e))
        })?;

        if aspect_ratio.is_some() {
            let photo = Frame::open(output_path)?;
            write_capture(&photo, output_path, aspect_ratio)?;
        }
        info!(path = %output_path.display(), "Captured photo");
        Ok(())
    }

    fn has_physical_flash(&self) -> bool {
        true
    }
}

impl Drop for VendorCamera {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.preview_loop.take() {
            if handle.join().is_err() {
                warn!("Live view loop panicked");
            }
        }
        debug!("Vendor-protocol camera closed");
    }
}

/// Holds the live view loop off while the session is busy with something else.
struct PauseGuard<'a>(&'a AtomicBool);

impl<'a> PauseGuard<'a> {
    fn engage(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn run_preview_loop(
    session: &Mutex<Box<dyn VendorSession>>,
    mailbox: &LatestFrame,
    paused: &AtomicBool,
    stop: &AtomicBool,
    interval: Duration,
) {
    debug!("Live view loop started");
    while !stop.load(Ordering::Acquire) {
        if paused.load(Ordering::Acquire) {
            thread::sleep(PAUSED_POLL);
            continue;
        }

        let grabbed = lock(session).capture_preview();
        match grabbed.and_then(|bytes| Frame::decode(&bytes)) {
            Ok(frame) => {
                mailbox.publish(frame);
                thread::sleep(interval);
            }
            Err(e) => {
                trace!(error = %e, "Live view grab failed");
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
    debug!("Live view loop stopped");
}
