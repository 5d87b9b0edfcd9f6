//! Process-wide hardware context.
//!
//! Built once at startup and handed to whatever needs the cameras, the printer
//! or the status light, instead of reaching for globals.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::AppConfig;
use crate::device::{DeviceManager, FlashPhase};
use crate::error::Result;

/// Narrow interface of the booth's status light (ring LED, strip, ...).
pub trait StatusLight: Send + Sync {
    /// Count down towards a shot lasting `duration`.
    fn start_countdown(&self, duration: Duration);

    /// Drive the light as a software flash.
    fn flash(&self, phase: FlashPhase);

    /// Idle animation.
    fn start_rainbow(&self);

    /// Switch the light off.
    fn clear(&self);
}

/// Status light that only logs. Used when no light driver is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogLight;

impl StatusLight for LogLight {
    fn start_countdown(&self, duration: Duration) {
        info!(secs = duration.as_secs_f32(), "Light: countdown");
    }

    fn flash(&self, phase: FlashPhase) {
        info!(?phase, "Light: flash");
    }

    fn start_rainbow(&self) {
        info!("Light: rainbow");
    }

    fn clear(&self) {
        info!("Light: clear");
    }
}

/// Devices and light shared by the whole application.
#[derive(Clone)]
pub struct HardwareContext {
    devices: Arc<DeviceManager>,
    light: Arc<dyn StatusLight>,
}

impl HardwareContext {
    pub fn new(devices: DeviceManager, light: Arc<dyn StatusLight>) -> Self {
        Self {
            devices: Arc::new(devices),
            light,
        }
    }

    /// Probe the configured hardware.
    ///
    /// # Errors
    ///
    /// Fails only when no camera is available.
    pub fn probe(config: &AppConfig, light: Arc<dyn StatusLight>) -> Result<Self> {
        let devices = DeviceManager::probe(&config.devices, &config.printer, config.calibration)?;
        Ok(Self::new(devices, light))
    }

    pub fn devices(&self) -> &DeviceManager {
        &self.devices
    }

    pub fn light(&self) -> &dyn StatusLight {
        self.light.as_ref()
    }

    /// Software flash callback for captures, routed to the status light.
    pub fn flash_callback(&self) -> impl Fn(FlashPhase) + Sync + '_ {
        move |phase| self.light.flash(phase)
    }
}
