//! Common test utilities for the photobooth crate.
//!
//! - `fixtures`: Test photos, template documents and config files
#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;

use photobooth::context::{HardwareContext, LogLight};
use photobooth::device::mock::{MockCamera, MockPrinter};
use photobooth::device::{
    BackendKind, CaptureDevice, DeviceManager, PrintDevice, ProbeResult, Probes,
};
use tracing_subscriber::EnvFilter;

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Probe results with only the given backends present.
pub fn probes(
    vendor: Option<Arc<MockCamera>>,
    board: Option<Arc<MockCamera>>,
    webcam: Option<Arc<MockCamera>>,
    printer: Option<Arc<MockPrinter>>,
) -> Probes {
    fn camera(mock: Option<Arc<MockCamera>>) -> ProbeResult<Arc<dyn CaptureDevice>> {
        match mock {
            Some(mock) => {
                let device: Arc<dyn CaptureDevice> = mock;
                ProbeResult::Found(device)
            }
            None => ProbeResult::not_available("not connected"),
        }
    }

    let printer = match printer {
        Some(mock) => {
            let device: Arc<dyn PrintDevice> = mock;
            ProbeResult::Found(device)
        }
        None => ProbeResult::not_available("no destination"),
    };

    Probes {
        vendor: camera(vendor),
        board: camera(board),
        webcam: camera(webcam),
        printer,
    }
}

/// Hardware context around a single webcam mock.
///
/// # Panics
///
/// Panics if the manager refuses the probes.
pub fn webcam_context(
    camera: Arc<MockCamera>,
    printer: Option<Arc<MockPrinter>>,
) -> HardwareContext {
    let devices = DeviceManager::from_probes(probes(None, None, Some(camera), printer), None)
        .expect("a webcam is enough to build a manager");
    HardwareContext::new(devices, Arc::new(LogLight))
}

pub fn mock(kind: BackendKind) -> Arc<MockCamera> {
    Arc::new(MockCamera::new(kind))
}
