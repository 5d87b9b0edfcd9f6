//! Integration tests for role assignment, flash routing and printing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use photobooth::context::{HardwareContext, StatusLight};
use photobooth::device::mock::{MockCamera, MockSpooler, Operation};
use photobooth::device::{
    BackendKind, CameraMode, DeviceManager, FlashPhase, JobState, PrintDevice, PrintParams,
    PrintStatus, ProbeResult, SpoolPrinter,
};
use photobooth::error::PhotoboothError;
use photobooth::frame::Frame;

use crate::common::{mock, probes};

#[derive(Default)]
struct RecordingLight(Mutex<Vec<String>>);

impl RecordingLight {
    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl StatusLight for RecordingLight {
    fn start_countdown(&self, duration: Duration) {
        self.0.lock().unwrap().push(format!("countdown {}", duration.as_secs()));
    }
    fn flash(&self, phase: FlashPhase) {
        self.0.lock().unwrap().push(format!("flash {phase:?}"));
    }
    fn start_rainbow(&self) {
        self.0.lock().unwrap().push("rainbow".to_string());
    }
    fn clear(&self) {
        self.0.lock().unwrap().push("clear".to_string());
    }
}

#[test]
fn test_hybrid_routes_preview_and_capture() {
    let dir = tempfile::tempdir().unwrap();
    let vendor = mock(BackendKind::VendorProtocol);
    let webcam = mock(BackendKind::Webcam);
    let manager = DeviceManager::from_probes(
        probes(Some(vendor.clone()), None, Some(webcam.clone()), None),
        None,
    )
    .unwrap();

    assert_eq!(
        manager.mode(),
        CameraMode::Hybrid {
            preview: BackendKind::Webcam,
            capture: BackendKind::VendorProtocol,
        }
    );

    let frame = manager.get_preview(Some(1.0)).unwrap();
    assert_eq!(frame.width(), frame.height());

    let path = dir.path().join("capture-0.jpg");
    manager.capture(&path, Some(4.0 / 3.0), None).unwrap();

    webcam.assert_operations(&[Operation::GetPreview {
        aspect_ratio: Some(1.0),
    }]);
    assert_eq!(vendor.capture_count(), 1);
    assert_eq!(Frame::open(&path).unwrap().dimensions(), (320, 240));
}

#[test]
fn test_unavailable_backends_are_reported() {
    let board = probes(None, Some(mock(BackendKind::BoardCamera)), None, None);
    let manager = DeviceManager::from_probes(board, None).unwrap();
    let names: Vec<&str> = manager.unavailable().iter().map(|u| u.backend.as_str()).collect();
    assert_eq!(names, ["vendor", "webcam", "printer"]);
    assert!(!manager.is_hybrid());
}

#[test]
fn test_soft_flash_only_without_physical_flash() {
    let dir = tempfile::tempdir().unwrap();

    for (kind, expected) in [
        (BackendKind::Webcam, vec!["flash Start", "flash Stop"]),
        (BackendKind::VendorProtocol, vec![]),
    ] {
        let light = Arc::new(RecordingLight::default());
        let devices =
            DeviceManager::from_probes(probes(None, None, Some(mock(kind)), None), None).unwrap();
        let context = HardwareContext::new(devices, light.clone());

        let flash = context.flash_callback();
        context
            .devices()
            .capture(&dir.path().join("shot.jpg"), None, Some(&flash))
            .unwrap();
        assert_eq!(light.events(), expected, "{kind:?}");
    }
}

#[test]
fn test_failed_capture_still_stops_flash() {
    let light = Arc::new(RecordingLight::default());
    let camera = mock(BackendKind::Webcam);
    camera.inject_error(PhotoboothError::CaptureFailed {
        path: "shot.jpg".to_string(),
        reason: "lens cap".to_string(),
    });
    let devices = DeviceManager::from_probes(probes(None, None, Some(camera), None), None).unwrap();
    let context = HardwareContext::new(devices, light.clone());

    let dir = tempfile::tempdir().unwrap();
    let flash = context.flash_callback();
    let result = context
        .devices()
        .capture(&dir.path().join("shot.jpg"), None, Some(&flash));
    assert!(matches!(result, Err(PhotoboothError::CaptureFailed { .. })));
    assert_eq!(light.events(), ["flash Start", "flash Stop"]);
}

#[test]
fn test_spool_printer_through_manager() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("collage.jpg");
    Frame::solid(10, 10, [0, 0, 0]).save(&file).unwrap();

    let spooler = MockSpooler::new(&["office", "selphy"]).with_default("selphy");
    let script = spooler.script();
    let printer: Arc<dyn PrintDevice> =
        Arc::new(SpoolPrinter::connect(Box::new(spooler), None).unwrap());

    let mut p = probes(None, None, Some(mock(BackendKind::Webcam)), None);
    p.printer = ProbeResult::Found(printer);
    let manager = DeviceManager::from_probes(p, None).unwrap();
    assert_eq!(manager.printer_name(), Some("selphy"));

    let job = manager.print(&file, &PrintParams::new()).unwrap();
    script
        .lock()
        .unwrap()
        .extend([JobState::Processing, JobState::Completed, JobState::Processing]);

    assert_eq!(manager.get_print_status(&job).unwrap(), PrintStatus::Pending);
    assert_eq!(manager.get_print_status(&job).unwrap(), PrintStatus::Done);
    // Done is latched even if the spooler changes its mind
    assert_eq!(manager.get_print_status(&job).unwrap(), PrintStatus::Done);
    assert_eq!(script.lock().unwrap().clone(), VecDeque::from([JobState::Processing]));
}

#[test]
fn test_named_printer_must_exist() {
    let result = SpoolPrinter::connect(Box::new(MockSpooler::new(&["office"])), Some("selphy"));
    assert!(matches!(result, Err(PhotoboothError::PrinterNotFound { name }) if name == "selphy"));

    let office = MockSpooler::new(&["office"]);
    let default = SpoolPrinter::connect(Box::new(office), Some("default")).unwrap();
    assert_eq!(default.name(), "office");
}

#[test]
fn test_mock_camera_without_live_view() {
    let camera: Arc<MockCamera> = mock(BackendKind::BoardCamera);
    camera.set_preview_available(false);
    let manager = DeviceManager::from_probes(probes(None, Some(camera), None, None), None).unwrap();
    assert!(manager.get_preview(None).is_none());
}
