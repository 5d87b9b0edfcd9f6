//! Integration tests for the complete booth workflow.

use std::fs;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use photobooth::collage::TemplateCollage;
use photobooth::context::{HardwareContext, StatusLight};
use photobooth::device::mock::MockPrinter;
use photobooth::device::{BackendKind, DeviceManager, FlashPhase, PrintStatus};
use photobooth::error::PhotoboothError;
use photobooth::frame::Frame;
use photobooth::session::{PhotoSession, SessionDirs};

use crate::common::fixtures::{PAIR_TEMPLATE_TOML, STRIP_TEMPLATE_JSON, TemplateDir};
use crate::common::{init_test_logging, mock, probes, webcam_context};

fn wait_for(mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(20);
    while !done() {
        assert!(Instant::now() < deadline, "worker did not finish");
        thread::sleep(Duration::from_millis(5));
    }
}

fn shoot_all(session: &mut PhotoSession) {
    for i in 0..session.shots_to_take() {
        session.trigger_shot(i).unwrap();
        wait_for(|| session.is_shot_completed(i));
        assert!(session.shot_exists(i), "shot {i} missing");
    }
}

#[derive(Default)]
struct CountingLight {
    events: Mutex<Vec<&'static str>>,
}

impl StatusLight for CountingLight {
    fn start_countdown(&self, _duration: Duration) {
        self.events.lock().unwrap().push("countdown");
    }
    fn flash(&self, phase: FlashPhase) {
        self.events.lock().unwrap().push(match phase {
            FlashPhase::Start => "flash-on",
            FlashPhase::Stop => "flash-off",
        });
    }
    fn start_rainbow(&self) {
        self.events.lock().unwrap().push("rainbow");
    }
    fn clear(&self) {
        self.events.lock().unwrap().push("clear");
    }
}

#[test]
fn test_strip_session_prints_double_page() {
    init_test_logging();
    let templates = TemplateDir::new();
    let strip = TemplateCollage::load(&templates.write("strip.json", STRIP_TEMPLATE_JSON)).unwrap();
    let dcim = tempfile::tempdir().unwrap();
    let printer = Arc::new(MockPrinter::new("selphy").with_pending_polls(0));
    let context = webcam_context(mock(BackendKind::Webcam), Some(printer.clone()));

    let dirs = SessionDirs::new(dcim.path()).unwrap();
    let mut session = PhotoSession::new(context.clone(), strip, dirs);
    assert_eq!(session.shots_to_take(), 3);

    // Live view is cropped to the slot shape (1120x840)
    let preview = session.preview().unwrap();
    let ratio = f64::from(preview.width()) / f64::from(preview.height());
    assert!((ratio - 4.0 / 3.0).abs() < 0.02);

    shoot_all(&mut session);
    session.trigger_collage().unwrap();
    wait_for(|| session.is_collage_completed());

    let collage = Frame::open(&session.collage_path()).unwrap();
    assert_eq!(collage.dimensions(), (1240, 3688));

    let tracker = session.trigger_print(2).unwrap();
    assert_eq!(tracker.poll(context.devices()).unwrap(), PrintStatus::Done);

    let (file, params) = printer.submitted().remove(0);
    assert!(file.ends_with("collage_print.jpg"));
    assert_eq!(Frame::open(&file).unwrap().dimensions(), (2480, 3688));
    assert_eq!(params["copies"], "2");
    assert_eq!(params["media"], "Postcard");

    let saved = session.save().unwrap().unwrap();
    let mut names: Vec<String> = fs::read_dir(&saved)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, ["capture-0.jpg", "capture-1.jpg", "capture-2.jpg", "collage.jpg"]);
}

#[test]
fn test_plain_template_prints_display_collage() {
    let templates = TemplateDir::new();
    let pair = TemplateCollage::load(&templates.write("pair.toml", PAIR_TEMPLATE_TOML)).unwrap();
    let dcim = tempfile::tempdir().unwrap();
    let printer = Arc::new(MockPrinter::new("selphy"));
    let context = webcam_context(mock(BackendKind::Webcam), Some(printer.clone()));

    let mut session = PhotoSession::new(context, pair, SessionDirs::new(dcim.path()).unwrap());
    shoot_all(&mut session);
    session.trigger_collage().unwrap();
    wait_for(|| session.is_collage_completed());

    session.trigger_print(1).unwrap();
    let (file, params) = printer.submitted().remove(0);
    assert_eq!(file, session.collage_path());
    assert_eq!(params.len(), 1);
}

#[test]
fn test_countdown_flash_and_reset_drive_the_light() {
    let templates = TemplateDir::new();
    let pair = TemplateCollage::load(&templates.write("pair.toml", PAIR_TEMPLATE_TOML)).unwrap();
    let dcim = tempfile::tempdir().unwrap();
    let light = Arc::new(CountingLight::default());
    let webcam = probes(None, None, Some(mock(BackendKind::Webcam)), None);
    let devices = DeviceManager::from_probes(webcam, None).unwrap();
    let context = HardwareContext::new(devices, light.clone());

    let mut session = PhotoSession::new(context, pair, SessionDirs::new(dcim.path()).unwrap())
        .with_countdown(Duration::from_millis(10));
    assert!(!session.has_physical_flash());

    session.countdown();
    session.trigger_shot(0).unwrap();
    wait_for(|| session.is_shot_completed(0));
    session.reset().unwrap();

    assert_eq!(
        *light.events.lock().unwrap(),
        ["countdown", "flash-on", "flash-off", "rainbow"]
    );
    assert!(!session.shot_exists(0));
    assert_eq!(session.next_shot(), 0);
}

#[test]
fn test_collage_before_all_shots_uses_background() {
    let templates = TemplateDir::new();
    let pair = TemplateCollage::load(&templates.write("pair.toml", PAIR_TEMPLATE_TOML)).unwrap();
    let dcim = tempfile::tempdir().unwrap();
    let context = webcam_context(mock(BackendKind::Webcam), None);

    let mut session = PhotoSession::new(context, pair, SessionDirs::new(dcim.path()).unwrap());
    session.trigger_shot(0).unwrap();
    wait_for(|| session.is_shot_completed(0));
    session.trigger_collage().unwrap();
    wait_for(|| session.is_collage_completed());

    let collage = Frame::open(&session.collage_path()).unwrap();
    let right = collage.pixels().get_pixel(600, 200).0;
    assert!(right.iter().all(|&c| c > 240), "empty slot is white, got {right:?}");
}

#[test]
fn test_save_while_busy_is_refused() {
    let templates = TemplateDir::new();
    let pair = TemplateCollage::load(&templates.write("pair.toml", PAIR_TEMPLATE_TOML)).unwrap();
    let dcim = tempfile::tempdir().unwrap();
    let camera = Arc::new(
        photobooth::device::mock::MockCamera::new(BackendKind::Webcam)
            .with_capture_delay(Duration::from_millis(300)),
    );
    let context = webcam_context(camera, None);

    let mut session = PhotoSession::new(context, pair, SessionDirs::new(dcim.path()).unwrap());
    session.trigger_shot(0).unwrap();
    assert!(matches!(
        session.save(),
        Err(PhotoboothError::WorkerBusy { task }) if task == "capture-0"
    ));
    wait_for(|| session.is_shot_completed(0));
    assert!(session.save().unwrap().is_some());
}
