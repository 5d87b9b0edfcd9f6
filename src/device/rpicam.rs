//! [`BoardCameraDriver`] over the `rpicam-vid` / `rpicam-still` tools.
//!
//! Preview is an MJPEG stream from `rpicam-vid` on stdout, split and decoded
//! by a reader thread into a [`LatestFrame`]. The sensor can only be opened
//! by one process, so still mode stops the stream before `rpicam-still` runs.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use super::{BoardCameraDriver, BoardMode, LatestFrame, MjpegSplitter};
use crate::error::{PhotoboothError, Result};
use crate::frame::Frame;

const RPICAM_VID: &str = "rpicam-vid";
const RPICAM_STILL: &str = "rpicam-still";
const RPICAM_HELLO: &str = "rpicam-hello";

pub const PREVIEW_SIZE: (u32, u32) = (1280, 960);
const PREVIEW_FPS: u32 = 30;
const READ_CHUNK: usize = 64 * 1024;

// Continuous fast autofocus and short exposures keep people sharp while moving
const CAMERA_CONTROLS: [&str; 6] = [
    "--autofocus-mode",
    "continuous",
    "--autofocus-speed",
    "fast",
    "--exposure",
    "short",
];

struct PreviewStream {
    child: Child,
    reader: Option<JoinHandle<()>>,
}

impl PreviewStream {
    fn spawn(camera: u32, mailbox: Arc<LatestFrame>) -> Result<Self> {
        let (width, height) = PREVIEW_SIZE;
        let mut child = Command::new(RPICAM_VID)
            .args(["--nopreview", "--timeout", "0", "--codec", "mjpeg", "--output", "-"])
            .arg("--camera")
            .arg(camera.to_string())
            .arg("--width")
            .arg(width.to_string())
            .arg("--height")
            .arg(height.to_string())
            .arg("--framerate")
            .arg(PREVIEW_FPS.to_string())
            .args(CAMERA_CONTROLS)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| unavailable(RPICAM_VID, &e))?;

        let mut stdout = child.stdout.take().ok_or_else(|| {
            PhotoboothError::DeviceCommunication("rpicam-vid stdout not captured".to_string())
        })?;

        let reader = thread::Builder::new()
            .name("board-preview".to_string())
            .spawn(move || {
                let mut splitter = MjpegSplitter::new();
                let mut chunk = vec![0u8; READ_CHUNK];
                loop {
                    match stdout.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            // Only the newest complete frame of a read is worth decoding
                            if let Some(jpeg) = splitter.push(&chunk[..n]).pop() {
                                match Frame::decode(&jpeg) {
                                    Ok(frame) => mailbox.publish(frame),
                                    Err(e) => trace!(error = %e, "Skipping corrupt MJPEG frame"),
                                }
                            }
                        }
                        Err(e) => {
                            debug!(error = %e, "Preview stream read failed");
                            break;
                        }
                    }
                }
                debug!("Preview stream ended");
            })?;

        Ok(Self {
            child,
            reader: Some(reader),
        })
    }

    fn stop(&mut self) {
        if let Err(e) = self.child.kill() {
            trace!(error = %e, "rpicam-vid already exited");
        }
        if let Err(e) = self.child.wait() {
            warn!(error = %e, "Failed to reap rpicam-vid");
        }
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("Preview reader thread panicked");
            }
        }
    }
}

impl Drop for PreviewStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Driver for the camera at index `camera` of `rpicam-hello --list-cameras`.
pub struct RpicamDriver {
    camera: u32,
    mode: Option<BoardMode>,
    mailbox: Arc<LatestFrame>,
    stream: Option<PreviewStream>,
}

impl RpicamDriver {
    /// Check that the camera exists without opening it.
    pub fn detect(camera: u32) -> Result<Self> {
        let output = Command::new(RPICAM_HELLO)
            .arg("--list-cameras")
            .output()
            .map_err(|e| unavailable(RPICAM_HELLO, &e))?;
        let listing = String::from_utf8_lossy(&output.stdout);
        let count = count_cameras(&listing);
        if camera as usize >= count {
            return Err(PhotoboothError::DeviceCommunication(format!(
                "board camera {camera} not present ({count} listed)"
            )));
        }
        debug!(camera, count, "Board camera detected");
        Ok(Self {
            camera,
            mode: None,
            mailbox: Arc::new(LatestFrame::new()),
            stream: None,
        })
    }

    fn capture_still(&self) -> Result<Frame> {
        let output = Command::new(RPICAM_STILL)
            .args(["--nopreview", "--immediate", "--encoding", "jpg", "--output", "-"])
            .arg("--camera")
            .arg(self.camera.to_string())
            .args(CAMERA_CONTROLS)
            .output()
            .map_err(|e| unavailable(RPICAM_STILL, &e))?;
        if !output.status.success() {
            return Err(PhotoboothError::DeviceCommunication(format!(
                "{RPICAM_STILL} failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Frame::decode(&output.stdout)
    }
}

impl BoardCameraDriver for RpicamDriver {
    fn configure(&mut self, mode: BoardMode) -> Result<()> {
        if self.mode == Some(mode) {
            return Ok(());
        }
        match mode {
            BoardMode::Preview => {
                // Unconfigured until the stream is up, so a failed spawn never
                // leaves preview grabs running rpicam-still
                self.mode = None;
                let stream = PreviewStream::spawn(self.camera, Arc::clone(&self.mailbox))?;
                self.stream = Some(stream);
            }
            BoardMode::Still => {
                // Dropping the stream kills rpicam-vid and releases the sensor
                self.stream = None;
                self.mailbox.clear();
            }
        }
        debug!(?mode, "Board camera configured");
        self.mode = Some(mode);
        Ok(())
    }

    fn grab(&mut self) -> Result<Option<Frame>> {
        match self.mode {
            Some(BoardMode::Preview) => Ok(self.mailbox.latest().map(|frame| (*frame).clone())),
            Some(BoardMode::Still) => self.capture_still().map(Some),
            None => Err(PhotoboothError::DeviceCommunication(
                "board camera not configured".to_string(),
            )),
        }
    }
}

fn unavailable(tool: &str, err: &std::io::Error) -> PhotoboothError {
    PhotoboothError::DeviceCommunication(format!("cannot run {tool}: {err}"))
}

/// Count entries of the form `0 : imx708 [4608x2592 ...]`.
fn count_cameras(listing: &str) -> usize {
    listing
        .lines()
        .filter(|line| {
            let mut parts = line.trim_start().splitn(2, " : ");
            match (parts.next(), parts.next()) {
                (Some(index), Some(_)) => {
                    !index.is_empty() && index.chars().all(|c| c.is_ascii_digit())
                }
                _ => false,
            }
        })
        .count()
}
