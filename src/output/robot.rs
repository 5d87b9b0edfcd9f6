//! Robot mode JSON output implementation.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, error, instrument, trace};

use crate::config::AppConfig;
use crate::device::Calibration;
use crate::error::PhotoboothError;

use super::{Output, PrintReport, ProbeReport, RobotFormat, SessionReport, TemplateSummary};

/// JSON output implementation for scripting.
pub struct RobotOutput {
    format: RobotFormat,
}

impl RobotOutput {
    #[instrument]
    pub fn new(format: RobotFormat) -> Self {
        debug!(?format, "Creating RobotOutput");
        Self { format }
    }

    fn render<T: Serialize + ?Sized>(&self, data: &T, pretty: bool) -> Option<String> {
        let json = if pretty {
            serde_json::to_string_pretty(data)
        } else {
            serde_json::to_string(data)
        };
        json.inspect_err(|e| error!(error = %e, "JSON serialization failed"))
            .ok()
    }

    /// Output any serializable data as JSON to stdout.
    fn output_json<T: Serialize + ?Sized>(&self, data: &T) {
        let pretty = matches!(self.format, RobotFormat::Json);
        if let Some(json) = self.render(data, pretty) {
            trace!(json_len = json.len(), "JSON serialized");
            println!("{json}");
        }
    }

    /// Output pretty JSON to stderr.
    fn output_json_stderr<T: Serialize>(&self, data: &T) {
        if let Some(json) = self.render(data, true) {
            eprintln!("{json}");
        }
    }
}

impl Output for RobotOutput {
    fn success(&self, message: &str) {
        self.output_json(&serde_json::json!({ "success": true, "message": message }));
    }

    #[instrument(skip(self))]
    fn error(&self, error: &PhotoboothError) {
        debug!(error = %error, "Robot: error");
        self.output_json_stderr(&serde_json::json!({
            "error": true,
            "message": error.to_string(),
            "suggestion": error.suggestion(),
            "recoverable": error.is_user_recoverable(),
            "fatal": error.is_fatal(),
        }));
    }

    fn error_message(&self, message: &str) {
        self.output_json_stderr(&serde_json::json!({
            "error": true,
            "message": message,
            "recoverable": false,
        }));
    }

    fn warning(&self, message: &str) {
        self.output_json(&serde_json::json!({ "warning": true, "message": message }));
    }

    fn info(&self, message: &str) {
        self.output_json(&serde_json::json!({ "info": true, "message": message }));
    }

    fn probe_report(&self, report: &ProbeReport) {
        self.output_json(report);
    }

    fn photo_captured(&self, path: &Path) {
        self.output_json(&serde_json::json!({ "photo": path.display().to_string(), "ok": true }));
    }

    fn calibration_written(&self, calibration: &Calibration, overlay: &Path, saved: bool) {
        self.output_json(&serde_json::json!({
            "calibration": calibration,
            "overlay": overlay.display().to_string(),
            "saved": saved,
        }));
    }

    fn print_submitted(&self, report: &PrintReport) {
        self.output_json(report);
    }

    #[instrument(skip(self, templates), fields(count = templates.len()))]
    fn template_list(&self, templates: &[TemplateSummary]) {
        self.output_json(templates);
    }

    fn collage_written(&self, path: &Path, width: u32, height: u32) {
        self.output_json(&serde_json::json!({
            "collage": path.display().to_string(),
            "width": width,
            "height": height,
            "ok": true,
        }));
    }

    fn preview_written(&self, template: &str, path: &Path) {
        self.output_json(&serde_json::json!({
            "template": template,
            "preview": path.display().to_string(),
        }));
    }

    fn session_finished(&self, report: &SessionReport) {
        self.output_json(report);
    }

    fn config(&self, path: Option<&Path>, config: &AppConfig) {
        self.output_json(&serde_json::json!({
            "path": path.map(|p| p.display().to_string()),
            "config": config,
        }));
    }

    fn config_path(&self, path: Option<&Path>) {
        self.output_json(&serde_json::json!({ "path": path.map(|p| p.display().to_string()) }));
    }

    fn version_info(&self, version: &str, git_sha: Option<&str>, build_time: Option<&str>) {
        self.output_json(&serde_json::json!({
            "version": version,
            "git_sha": git_sha,
            "build_time": build_time
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{BackendKind, CameraMode, Unavailable};

    #[test]
    fn probe_report_is_serializable() {
        let report = ProbeReport {
            mode: CameraMode::Single {
                device: BackendKind::Webcam,
            },
            physical_flash: false,
            printer: Some("selphy".to_string()),
            calibration: None,
            unavailable: vec![Unavailable {
                backend: "vendor_protocol".to_string(),
                reason: "no camera detected".to_string(),
            }],
        };
        let output = RobotOutput::new(RobotFormat::JsonCompact);
        let json = output.render(&report, false).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["mode"], "single");
        assert_eq!(parsed["device"], "webcam");
        assert_eq!(parsed["printer"], "selphy");
        assert_eq!(parsed["unavailable"][0]["reason"], "no camera detected");
        assert!(!json.contains('\n'));
    }

    #[test]
    fn session_report_skips_empty_fields() {
        let report = SessionReport {
            template: "Strip".to_string(),
            shots: vec!["capture-0.jpg".to_string()],
            ..SessionReport::default()
        };
        let parsed = serde_json::to_value(&report).unwrap();
        assert_eq!(parsed["template"], "Strip");
        assert!(parsed.get("print").is_none());
        assert!(parsed.get("saved_to").is_none());
    }

    #[test]
    fn error_json_has_required_fields() {
        let err = PhotoboothError::NoCameraAvailable;
        let json = serde_json::json!({
            "error": true,
            "message": err.to_string(),
            "suggestion": err.suggestion(),
            "recoverable": err.is_user_recoverable(),
        });
        assert_eq!(json["error"], true);
        assert!(json["message"].is_string());
        assert!(json["suggestion"].is_string());
        assert!(json["recoverable"].is_boolean());
    }

    #[test]
    fn robot_format_selection() {
        let pretty = RobotOutput::new(RobotFormat::Json);
        let compact = RobotOutput::new(RobotFormat::JsonCompact);
        assert!(matches!(pretty.format, RobotFormat::Json));
        assert!(matches!(compact.format, RobotFormat::JsonCompact));
    }
}
