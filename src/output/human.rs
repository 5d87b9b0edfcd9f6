//! Human-friendly output implementation using console styles.

use std::path::Path;

use console::Term;
use tracing::{debug, instrument, trace};

use crate::config::AppConfig;
use crate::device::Calibration;
use crate::error::PhotoboothError;
use crate::theme::BoothTheme;

use super::{Output, PrintReport, ProbeReport, SessionReport, TemplateSummary};

/// Styled terminal output implementation for human users.
pub struct HumanOutput {
    out: Term,
    err: Term,
    theme: BoothTheme,
    quiet: bool,
}

impl HumanOutput {
    #[instrument]
    pub fn new(color: bool, quiet: bool) -> Self {
        debug!("Creating HumanOutput");
        let out = Term::stdout();
        let color = color && out.features().colors_supported();
        Self {
            out,
            err: Term::stderr(),
            theme: BoothTheme::new(color),
            quiet,
        }
    }

    fn line(&self, text: &str) {
        // A closed stdout is not worth failing a command for
        if let Err(e) = self.out.write_line(text) {
            trace!(error = %e, "stdout write failed");
        }
    }

    fn err_line(&self, text: &str) {
        if let Err(e) = self.err.write_line(text) {
            trace!(error = %e, "stderr write failed");
        }
    }

    fn field(&self, name: &str, value: &str) {
        self.line(&format!(
            "  {}{}",
            self.theme.label.apply_to(format!("{name:<12}")),
            self.theme.value.apply_to(value)
        ));
    }

    fn path(&self, path: &Path) -> String {
        self.theme.path.apply_to(path.display()).to_string()
    }
}

impl Output for HumanOutput {
    fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line(&format!("{} {message}", self.theme.success.apply_to("[OK]").bold()));
    }

    #[instrument(skip(self))]
    fn error(&self, error: &PhotoboothError) {
        debug!(error = %error, recoverable = error.is_user_recoverable(), "Outputting error");
        self.err_line(&format!(
            "{} {}",
            self.theme.error.apply_to("[ERR]").bold(),
            self.theme.value.apply_to(error)
        ));
        if let Some(suggestion) = error.suggestion() {
            self.err_line(&format!(
                "  {} {}",
                self.theme.label.apply_to("Suggestion:"),
                self.theme.muted.apply_to(suggestion)
            ));
        }
    }

    fn error_message(&self, message: &str) {
        self.err_line(&format!("{} {message}", self.theme.error.apply_to("[ERR]").bold()));
    }

    fn warning(&self, message: &str) {
        self.err_line(&format!("{} {message}", self.theme.warning.apply_to("[WARN]").bold()));
    }

    fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line(&format!("{} {message}", self.theme.accent.apply_to("[INFO]").bold()));
    }

    fn probe_report(&self, report: &ProbeReport) {
        let (preview, capture) = report.roles();
        self.line(&self.theme.header.apply_to("Cameras").to_string());
        self.field("Preview", &self.theme.backend.apply_to(preview).to_string());
        self.field("Capture", &self.theme.backend.apply_to(capture).to_string());
        self.field("Hybrid", if preview == capture { "no" } else { "yes" });
        self.field("Flash", if report.physical_flash { "physical" } else { "status light" });
        if let Some(calibration) = &report.calibration {
            self.field("Calibration", &calibration.to_string());
        }

        self.line(&self.theme.header.apply_to("Printer").to_string());
        self.field("Destination", report.printer.as_deref().unwrap_or("none"));

        if !report.unavailable.is_empty() {
            self.line(&self.theme.header.apply_to("Unavailable").to_string());
            for backend in &report.unavailable {
                self.line(&format!(
                    "  {} {}",
                    self.theme.backend.apply_to(format!("{:<16}", backend.backend)),
                    self.theme.muted.apply_to(&backend.reason)
                ));
            }
        }
    }

    fn photo_captured(&self, path: &Path) {
        self.success(&format!("Photo saved to {}", self.path(path)));
    }

    fn calibration_written(&self, calibration: &Calibration, overlay: &Path, saved: bool) {
        self.success(&format!("Overlay for {calibration} written to {}", self.path(overlay)));
        if saved {
            self.info("Calibration stored in the configuration file");
        }
    }

    fn print_submitted(&self, report: &PrintReport) {
        let state = match report.completed {
            Some(true) => "printed",
            _ => "queued",
        };
        self.success(&format!(
            "Job {} {state} on {} ({} {})",
            self.theme.value.apply_to(&report.job_id),
            report.printer,
            report.copies,
            if report.copies == 1 { "copy" } else { "copies" }
        ));
    }

    #[instrument(skip(self, templates), fields(count = templates.len()))]
    fn template_list(&self, templates: &[TemplateSummary]) {
        for template in templates {
            self.line(&format!(
                "{} {}",
                self.theme.header.apply_to(&template.name),
                self.theme.muted.apply_to(format!(
                    "{} photo(s), {}x{} px{}",
                    template.photos,
                    template.page_width,
                    template.page_height,
                    if template.duplicate_horizontal { ", duplicated for print" } else { "" }
                ))
            ));
            if !template.description.is_empty() {
                self.line(&format!("  {}", template.description));
            }
            if let Some(file) = &template.file {
                self.line(&format!("  {}", self.theme.path.apply_to(file)));
            }
        }
    }

    fn collage_written(&self, path: &Path, width: u32, height: u32) {
        self.success(&format!("Collage {width}x{height} written to {}", self.path(path)));
    }

    fn preview_written(&self, template: &str, path: &Path) {
        self.success(&format!("Layout preview of '{template}' written to {}", self.path(path)));
    }

    fn session_finished(&self, report: &SessionReport) {
        self.line(&self.theme.header.apply_to(format!("Session: {}", report.template)).to_string());
        self.field("Shots", &report.shots.len().to_string());
        if !report.failed_shots.is_empty() {
            let failed: Vec<String> = report.failed_shots.iter().map(ToString::to_string).collect();
            self.field("Failed", &failed.join(", "));
        }
        if let Some(collage) = &report.collage {
            self.field("Collage", collage);
        }
        if let Some(print) = &report.print {
            self.field("Print job", &print.job_id);
        }
        if let Some(saved) = &report.saved_to {
            self.field("Saved to", saved);
        }
    }

    fn config(&self, path: Option<&Path>, config: &AppConfig) {
        self.config_path(path);
        match crate::config::ConfigFormat::Toml.render(config) {
            Ok(text) => self.line(&text),
            Err(e) => self.error(&e),
        }
    }

    fn config_path(&self, path: Option<&Path>) {
        match path {
            Some(path) => {
                self.line(&format!("{} {}", self.theme.label.apply_to("#"), self.path(path)));
            }
            None => {
                self.line(&self.theme.muted.apply_to("# no configuration directory").to_string());
            }
        }
    }

    fn version_info(&self, version: &str, git_sha: Option<&str>, build_time: Option<&str>) {
        self.line(&format!(
            "{} {}",
            self.theme.header.apply_to("photobooth"),
            self.theme.value.apply_to(version)
        ));
        if let Some(sha) = git_sha {
            let dirty = matches!(option_env!("VERGEN_GIT_DIRTY"), Some("true"));
            let suffix = if dirty {
                self.theme.warning.apply_to(" (dirty)").to_string()
            } else {
                String::new()
            };
            self.field("Git SHA", &format!("{sha}{suffix}"));
        }
        if let Some(time) = build_time {
            self.field("Built", time);
        }
        if let Some(rustc) = option_env!("VERGEN_RUSTC_SEMVER") {
            self.field("Rust", rustc);
        }
        if let Some(target) = option_env!("VERGEN_CARGO_TARGET_TRIPLE") {
            self.field("Target", target);
        }
    }
}
