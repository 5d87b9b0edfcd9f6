//! Print spooler backend.
//!
//! [`SpoolPrinter`] implements [`PrintDevice`] on top of a [`Spooler`]; the
//! real spooler is CUPS reached through `lp` and `lpstat`.

use std::collections::HashSet;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Mutex;

use tracing::{debug, info, trace, warn};

use super::{JobId, PrintDevice, PrintParams, PrintStatus, lock};
use crate::error::{PhotoboothError, Result};

/// Spooler-side job state, numbered as in IPP `job-state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending = 3,
    Held = 4,
    Processing = 5,
    Stopped = 6,
    Canceled = 7,
    Aborted = 8,
    Completed = 9,
}

impl JobState {
    /// Jobs in any state from `Stopped` on will not make progress on their
    /// own and count as done.
    pub const fn status(self) -> PrintStatus {
        if (self as u8) < (Self::Stopped as u8) {
            PrintStatus::Pending
        } else {
            PrintStatus::Done
        }
    }
}

/// Narrow interface to a print spooler.
pub trait Spooler: Send + Sync {
    /// System default destination, if one is set.
    fn default_destination(&self) -> Result<Option<String>>;

    /// Every destination the spooler knows.
    fn destinations(&self) -> Result<Vec<String>>;

    /// Queue `file` on `destination` with spooler options.
    fn submit(&self, destination: &str, file: &Path, params: &PrintParams) -> Result<JobId>;

    /// Current state of a job.
    fn job_state(&self, destination: &str, job: &JobId) -> Result<JobState>;
}

/// A resolved spooler destination.
pub struct SpoolPrinter {
    spooler: Box<dyn Spooler>,
    destination: String,
    // Jobs already reported done; their status never goes back
    completed: Mutex<HashSet<JobId>>,
}

impl SpoolPrinter {
    /// Resolve `name` on the spooler.
    ///
    /// `None` or `"default"` picks the system default destination, falling
    /// back to the first one listed. A named destination must exist.
    pub fn connect(spooler: Box<dyn Spooler>, name: Option<&str>) -> Result<Self> {
        let destination = match name.filter(|n| !n.eq_ignore_ascii_case("default")) {
            Some(name) => {
                if !spooler.destinations()?.iter().any(|d| d == name) {
                    return Err(PhotoboothError::PrinterNotFound {
                        name: name.to_string(),
                    });
                }
                name.to_string()
            }
            None => match spooler.default_destination()? {
                Some(default) => default,
                None => spooler
                    .destinations()?
                    .into_iter()
                    .next()
                    .ok_or(PhotoboothError::PrinterUnavailable)?,
            },
        };

        info!(%destination, "Printer connected");
        Ok(Self {
            spooler,
            destination,
            completed: Mutex::new(HashSet::new()),
        })
    }
}

impl PrintDevice for SpoolPrinter {
    fn name(&self) -> &str {
        &self.destination
    }

    fn print(&self, file_path: &Path, params: &PrintParams) -> Result<JobId> {
        if !file_path.exists() {
            return Err(PhotoboothError::ImageNotFound {
                path: file_path.display().to_string(),
            });
        }
        let job = self.spooler.submit(&self.destination, file_path, params)?;
        info!(%job, file = %file_path.display(), ?params, "Print job submitted");
        Ok(job)
    }

    fn get_print_status(&self, job: &JobId) -> Result<PrintStatus> {
        if lock(&self.completed).contains(job) {
            return Ok(PrintStatus::Done);
        }

        let status = match self.spooler.job_state(&self.destination, job) {
            Ok(state) => {
                trace!(%job, ?state, "Print job state");
                state.status()
            }
            Err(e) => {
                // A job the spooler cannot report on will not finish later
                warn!(%job, error = %e, "Print status query failed, treating job as done");
                PrintStatus::Done
            }
        };

        if status == PrintStatus::Done {
            lock(&self.completed).insert(job.clone());
        }
        Ok(status)
    }
}

/// CUPS through its command-line clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct LpSpooler;

impl Spooler for LpSpooler {
    fn default_destination(&self) -> Result<Option<String>> {
        let output = run(Command::new("lpstat").arg("-d"))?;
        Ok(parse_default_destination(&String::from_utf8_lossy(&output.stdout)))
    }

    fn destinations(&self) -> Result<Vec<String>> {
        let output = run(Command::new("lpstat").arg("-e"))?;
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    fn submit(&self, destination: &str, file: &Path, params: &PrintParams) -> Result<JobId> {
        let mut cmd = Command::new("lp");
        cmd.arg("-d").arg(destination);
        for (key, value) in params {
            if key == "copies" {
                cmd.arg("-n").arg(value);
            } else {
                cmd.arg("-o").arg(format!("{key}={value}"));
            }
        }
        cmd.arg("--").arg(file);

        let output = run(&mut cmd)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_request_id(&stdout)
            .map(JobId::new)
            .ok_or_else(|| {
                PhotoboothError::PrintFailed(format!("unexpected lp output: {}", stdout.trim()))
            })
    }

    fn job_state(&self, destination: &str, job: &JobId) -> Result<JobState> {
        let output = run(Command::new("lpstat")
            .args(["-W", "not-completed", "-o"])
            .arg(destination))?;
        let listing = String::from_utf8_lossy(&output.stdout);
        let active = listing
            .lines()
            .any(|line| line.split_whitespace().next() == Some(job.as_str()));
        debug!(%job, active, "lpstat job listing");
        Ok(if active {
            JobState::Processing
        } else {
            JobState::Completed
        })
    }
}

fn run(cmd: &mut Command) -> Result<Output> {
    trace!(?cmd, "Running spooler client");
    let output = cmd
        .output()
        .map_err(|e| PhotoboothError::PrintFailed(format!("cannot run spooler client: {e}")))?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(PhotoboothError::PrintFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

/// `system default destination: Canon_SELPHY` → `Canon_SELPHY`.
fn parse_default_destination(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .find_map(|line| line.split_once("system default destination:"))
        .map(|(_, name)| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// `request id is Canon_SELPHY-42 (1 file(s))` → `Canon_SELPHY-42`.
fn parse_request_id(stdout: &str) -> Option<String> {
    stdout
        .split_once("request id is ")
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .map(ToString::to_string)
}
