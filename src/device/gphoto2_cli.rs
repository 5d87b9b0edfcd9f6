//! [`VendorSession`] over the `gphoto2` command-line tool.

use std::path::Path;
use std::process::{Command, Output};

use tracing::{debug, trace};

use super::VendorSession;
use crate::error::{PhotoboothError, Result};

const GPHOTO2: &str = "gphoto2";
const MANUFACTURER_PATH: &str = "/main/status/manufacturer";

/// One detected camera, addressed by its gphoto2 port.
#[derive(Debug, Clone)]
pub struct Gphoto2Cli {
    model: String,
    port: String,
}

impl Gphoto2Cli {
    /// Pick a connected camera: the one on `port` if given, else the first.
    pub fn detect(port: Option<&str>) -> Result<Self> {
        let output = run(Command::new(GPHOTO2).arg("--auto-detect"))?;
        let cameras = parse_auto_detect(&String::from_utf8_lossy(&output.stdout));
        debug!(count = cameras.len(), "gphoto2 auto-detect");

        cameras
            .into_iter()
            .find(|(_, p)| port.is_none_or(|wanted| p.as_str() == wanted))
            .map(|(model, port)| Self { model, port })
            .ok_or_else(|| {
                PhotoboothError::DeviceCommunication("no gphoto2 camera detected".to_string())
            })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(GPHOTO2);
        cmd.arg("--port").arg(&self.port);
        cmd
    }
}

impl VendorSession for Gphoto2Cli {
    fn manufacturer(&mut self) -> Result<String> {
        // Older bodies do not expose the status node, the model name starts
        // with the brand anyway
        Ok(self
            .get_setting(MANUFACTURER_PATH)
            .unwrap_or_else(|_| self.model.clone()))
    }

    fn get_setting(&mut self, path: &str) -> Result<String> {
        let output = run(self.command().arg("--get-config").arg(path))?;
        parse_current(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
            PhotoboothError::DeviceCommunication(format!("no current value for {path}"))
        })
    }

    fn set_setting(&mut self, path: &str, value: &str) -> Result<()> {
        run(self.command().arg("--set-config").arg(format!("{path}={value}")))?;
        Ok(())
    }

    fn capture_preview(&mut self) -> Result<Vec<u8>> {
        let output = run(self.command().args(["--capture-preview", "--stdout"]))?;
        if output.stdout.is_empty() {
            return Err(PhotoboothError::DeviceCommunication(
                "empty live view frame".to_string(),
            ));
        }
        Ok(output.stdout)
    }

    fn capture_image(&mut self, output_path: &Path) -> Result<()> {
        run(self
            .command()
            .args(["--capture-image-and-download", "--force-overwrite", "--filename"])
            .arg(output_path))?;
        if !output_path.exists() {
            return Err(PhotoboothError::DeviceCommunication(format!(
                "gphoto2 did not write {}",
                output_path.display()
            )));
        }
        Ok(())
    }
}

fn run(cmd: &mut Command) -> Result<Output> {
    trace!(?cmd, "Running gphoto2");
    let output = cmd
        .output()
        .map_err(|e| PhotoboothError::DeviceCommunication(format!("cannot run {GPHOTO2}: {e}")))?;
    if output.status.success() {
        Ok(output)
    } else {
        Err(PhotoboothError::DeviceCommunication(format!(
            "{GPHOTO2} failed ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

/// Parse `gphoto2 --auto-detect` into `(model, port)` pairs.
fn parse_auto_detect(stdout: &str) -> Vec<(String, String)> {
    stdout
        .lines()
        .skip_while(|line| !line.starts_with("---"))
        .skip(1)
        .filter_map(|line| {
            let line = line.trim_end();
            let split = line.rfind("  ")?;
            let model = line[..split].trim();
            let port = line[split..].trim();
            (!model.is_empty() && !port.is_empty()).then(|| (model.to_string(), port.to_string()))
        })
        .collect()
}

/// Extract the `Current:` value from `gphoto2 --get-config` output.
fn parse_current(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("Current:"))
        .map(|value| value.trim().to_string())
}
