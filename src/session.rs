//! Headless photo session workflow.
//!
//! A session takes one photo per template slot into a temp directory,
//! assembles the collage, optionally prints it, then archives the results:
//!
//! ```text
//! <dcim>/tmp/capture-0.jpg ...      shots, in slot order
//! <dcim>/tmp/collage.jpg            display collage
//! <dcim>/tmp/collage_small.jpg      bounded companion
//! <dcim>/tmp/collage_print.jpg      double-wide page, duplicating templates only
//! <dcim>/save/<YYYYmmdd_HHMMSS>/    archived shots and collage
//! ```
//!
//! Captures and assembly run on a [`Worker`]; callers poll the `is_*_completed`
//! predicates from their own loop. Only one worker runs at a time.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::{debug, error, info, instrument, warn};

use crate::collage::TemplateCollage;
use crate::context::HardwareContext;
use crate::device::{DeviceManager, JobId, PrintStatus};
use crate::error::{PhotoboothError, Result, ResultExt};
use crate::frame::Frame;
use crate::worker::Worker;

/// Seconds a print may stay pending before it counts as stuck.
pub const DEFAULT_PRINT_TIMEOUT: Duration = Duration::from_secs(30);

const SAVE_DIR_FORMAT: &str = "%Y%m%d_%H%M%S";
const UNSAVED_MARKERS: [&str; 2] = ["_small", "_print"];

/// Temp and archive directories under a DCIM root.
#[derive(Debug, Clone)]
pub struct SessionDirs {
    tmp: PathBuf,
    save: PathBuf,
}

impl SessionDirs {
    /// Use `<dcim>/tmp` and `<dcim>/save`, creating them.
    pub fn new(dcim: &Path) -> Result<Self> {
        let dirs = Self {
            tmp: dcim.join("tmp"),
            save: dcim.join("save"),
        };
        for dir in [&dirs.tmp, &dirs.save] {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
        Ok(dirs)
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp
    }

    pub fn save_dir(&self) -> &Path {
        &self.save
    }

    pub fn shot(&self, index: usize) -> PathBuf {
        self.tmp.join(format!("capture-{index}.jpg"))
    }

    pub fn collage(&self) -> PathBuf {
        self.tmp.join("collage.jpg")
    }

    /// Move the temp files into a directory named after the current time.
    pub fn save(&self) -> Result<Option<PathBuf>> {
        self.save_at(Local::now())
    }

    /// Move the temp files into `save/<stamp>/`, skipping `_small` and
    /// `_print` companions. Returns `None` when there is nothing to save.
    #[instrument(skip(self))]
    pub fn save_at(&self, stamp: DateTime<Local>) -> Result<Option<PathBuf>> {
        let files = self.tmp_files()?;
        if files.is_empty() {
            debug!("Nothing to save");
            return Ok(None);
        }

        let destination = self.save.join(stamp.format(SAVE_DIR_FORMAT).to_string());
        fs::create_dir_all(&destination)?;

        let mut moved = 0;
        for file in files {
            let Some(name) = file.file_name() else {
                continue;
            };
            if UNSAVED_MARKERS
                .iter()
                .any(|marker| name.to_string_lossy().contains(marker))
            {
                continue;
            }
            move_file(&file, &destination.join(name))?;
            moved += 1;
        }
        info!(destination = %destination.display(), moved, "Session saved");
        Ok(Some(destination))
    }

    /// Delete every file in the temp directory. Returns how many went.
    pub fn purge_tmp(&self) -> Result<usize> {
        let files = self.tmp_files()?;
        for file in &files {
            fs::remove_file(file)?;
        }
        debug!(removed = files.len(), "Temp directory purged");
        Ok(files.len())
    }

    fn tmp_files(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.tmp)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        Ok(files)
    }
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // Cross-device moves cannot be renames
    fs::copy(from, to).with_context(|| format!("archiving {}", from.display()))?;
    fs::remove_file(from)?;
    Ok(())
}

/// What a finished worker produced.
#[derive(Debug)]
enum Outcome {
    Shot,
    Collage { printable: PathBuf },
}

/// One run through the booth for a chosen template.
pub struct PhotoSession {
    context: HardwareContext,
    template: TemplateCollage,
    dirs: SessionDirs,
    next_shot: usize,
    worker: Option<Worker<Result<Outcome>>>,
    // Slot the running worker captures, rolled back if it fails
    shot_in_flight: Option<usize>,
    printable: Option<PathBuf>,
    countdown: Duration,
    print_timeout: Duration,
}

impl PhotoSession {
    pub fn new(context: HardwareContext, template: TemplateCollage, dirs: SessionDirs) -> Self {
        Self {
            context,
            template,
            dirs,
            next_shot: 0,
            worker: None,
            shot_in_flight: None,
            printable: None,
            countdown: Duration::ZERO,
            print_timeout: DEFAULT_PRINT_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_countdown(mut self, countdown: Duration) -> Self {
        self.countdown = countdown;
        self
    }

    #[must_use]
    pub const fn with_print_timeout(mut self, timeout: Duration) -> Self {
        self.print_timeout = timeout;
        self
    }

    pub fn template(&self) -> &TemplateCollage {
        &self.template
    }

    pub fn dirs(&self) -> &SessionDirs {
        &self.dirs
    }

    pub fn shots_to_take(&self) -> usize {
        self.template.photos_required()
    }

    /// Index of the shot [`trigger_shot`](Self::trigger_shot) accepts next.
    pub const fn next_shot(&self) -> usize {
        self.next_shot
    }

    pub fn has_physical_flash(&self) -> bool {
        self.context.devices().has_physical_flash()
    }

    pub fn has_printer(&self) -> bool {
        self.context.devices().has_printer()
    }

    /// Live view cropped to the template's slot shape.
    pub fn preview(&self) -> Option<Frame> {
        self.context
            .devices()
            .get_preview(Some(self.template.get_aspect_ratio()))
    }

    /// Start the light countdown and wait it out.
    pub fn countdown(&self) {
        if self.countdown.is_zero() {
            return;
        }
        self.context.light().start_countdown(self.countdown);
        thread::sleep(self.countdown);
    }

    /// True while a capture or assembly is running.
    pub fn is_busy(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Capture shot `index` on a worker.
    ///
    /// # Errors
    ///
    /// * [`PhotoboothError::WorkerBusy`] while another worker runs.
    /// * [`PhotoboothError::ShotOutOfOrder`] unless `index` is the next slot.
    pub fn trigger_shot(&mut self, index: usize) -> Result<()> {
        self.ensure_idle()?;
        let expected = self.next_shot;
        if index != expected || index >= self.shots_to_take() {
            return Err(PhotoboothError::ShotOutOfOrder {
                requested: index,
                expected,
            });
        }

        let context = self.context.clone();
        let path = self.dirs.shot(index);
        let aspect_ratio = self.template.get_aspect_ratio();
        info!(index, path = %path.display(), aspect_ratio, "Triggering shot");

        self.worker = Some(Worker::spawn(&format!("capture-{index}"), move || {
            let flash = context.flash_callback();
            context
                .devices()
                .capture(&path, Some(aspect_ratio), Some(&flash))
                .map(|()| Outcome::Shot)
        })?);
        self.shot_in_flight = Some(index);
        self.next_shot += 1;
        Ok(())
    }

    /// Non-blocking check that shot `index` is done.
    ///
    /// A failed capture is logged and the shot may be triggered again;
    /// whether a photo exists is then visible through [`shot_exists`](Self::shot_exists).
    pub fn is_shot_completed(&mut self, index: usize) -> bool {
        let finished = self.reap();
        if finished {
            debug!(index, exists = self.shot_exists(index), "Shot finished");
        }
        finished
    }

    pub fn shot_exists(&self, index: usize) -> bool {
        self.dirs.shot(index).exists()
    }

    /// Assemble the collage from the shots on a worker.
    pub fn trigger_collage(&mut self) -> Result<()> {
        self.ensure_idle()?;
        let photos: Vec<PathBuf> = (0..self.shots_to_take()).map(|i| self.dirs.shot(i)).collect();
        let output = self.dirs.collage();
        let template = self.template.clone();
        info!(template = %template.name(), photos = photos.len(), "Triggering collage");

        self.worker = Some(Worker::spawn("collage", move || {
            template
                .render_artifacts(&photos, &output)
                .map(|printable| Outcome::Collage { printable })
        })?);
        Ok(())
    }

    /// Non-blocking check that the collage is assembled.
    pub fn is_collage_completed(&mut self) -> bool {
        self.reap()
    }

    pub fn collage_path(&self) -> PathBuf {
        self.dirs.collage()
    }

    /// File [`trigger_print`](Self::trigger_print) submits: the double-wide
    /// page for duplicating templates, else the display collage.
    pub fn printable_path(&self) -> PathBuf {
        self.printable.clone().unwrap_or_else(|| self.dirs.collage())
    }

    /// Submit the collage, with the template's print options and `copies`.
    pub fn trigger_print(&self, copies: u32) -> Result<PrintTracker> {
        let file = self.printable_path();
        let mut params = self.template.print_params();
        params.insert("copies".to_string(), copies.to_string());

        let job = self.context.devices().print(&file, &params)?;
        info!(%job, file = %file.display(), copies, "Print triggered");
        Ok(PrintTracker::new(job, self.print_timeout))
    }

    /// Archive the shots and collage, then start over.
    pub fn save(&mut self) -> Result<Option<PathBuf>> {
        self.ensure_idle()?;
        let saved = self.dirs.save()?;
        self.reset()?;
        Ok(saved)
    }

    /// Drop the temp files and start over.
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.dirs.purge_tmp()?;
        self.next_shot = 0;
        self.printable = None;
        self.context.light().start_rainbow();
        Ok(())
    }

    fn ensure_idle(&mut self) -> Result<()> {
        if self.is_busy() {
            let task = self.worker.as_ref().map_or("unknown", |w| w.name()).to_string();
            return Err(PhotoboothError::WorkerBusy { task });
        }
        self.reap();
        Ok(())
    }

    // Join a finished worker and record its outcome. False while it runs
    // or when there is none
    fn reap(&mut self) -> bool {
        let Some(worker) = self.worker.take_if(|w| w.is_finished()) else {
            return false;
        };
        let shot = self.shot_in_flight.take();
        match (worker.join().and_then(|result| result), shot) {
            (Ok(Outcome::Collage { printable }), _) => self.printable = Some(printable),
            (Ok(Outcome::Shot), _) => {}
            (Err(e), Some(index)) => {
                error!(index, error = %e, "Capture failed");
                self.next_shot = self.next_shot.min(index);
            }
            (Err(e), None) => error!(error = %e, "Collage assembly failed"),
        }
        true
    }
}

/// Follows one print job and flags it when it gets stuck.
#[derive(Debug, Clone)]
pub struct PrintTracker {
    job: JobId,
    submitted: Instant,
    timeout: Duration,
}

impl PrintTracker {
    pub fn new(job: JobId, timeout: Duration) -> Self {
        Self {
            job,
            submitted: Instant::now(),
            timeout,
        }
    }

    pub const fn job(&self) -> &JobId {
        &self.job
    }

    /// Query the job once.
    ///
    /// A failing query counts as done.
    ///
    /// # Errors
    ///
    /// Returns [`PhotoboothError::PrintTimeout`] once the job has been
    /// pending for longer than the timeout. The job is left in the queue.
    pub fn poll(&self, devices: &DeviceManager) -> Result<PrintStatus> {
        let status = devices.get_print_status(&self.job).unwrap_or_else(|e| {
            warn!(job = %self.job, error = %e, "Print status unknown, treating job as done");
            PrintStatus::Done
        });

        let waited = self.submitted.elapsed();
        if status == PrintStatus::Pending && waited >= self.timeout {
            warn!(job = %self.job, waited_secs = waited.as_secs(), "Print job stuck");
            return Err(PhotoboothError::PrintTimeout {
                job_id: self.job.to_string(),
                waited_secs: waited.as_secs(),
            });
        }
        Ok(status)
    }

    /// Poll every `interval` until the job is done or times out.
    pub fn wait(&self, devices: &DeviceManager, interval: Duration) -> Result<()> {
        while self.poll(devices)? == PrintStatus::Pending {
            thread::sleep(interval);
        }
        info!(job = %self.job, "Print finished");
        Ok(())
    }
}
