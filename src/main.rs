//! Photobooth CLI - cameras, collages and printing for a photo booth.
//!
//! Provides both human-friendly and agent-friendly (robot mode) interfaces.
#![forbid(unsafe_code)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use photobooth::cli::{self, Cli, Commands, TemplateSelector};
use photobooth::collage::{TemplateCollage, load_templates};
use photobooth::config::{AppConfig, default_config_path};
use photobooth::context::{HardwareContext, LogLight};
use photobooth::device::{Calibration, DeviceManager, PrintParams, PrintStatus};
use photobooth::error::PhotoboothError;
use photobooth::logging::init_logging;
use photobooth::output::{
    Output, OutputMode, PrintReport, ProbeReport, SessionReport, TemplateSummary,
};
use photobooth::session::{PhotoSession, PrintTracker, SessionDirs};

/// Capture attempts per slot before a session gives up.
const SHOT_ATTEMPTS: usize = 3;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const PRINT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Build information embedded at compile time.
mod build_info {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    pub fn git_sha() -> Option<&'static str> {
        option_env!("VERGEN_GIT_SHA")
    }

    pub fn build_timestamp() -> Option<&'static str> {
        option_env!("VERGEN_BUILD_TIMESTAMP")
    }
}

/// Everything a command needs besides its own arguments.
struct App<'a> {
    cli: &'a Cli,
    output: Box<dyn Output>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.use_json(), cli.verbose, cli.quiet);

    let app = App {
        cli: &cli,
        output: OutputMode::from_cli(&cli).into_output(),
    };

    if let Err(e) = run(&app) {
        match e.downcast_ref::<PhotoboothError>() {
            Some(error) => app.output.error(error),
            None => app.output.error_message(&format!("{e:#}")),
        }
        std::process::exit(1);
    }
}

fn run(app: &App<'_>) -> anyhow::Result<()> {
    let Some(command) = &app.cli.command else {
        return print_quick_start(app);
    };

    match command {
        Commands::Version => return cmd_version(app),
        Commands::Completions(args) => return cmd_completions(args),
        _ => {}
    }

    let config = AppConfig::load_or_default(app.cli.config.as_deref())?;
    match command {
        Commands::Probe => cmd_probe(app, &config),
        Commands::Capture(args) => cmd_capture(app, &config, args),
        Commands::Calibrate(args) => cmd_calibrate(app, &config, args),
        Commands::Print(args) => cmd_print(app, &config, args),
        Commands::Templates(args) => cmd_templates(app, &config, args),
        Commands::Assemble(args) => cmd_assemble(app, &config, args),
        Commands::TemplatePreview(args) => cmd_template_preview(app, &config, args),
        Commands::Session(args) => cmd_session(app, &config, args),
        Commands::Config(args) => cmd_config(app, &config, args),
        Commands::Version | Commands::Completions(_) => Ok(()),
    }
}

// === Quick Start ===

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn print_quick_start(app: &App<'_>) -> anyhow::Result<()> {
    if app.cli.use_json() {
        let help = serde_json::json!({
            "tool": "photobooth",
            "version": build_info::VERSION,
            "hardware": {
                "probe": "photobooth probe --robot",
                "capture": "photobooth capture <OUT.jpg> [--aspect-ratio R] [--flash]",
                "calibrate": "photobooth calibrate <OUT.jpg> --zoom Z [-x DX] [-y DY] [--save]",
                "print": "photobooth print <FILE> [--copies N] [--template NAME] [--wait]",
            },
            "collages": {
                "list": "photobooth templates [DIR] --robot",
                "assemble": "photobooth assemble <PHOTO>... -o <OUT.jpg> [-t NAME] [--for-print]",
                "preview": "photobooth template-preview [-t NAME] [-o OUT.jpg]",
            },
            "workflow": "photobooth session [-t NAME] [--print] [--copies N] [--no-save]",
            "output_modes": {
                "human": "--format=text (default)",
                "robot": "--robot or --format=json",
                "compact": "--format=json-compact",
            },
        });
        println!("{}", serde_json::to_string_pretty(&help)?);
    } else {
        let out = &app.output;
        out.info(&format!("photobooth {} - photo booth CLI", build_info::VERSION));
        out.info("photobooth probe                  Show which camera does what");
        out.info("photobooth templates              List collage templates");
        out.info("photobooth session --print        Take the photos, print the collage");
        out.info("photobooth --help                 Full help");
    }
    Ok(())
}

// === Hardware ===

fn probe_hardware(config: &AppConfig) -> photobooth::error::Result<HardwareContext> {
    HardwareContext::probe(config, Arc::new(LogLight))
}

fn cmd_probe(app: &App<'_>, config: &AppConfig) -> anyhow::Result<()> {
    let context = probe_hardware(config)?;
    app.output.probe_report(&ProbeReport::new(context.devices()));
    Ok(())
}

fn cmd_capture(app: &App<'_>, config: &AppConfig, args: &cli::CaptureArgs) -> anyhow::Result<()> {
    let context = probe_hardware(config)?;
    let devices = context.devices();

    if args.flash && !devices.has_physical_flash() {
        let flash = context.flash_callback();
        devices.capture(&args.output, args.aspect_ratio, Some(&flash))?;
    } else {
        devices.capture(&args.output, args.aspect_ratio, None)?;
    }
    app.output.photo_captured(&args.output);
    Ok(())
}

fn cmd_calibrate(
    app: &App<'_>,
    config: &AppConfig,
    args: &cli::CalibrateArgs,
) -> anyhow::Result<()> {
    let candidate = Calibration::new(args.zoom, args.x_offset, args.y_offset)?;
    let context = probe_hardware(config)?;

    let overlay = context
        .devices()
        .calibration_overlay(&candidate)?
        .ok_or_else(|| {
            PhotoboothError::Other(
                "No overlay: calibration needs a preview and a capture camera with live view"
                    .to_string(),
            )
        })?;
    overlay.save(&args.output)?;

    if args.save {
        let path = app
            .cli
            .config
            .clone()
            .or_else(default_config_path)
            .context("No configuration path to save the calibration to")?;
        let mut updated = config.clone();
        updated.calibration = Some(candidate);
        updated.save(&path)?;
        info!(path = %path.display(), %candidate, "Calibration saved");
    }

    app.output.calibration_written(&candidate, &args.output, args.save);
    Ok(())
}

fn cmd_print(app: &App<'_>, config: &AppConfig, args: &cli::PrintArgs) -> anyhow::Result<()> {
    if !args.file.exists() {
        return Err(PhotoboothError::ImageNotFound {
            path: args.file.display().to_string(),
        }
        .into());
    }

    let mut params = if args.selector.template.is_some() {
        select_template(config, &args.selector)?.print_params()
    } else {
        PrintParams::new()
    };
    params.insert("copies".to_string(), args.copies.to_string());

    let context = probe_hardware(config)?;
    let devices = context.devices();
    let job = devices.print(&args.file, &params)?;

    let completed = if args.wait {
        let timeout = Duration::from_secs(config.session.print_timeout_secs);
        let tracker = PrintTracker::new(job.clone(), timeout);
        Some(wait_for_print(app, devices, &tracker)?)
    } else {
        None
    };

    app.output.print_submitted(&PrintReport {
        job_id: job.to_string(),
        file: args.file.display().to_string(),
        printer: devices.printer_name().unwrap_or_default().to_string(),
        copies: args.copies,
        completed,
    });
    Ok(())
}

// === Collages ===

fn cmd_templates(
    app: &App<'_>,
    config: &AppConfig,
    args: &cli::TemplatesArgs,
) -> anyhow::Result<()> {
    let dir = args.dir.clone().unwrap_or_else(|| config.templates_dir());
    let templates = load_templates(&dir)?;
    let summaries: Vec<TemplateSummary> = templates.iter().map(TemplateSummary::from).collect();
    app.output.template_list(&summaries);
    Ok(())
}

fn cmd_assemble(app: &App<'_>, config: &AppConfig, args: &cli::AssembleArgs) -> anyhow::Result<()> {
    let template = select_template(config, &args.selector)?;
    if args.photos.len() != template.photos_required() {
        app.output.warning(&format!(
            "Template '{}' has {} slot(s), got {} photo(s)",
            template.name(),
            template.photos_required(),
            args.photos.len()
        ));
    }

    let collage = template.assemble(&args.photos, Some(&args.output), args.for_print)?;
    app.output
        .collage_written(&args.output, collage.width(), collage.height());
    Ok(())
}

fn cmd_template_preview(
    app: &App<'_>,
    config: &AppConfig,
    args: &cli::TemplatePreviewArgs,
) -> anyhow::Result<()> {
    let template = select_template(config, &args.selector)?;
    let mut path = template.get_preview()?;

    if let Some(output) = &args.output {
        fs::copy(&path, output)
            .with_context(|| format!("Copying preview to {}", output.display()))?;
        if let Err(e) = fs::remove_file(&path) {
            debug!(path = %path.display(), error = %e, "Temp preview left behind");
        }
        path.clone_from(output);
    }

    app.output.preview_written(template.name(), &path);
    Ok(())
}

/// Pick a template by file path, by name, or the first one available.
fn select_template(
    config: &AppConfig,
    selector: &TemplateSelector,
) -> anyhow::Result<TemplateCollage> {
    if let Some(name) = &selector.template {
        let as_path = Path::new(name);
        if as_path.is_file() {
            return Ok(TemplateCollage::load(as_path)?);
        }
    }

    let dir = selector
        .templates_dir
        .clone()
        .unwrap_or_else(|| config.templates_dir());
    let mut templates = load_templates(&dir)?;

    let index = match &selector.template {
        Some(name) => templates
            .iter()
            .position(|t| t.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| PhotoboothError::TemplateNotFound { name: name.clone() })?,
        None => 0,
    };
    let template = templates.swap_remove(index);
    debug!(template = %template.name(), "Template selected");
    Ok(template)
}

// === Workflow ===

fn cmd_session(app: &App<'_>, config: &AppConfig, args: &cli::SessionArgs) -> anyhow::Result<()> {
    let template = select_template(config, &args.selector)?;
    let context = probe_hardware(config)?;
    let dirs = SessionDirs::new(&config.session.dcim_dir)?;
    let countdown = args.countdown.unwrap_or(config.session.countdown_secs);

    let mut session = PhotoSession::new(context.clone(), template, dirs)
        .with_countdown(Duration::from_secs(countdown))
        .with_print_timeout(Duration::from_secs(config.session.print_timeout_secs));
    session.reset()?;

    let mut report = SessionReport {
        template: session.template().name().to_string(),
        ..SessionReport::default()
    };
    let spinner = spinner(app);

    let total = session.shots_to_take();
    let mut attempts = 0;
    while session.next_shot() < total {
        let index = session.next_shot();
        if let Some(frame) = session.preview() {
            debug!(index, width = frame.width(), height = frame.height(), "Live view ready");
        }
        session.countdown();

        spinner.set_message(format!("Shot {}/{total}", index + 1));
        session.trigger_shot(index)?;
        poll_until(&spinner, || session.is_shot_completed(index));

        if session.shot_exists(index) && session.next_shot() > index {
            attempts = 0;
            continue;
        }
        attempts += 1;
        if !report.failed_shots.contains(&index) {
            report.failed_shots.push(index);
        }
        if attempts >= SHOT_ATTEMPTS {
            spinner.finish_and_clear();
            return Err(PhotoboothError::CaptureFailed {
                path: session.dirs().shot(index).display().to_string(),
                reason: format!("gave up after {SHOT_ATTEMPTS} attempts"),
            }
            .into());
        }
        app.output.warning(&format!("Shot {} failed, retaking", index + 1));
    }

    spinner.set_message("Assembling collage");
    session.trigger_collage()?;
    poll_until(&spinner, || session.is_collage_completed());
    spinner.finish_and_clear();

    let collage = session.collage_path();
    if !collage.exists() {
        return Err(PhotoboothError::ImageProcessing(format!(
            "collage was not written to {}",
            collage.display()
        ))
        .into());
    }

    if args.print {
        if session.has_printer() {
            let copies = args.copies.unwrap_or(config.session.copies);
            let tracker = session.trigger_print(copies)?;
            let completed = wait_for_print(app, context.devices(), &tracker)?;
            report.print = Some(PrintReport {
                job_id: tracker.job().to_string(),
                file: session.printable_path().display().to_string(),
                printer: context.devices().printer_name().unwrap_or_default().to_string(),
                copies,
                completed: Some(completed),
            });
        } else {
            app.output.warning("No printer available, skipping print");
        }
    }

    let shots: Vec<PathBuf> = (0..total).map(|i| session.dirs().shot(i)).collect();
    let saved = if args.no_save { None } else { session.save()? };
    let located = |path: &Path| match (&saved, path.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    };

    report.shots = shots.iter().map(|p| located(p).display().to_string()).collect();
    report.collage = Some(located(&collage).display().to_string());
    report.saved_to = saved.as_ref().map(|p| p.display().to_string());
    app.output.session_finished(&report);
    Ok(())
}

/// Follow a print job. Returns false when it got stuck in the queue.
fn wait_for_print(
    app: &App<'_>,
    devices: &DeviceManager,
    tracker: &PrintTracker,
) -> anyhow::Result<bool> {
    let spinner = spinner(app);
    spinner.set_message(format!("Printing {}", tracker.job()));

    let result = loop {
        match tracker.poll(devices) {
            Ok(PrintStatus::Pending) => {
                spinner.tick();
                thread::sleep(PRINT_POLL_INTERVAL);
            }
            Ok(PrintStatus::Done) => break Ok(true),
            Err(e @ PhotoboothError::PrintTimeout { .. }) => {
                warn!(error = %e, "Giving up on print job");
                app.output.error(&e);
                break Ok(false);
            }
            Err(e) => break Err(e.into()),
        }
    };
    spinner.finish_and_clear();
    result
}

fn spinner(app: &App<'_>) -> ProgressBar {
    if app.cli.use_json() || app.cli.quiet {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    let bar = ProgressBar::new_spinner().with_style(style);
    bar.enable_steady_tick(POLL_INTERVAL);
    bar
}

fn poll_until(spinner: &ProgressBar, mut done: impl FnMut() -> bool) {
    while !done() {
        spinner.tick();
        thread::sleep(POLL_INTERVAL);
    }
}

// === Utilities ===

fn cmd_config(app: &App<'_>, config: &AppConfig, args: &cli::ConfigArgs) -> anyhow::Result<()> {
    let path = app.cli.config.clone().or_else(default_config_path);
    if args.path {
        app.output.config_path(path.as_deref());
    } else {
        app.output.config(path.as_deref(), config);
    }
    Ok(())
}

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn cmd_version(app: &App<'_>) -> anyhow::Result<()> {
    app.output.version_info(
        build_info::VERSION,
        build_info::git_sha(),
        build_info::build_timestamp(),
    );
    Ok(())
}

#[allow(clippy::unnecessary_wraps)] // Consistent return type with other commands
fn cmd_completions(args: &cli::CompletionsArgs) -> anyhow::Result<()> {
    use clap::CommandFactory;
    clap_complete::generate(args.shell, &mut Cli::command(), "photobooth", &mut io::stdout());
    Ok(())
}
