use crate::cli::{Cli, Commands, RunArgs, SaveProfileArgs};
use anyhow::{Context, Result};
use std::io::Write;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use videoslim::config::Config;
use videoslim::engine::{
    self, BatchSummary, CompressionService, EncodingProfile, ProfileCatalog, ProfileStore,
    ProgressEvent, Task,
};

/// Exit status after Ctrl-C, as a shell would report SIGINT
const EXIT_INTERRUPTED: i32 = 130;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

pub fn run(cli: Cli) {
    let result = match cli.command {
        Commands::Run(args) => handle_run(args),
        Commands::DryRun(args) => handle_dry_run(args).map(|()| 0),
        Commands::Profiles => handle_profiles().map(|()| 0),
        Commands::SaveProfile(args) => handle_save_profile(args).map(|()| 0),
        Commands::CheckFfmpeg => handle_check_ffmpeg().map(|()| 0),
        Commands::InitConfig => {
            handle_init_config();
            Ok(0)
        }
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: {:#}; using built-in defaults", e);
        Config::default()
    })
}

fn init_logging(config: &Config) {
    let result = config
        .log_path()
        .and_then(|path| engine::init_file_logging(&path, &config.logging.level));
    if let Err(e) = result {
        eprintln!("Warning: logging disabled: {:#}", e);
    }
}

/// Profile catalog with any command-line overrides applied.
/// Returns the catalog and the profile name the task should use.
fn build_catalog(config: &Config, args: &RunArgs) -> Result<(Arc<ProfileCatalog>, String)> {
    let catalog = Arc::new(ProfileCatalog::from_user_dir());
    let profile_name = args
        .profile
        .clone()
        .unwrap_or_else(|| config.defaults.profile.clone());

    if args.has_profile_overrides() {
        let mut profile = catalog
            .get(&profile_name)
            .with_context(|| format!("Profile '{}' not found", profile_name))?;
        if let Some(crf) = args.crf {
            profile.crf = crf;
        }
        if let Some(preset) = args.preset {
            profile.preset = preset;
        }
        if let Some(hwaccel) = args.hwaccel_override() {
            profile.hardware_acceleration = hwaccel;
        }
        tracing::debug!("command-line overrides for profile '{}': {:?}", profile_name, profile);
        catalog.set_override(profile);
    }

    Ok((catalog, profile_name))
}

fn build_task(config: &Config, args: &RunArgs, profile_name: String) -> Task {
    let recurse = args.recurse || config.defaults.recurse;
    let sources = engine::collect_sources(&args.paths, recurse);
    Task::from_sources(
        sources,
        profile_name,
        args.delete_audio || config.defaults.delete_audio,
        args.delete_source || config.defaults.delete_source,
    )
}

#[cfg(unix)]
extern "C" fn on_sigint(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
fn install_interrupt_handler() {
    let handler: extern "C" fn(libc::c_int) = on_sigint;
    // SAFETY: the handler only stores to an atomic, which is async-signal-safe
    let previous = unsafe { libc::signal(libc::SIGINT, handler as libc::sighandler_t) };
    if previous == libc::SIG_ERR {
        tracing::warn!("could not install Ctrl-C handler");
    }
}

#[cfg(not(unix))]
fn install_interrupt_handler() {}

fn handle_run(args: RunArgs) -> Result<i32> {
    let config = load_config();
    init_logging(&config);

    let (catalog, profile_name) = build_catalog(&config, &args)?;
    let task = build_task(&config, &args, profile_name);

    let (service, events) = CompressionService::new(&config, catalog);
    let service = service.install().context("Failed to start compression service")?;

    install_interrupt_handler();
    let worker = thread::spawn(move || service.run_task(&task));

    let mut printer = ProgressPrinter::default();
    loop {
        if INTERRUPTED.swap(false, Ordering::SeqCst) {
            printer.finish_line();
            eprintln!("Interrupted, stopping encoders...");
            let report = service.stop_all();
            tracing::info!("stopped after Ctrl-C: {:?}", report);
            return Ok(EXIT_INTERRUPTED);
        }

        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => printer.show(&event),
            Err(_) if worker.is_finished() => break,
            Err(_) => {}
        }
    }

    for event in events.drain() {
        printer.show(&event);
    }
    printer.finish_line();

    let summary = worker
        .join()
        .map_err(|_| anyhow::anyhow!("Compression worker panicked"))?;
    print_summary(&summary);

    Ok(if summary.count > 0 && summary.all_succeeded() {
        0
    } else {
        1
    })
}

/// Renders events on the terminal, rewriting a single progress line
#[derive(Default)]
struct ProgressPrinter {
    progress_shown: bool,
}

impl ProgressPrinter {
    fn show(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Start { count } => println!("Compressing {} file(s)", count),
            ProgressEvent::TotalProgress {
                index,
                count,
                current_file,
            } => {
                self.finish_line();
                println!("[{}/{}] {}", index + 1, count, current_file.display());
            }
            ProgressEvent::CurrentProgress {
                current_seconds,
                total_seconds,
                ..
            } => {
                let pct = (current_seconds / total_seconds * 100.0).min(100.0);
                print!(
                    "\rProgress: {:.1}% ({:.0}s / {:.0}s)",
                    pct, current_seconds, total_seconds
                );
                std::io::stdout().flush().ok();
                self.progress_shown = true;
            }
            ProgressEvent::Error { title, detail } => {
                self.finish_line();
                eprintln!("{}: {}", title, detail);
            }
            ProgressEvent::Finished { count } => {
                self.finish_line();
                println!("Finished {} file(s)", count);
            }
        }
    }

    fn finish_line(&mut self) {
        if self.progress_shown {
            println!();
            self.progress_shown = false;
        }
    }
}

fn print_summary(summary: &BatchSummary) {
    if summary.count == 0 {
        return;
    }
    println!(
        "{} succeeded, {} failed",
        summary.succeeded,
        summary.failed()
    );
    for (path, error) in &summary.failures {
        eprintln!("  {}: {}", path.display(), error);
    }
}

fn handle_dry_run(args: RunArgs) -> Result<()> {
    let config = load_config();
    let (catalog, profile_name) = build_catalog(&config, &args)?;
    let task = build_task(&config, &args, profile_name);

    if task.files.is_empty() {
        println!("No video files found");
        return Ok(());
    }

    let (service, _events) = CompressionService::new(&config, catalog);
    println!(
        "Dry run: {} file(s) with profile '{}'",
        task.files_num(),
        task.profile_name
    );
    for file in &task.files {
        let cmd = service.preview_command(file, &task.profile_name, task.delete_audio)?;
        println!("{}", cmd);
    }
    Ok(())
}

fn handle_profiles() -> Result<()> {
    let catalog = ProfileCatalog::from_user_dir();
    if let Some(dir) = catalog.profiles_dir() {
        println!("Profiles directory: {}", dir.display());
    }
    for name in catalog.names() {
        match catalog.get(&name) {
            Some(profile) => println!(
                "  {:<16} crf={} preset={} keyint={} refs={} bf={}{}",
                profile.name,
                profile.crf,
                profile.preset,
                profile.keyint,
                profile.refs,
                profile.bframes,
                if profile.hardware_acceleration {
                    " hwaccel"
                } else {
                    ""
                }
            ),
            None => println!("  {:<16} (unreadable)", name),
        }
    }
    Ok(())
}

fn handle_save_profile(args: SaveProfileArgs) -> Result<()> {
    let profile = EncodingProfile {
        name: args.name,
        crf: args.crf,
        preset: args.preset,
        keyint: args.keyint,
        refs: args.refs,
        bframes: args.bframes,
        hardware_acceleration: args.hwaccel,
        additional_args: args.additional_args,
    };

    let dir = EncodingProfile::profiles_dir().context("Failed to create profiles directory")?;
    profile
        .save(&dir)
        .with_context(|| format!("Failed to save profile '{}'", profile.name))?;
    println!("Saved profile '{}' to {}", profile.name, dir.display());
    Ok(())
}

fn handle_check_ffmpeg() -> Result<()> {
    let config = load_config();
    let program = config.encoder.program();

    let version = engine::ffmpeg_version(&program)?;
    println!("ffmpeg found: {}", version);

    match engine::hardware_accelerations(&program) {
        Ok(methods) if methods.is_empty() => println!("No hardware acceleration methods"),
        Ok(methods) => {
            println!("Hardware acceleration methods: {}", methods.join(", "));
            if engine::has_gpu_acceleration(&methods) {
                println!("GPU decoding available: profiles may enable hardware acceleration");
            } else {
                println!("No supported GPU decoder found");
            }
        }
        Err(e) => eprintln!("Warning: {:#}", e),
    }
    Ok(())
}

fn handle_init_config() {
    match Config::load() {
        Ok(cfg) => {
            match Config::config_path() {
                Ok(path) => println!("Config loaded successfully from {}", path.display()),
                Err(e) => println!("Config loaded, but config path unknown: {:#}", e),
            }
            println!("{:#?}", cfg);
        }
        Err(e) => {
            println!("Config missing or invalid: {:#}", e);
            println!("Creating default config...");
            if let Err(err) = Config::ensure_default() {
                eprintln!("Failed to save default config: {:#}", err);
            } else {
                match Config::config_path() {
                    Ok(path) => println!("Default config saved to {}", path.display()),
                    Err(e) => println!("Default config saved (path unknown): {:#}", e),
                }
            }
        }
    }
}
