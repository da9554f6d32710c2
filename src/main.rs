use tourplay::catalog::Catalog;
use tourplay::cli::Args;
use tourplay::core::tour::LOAD_FAILED_MESSAGE;
use tourplay::core::{HttpMediaSource, LoadOutcome, Tour, TourPhase, Workers};
use tourplay::paths::{self, PathConfig};
use tourplay::progress::LoadingBar;
use tourplay::server::{ApiCommand, ApiServer, SharedTourState, StatusSnapshot};
use tourplay::settings::{SETTINGS_FILE, TourSettings};

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossbeam_channel::Receiver;
use log::{debug, info, warn};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Catalog file looked up in the config dir when none is given
const CATALOG_FILE: &str = "catalog.json";

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| paths::data_file("tourplay.log", path_config));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .filter_module("rouille", log::LevelFilter::Warn)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Respects RUST_LOG if set
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .filter_module("rouille", log::LevelFilter::Warn)
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// CLI path → settings path → `catalog.json` in the config dir → built-in tour
fn load_catalog(args: &Args, settings: &TourSettings, path_config: &PathConfig) -> Result<Catalog> {
    let explicit = args.catalog.clone().or_else(|| settings.catalog_path.clone());
    if let Some(path) = explicit {
        return Catalog::load(&path).with_context(|| format!("Catalog: {}", path.display()));
    }

    let local = paths::config_file(CATALOG_FILE, path_config);
    if local.exists() {
        return Catalog::load(&local).with_context(|| format!("Catalog: {}", local.display()));
    }

    info!("Using built-in catalog");
    Ok(Catalog::builtin())
}

fn publish(shared: &SharedTourState, tour: &Tour, revision: u64) {
    shared.set_status(StatusSnapshot {
        phase: tour.phase(),
        progress: tour.progress(),
        session: tour.session().cloned(),
        failure: tour.failure_message(),
        revision,
    });
    shared.set_preload(tour.preload_records(), tour.preload_in_flight());
}

fn print_preload_report(tour: &Tour) {
    let records = tour.preload_records();
    let buffered = records
        .iter()
        .filter(|r| r.outcome == Some(LoadOutcome::Buffered))
        .count();
    println!("Preloaded {}/{} assets", buffered, records.len());
    for r in &records {
        let outcome = match r.outcome {
            Some(LoadOutcome::Buffered) => "buffered",
            Some(LoadOutcome::BufferFailed) => "failed",
            Some(LoadOutcome::TimedOut) => "timed out",
            Some(LoadOutcome::Superseded) => "superseded",
            None => "pending",
        };
        let probe = match r.probe_ok {
            Some(false) => " (probe failed)",
            _ => "",
        };
        println!("  {:<8} {:<8} {:<10}{} {}", r.id.to_string(), r.direction.to_string(), outcome, probe, r.url);
    }
}

/// Host loop: tick the tour, apply API commands, publish snapshots.
///
/// With `once`, returns as soon as the loading phase ends.
fn run(
    tour: &mut Tour,
    shared: &SharedTourState,
    commands: Option<&Receiver<ApiCommand>>,
    tick: Duration,
    once: bool,
) -> Result<()> {
    let bar = LoadingBar::new();
    let mut revision: u64 = 0;
    let mut last_phase = TourPhase::Idle;

    tour.begin(Instant::now());

    loop {
        let phase = tour.update(Instant::now());
        if phase == TourPhase::Loading {
            bar.update(&tour.progress());
        }

        if phase != last_phase {
            match phase {
                TourPhase::Loading => bar.reset(),
                TourPhase::Ready => {
                    bar.finish("Ready");
                    if once {
                        print_preload_report(tour);
                        return Ok(());
                    }
                }
                TourPhase::Failed => {
                    bar.abandon(LOAD_FAILED_MESSAGE);
                    if once {
                        print_preload_report(tour);
                        bail!(LOAD_FAILED_MESSAGE);
                    }
                }
                TourPhase::Idle => {}
            }
            last_phase = phase;
            revision += 1;
        }

        if let Some(rx) = commands {
            for cmd in rx.try_iter() {
                match cmd {
                    ApiCommand::Tour(event) => {
                        let out = tour.handle(event);
                        if !out.is_empty() {
                            revision += 1;
                        }
                        for command in &out {
                            debug!("Renderer command: {:?}", command);
                        }
                    }
                    ApiCommand::Reload => {
                        if !tour.retry(Instant::now()) {
                            warn!("Reload ignored in phase {:?}", tour.phase());
                        }
                    }
                }
            }
        }

        publish(shared, tour, revision);
        thread::sleep(tick);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = paths::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }

    init_logging(&args, &path_config)?;
    info!("tourplay starting...");
    debug!("Command-line args: {:?}", args);

    let settings_path = paths::config_file(SETTINGS_FILE, &path_config);
    let settings = TourSettings::load(&settings_path)?;
    if !settings_path.exists() {
        // Leave an editable file behind on first run
        if let Err(e) = settings.save(&settings_path) {
            warn!("Could not write default settings: {:#}", e);
        }
    }

    let catalog = Arc::new(load_catalog(&args, &settings, &path_config)?);
    if args.dump_catalog {
        println!("{}", catalog.to_json()?);
        return Ok(());
    }
    info!(
        "Catalog: {} POIs, {} assets",
        catalog.poi_count(),
        catalog.pair_count()
    );

    let workers = Arc::new(Workers::new(settings.worker_count(catalog.pair_count())));
    let source = Arc::new(HttpMediaSource::new(
        settings.connect_timeout(),
        settings.asset_timeout(),
    ));
    let options = settings.tour_options(args.duration_ms.map(Duration::from_millis));
    let mut tour = Tour::new(Arc::clone(&catalog), source, workers, options);

    let shared = Arc::new(SharedTourState::default());
    let once = args.no_server || !settings.api_server_enabled;
    let commands = if once {
        None
    } else {
        let port = args.port.unwrap_or(settings.api_server_port);
        let (rx, addr) = ApiServer::start(port, Arc::clone(&shared), Arc::clone(&catalog))?;
        println!("Tour API on http://{}/api/status", addr);
        Some(rx)
    };

    run(&mut tour, &shared, commands.as_ref(), settings.tick_interval(), once)
}
