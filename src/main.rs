//! hwtune CLI - Hardware-Aware Tuning Engine
//!
//! Derives, applies and validates tuning profiles for a web hosting stack.

use clap::Parser;
use hwtune::apply::{
    apply_exit_code, ApplyReport, ProfileApplier, SystemdServiceControl, EXIT_FAILURE,
};
use hwtune::bench::{ApacheBench, BenchmarkRunner, MysqlWorkload};
use hwtune::config::{CliArgs, Commands, EngineConfig, OutputFormat};
use hwtune::error::{Result, TuneError};
use hwtune::monitor::Monitor;
use hwtune::profile::{generate_profile, ProfileStore};
use hwtune::progress::ProgressReporter;
use hwtune::system::{HardwareProfiler, HttpLatencyProbe, SysinfoMetrics};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if args.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match run(&args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(EXIT_FAILURE);
        }
    }
}

fn run(args: &CliArgs) -> Result<i32> {
    let config = EngineConfig::from_cli(args)?;
    config.validate()?;
    tracing::debug!(state_dir = %config.state_dir.display(), "Using state directory");

    handle_command(&args.command, &config, args.output_format)
}

fn handle_command(command: &Commands, config: &EngineConfig, format: OutputFormat) -> Result<i32> {
    // Hardware detection needs no state directory
    if let Commands::Detect = command {
        return cmd_detect(format);
    }

    let store = Arc::new(ProfileStore::open(&config.state_dir)?);

    match command {
        Commands::Generate { name } => cmd_generate(&store, name, format),
        Commands::Apply { name, stabilization } => {
            cmd_apply(config, store, name, *stabilization, format)
        }
        Commands::Benchmark {
            name,
            rounds,
            progress,
        } => cmd_benchmark(config, store, name, *rounds, *progress, format),
        Commands::ListProfiles => cmd_list_profiles(&store, format),
        Commands::CurrentProfile => cmd_current_profile(&store, format),
        Commands::Monitor { interval, duration } => {
            cmd_monitor(config, store, *interval, *duration, format)
        }
        Commands::Show { name } => cmd_show(&store, name, format),
        Commands::Delete { name } => cmd_delete(&store, name),
        Commands::History { name } => cmd_history(&store, name.as_deref(), format),
        Commands::Detect => cmd_detect(format),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_detect(format: OutputFormat) -> Result<i32> {
    let hardware = HardwareProfiler::new().detect()?;
    match format {
        OutputFormat::Json => print_json(&hardware)?,
        OutputFormat::Text => hardware.print_summary(),
    }
    Ok(0)
}

fn cmd_generate(store: &ProfileStore, name: &str, format: OutputFormat) -> Result<i32> {
    let hardware = HardwareProfiler::new().detect()?;
    let profile = generate_profile(&hardware, name);
    store.save(&profile)?;

    match format {
        OutputFormat::Json => print_json(&profile)?,
        OutputFormat::Text => {
            profile.print_summary();
            println!("\nSaved profile '{}'", profile.name);
        }
    }
    Ok(0)
}

fn cmd_apply(
    config: &EngineConfig,
    store: Arc<ProfileStore>,
    name: &str,
    stabilization: Option<u64>,
    format: OutputFormat,
) -> Result<i32> {
    let services = Arc::new(SystemdServiceControl::new(config.service_units()));
    let stabilization = stabilization
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.stabilization());

    let applier = config
        .file_surfaces()
        .into_iter()
        .fold(ProfileApplier::new(store, services), |applier, surface| {
            applier.with_surface(Box::new(surface))
        })
        .with_stabilization(stabilization);

    let show = |report: &ApplyReport| -> Result<()> {
        match format {
            OutputFormat::Json => print_json(report),
            OutputFormat::Text => {
                report.print_table();
                Ok(())
            }
        }
    };

    let result = applier.apply_named(name);
    let code = apply_exit_code(&result);
    match result {
        Ok(report) => {
            show(&report)?;
            Ok(code)
        }
        Err(TuneError::ApplyFailed { report }) => {
            show(&*report)?;
            Err(TuneError::ApplyFailed { report })
        }
        Err(e) => Err(e),
    }
}

fn cmd_benchmark(
    config: &EngineConfig,
    store: Arc<ProfileStore>,
    name: &str,
    rounds: Option<u32>,
    progress: bool,
    format: OutputFormat,
) -> Result<i32> {
    let rounds = rounds.unwrap_or(config.benchmark.rounds);
    let database = MysqlWorkload::new().with_args(config.database_client_args.clone());

    let mut runner = BenchmarkRunner::new(
        store,
        Box::new(ApacheBench::new()),
        Box::new(database),
        Arc::new(SysinfoMetrics::new()),
        config.benchmark.clone(),
    );
    if progress && format == OutputFormat::Text {
        runner = runner.with_progress(ProgressReporter::new());
    }

    let result = runner.run(name, rounds)?;
    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Text => result.print_summary(),
    }
    Ok(0)
}

fn cmd_list_profiles(store: &ProfileStore, format: OutputFormat) -> Result<i32> {
    let profiles = store.list()?;
    if format == OutputFormat::Json {
        print_json(&profiles)?;
        return Ok(0);
    }

    if profiles.is_empty() {
        println!("No profiles stored.");
        return Ok(0);
    }

    let active = store.get_active()?;
    println!("  {:<24} {:<8} {}", "NAME", "TIER", "GENERATED");
    for summary in &profiles {
        let marker = if active.as_deref() == Some(summary.name.as_str()) {
            '*'
        } else {
            ' '
        };
        println!(
            "{} {:<24} {:<8} {}",
            marker,
            summary.name,
            summary.tier.name(),
            summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(0)
}

fn cmd_current_profile(store: &ProfileStore, format: OutputFormat) -> Result<i32> {
    let state = store.active_state()?;
    if format == OutputFormat::Json {
        print_json(&state)?;
        return Ok(0);
    }

    match (&state.active_profile_name, state.activated_at) {
        (Some(name), Some(at)) => println!("{} (activated {})", name, at.to_rfc3339()),
        (Some(name), None) => println!("{}", name),
        (None, _) => println!("No active profile."),
    }
    Ok(0)
}

fn cmd_monitor(
    config: &EngineConfig,
    store: Arc<ProfileStore>,
    interval: Option<Duration>,
    duration: Option<Duration>,
    format: OutputFormat,
) -> Result<i32> {
    let interval = interval.unwrap_or_else(|| config.monitor.interval());

    let probe = HttpLatencyProbe::new(config.monitor.probe_timeout())?;
    let handle = Monitor::new(
        store,
        Arc::new(SysinfoMetrics::new()),
        Arc::new(probe),
        config.monitor.url.clone(),
    )
    .with_thresholds(config.monitor.thresholds)
    .start(interval)?;

    let summary = match duration {
        Some(duration) => {
            std::thread::sleep(duration);
            handle.stop()
        }
        None => handle.wait(),
    };

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => summary.print_summary(),
    }
    Ok(0)
}

fn cmd_show(store: &ProfileStore, name: &str, format: OutputFormat) -> Result<i32> {
    let profile = store.load(name)?;
    match format {
        OutputFormat::Json => print_json(&profile)?,
        OutputFormat::Text => profile.print_summary(),
    }
    Ok(0)
}

fn cmd_delete(store: &ProfileStore, name: &str) -> Result<i32> {
    store.delete(name)?;
    println!("Deleted profile '{}'", name);
    Ok(0)
}

fn cmd_history(store: &ProfileStore, name: Option<&str>, format: OutputFormat) -> Result<i32> {
    let results = store.benchmarks(name)?;
    if format == OutputFormat::Json {
        print_json(&results)?;
        return Ok(0);
    }

    if results.is_empty() {
        println!("No benchmark runs recorded.");
        return Ok(0);
    }

    println!(
        "{:<20} {:<24} {:>6} {:>10} {:>10} {:>12} {:>6}",
        "STARTED", "PROFILE", "ROUNDS", "REQ/S", "RT (ms)", "QUERIES/S", "SCORE"
    );
    for result in &results {
        println!(
            "{:<20} {:<24} {:>6} {:>10.2} {:>10.2} {:>12.0} {:>6}",
            result.started_at.format("%Y-%m-%d %H:%M:%S"),
            result.profile_name,
            result.runs.len(),
            result.averages.web_requests_per_second,
            result.averages.web_response_time_ms,
            result.averages.database_queries_per_second,
            result.performance_score
        );
    }
    Ok(0)
}
