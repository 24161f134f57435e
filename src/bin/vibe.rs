//! Vibe CLI - Command-line interface for Vibe Flux
//!
//! Commands:
//! - measure: Run a measurement and score it, optionally accruing vibrations
//! - points: Compute the vibrations earned by a score
//! - rank: Show the rank and progress for a vibrations total
//! - catalog: Print the rank ladder or badge set

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::Level;

use vibe_flux::encoder::MeasurementTarget;
use vibe_flux::indicator::{classify, VibeIndicator};
use vibe_flux::presets::{compare_to_expected, ExpectationReport, LocationType};
use vibe_flux::resonance::{
    format_vibrations, AccrualContext, BadgeCatalog, PointsBreakdown, RankCatalog,
    UserAccrualState,
};
use vibe_flux::session::BroadcastObserver;
use vibe_flux::{
    AccrualOutcome, InMemoryStore, MeasurementConfig, MeasurementEvent, MeasurementResult,
    ResonanceProcessor, SampleSource, SimulatedSource, VibeAnalyzer, VibeError, PRODUCER_NAME,
    VERSION,
};

/// Vibe - measure how a place feels
#[derive(Parser)]
#[command(name = "vibe")]
#[command(author = "Vibe Rated")]
#[command(version = VERSION)]
#[command(about = "Measure, score and accrue environment vibes", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a measurement and score it
    Measure {
        /// Measurement duration in seconds (5-30)
        #[arg(short, long, default_value = "17")]
        duration: u32,

        /// Samples per second
        #[arg(long, default_value = "10")]
        sample_rate: u32,

        /// Seed for the simulated environment
        #[arg(long)]
        seed: Option<u64>,

        /// Score against the preset bands of a location type
        #[arg(long)]
        location_type: Option<LocationType>,

        /// Emit progress and completion events as NDJSON on stdout
        #[arg(long)]
        events: bool,

        /// Output format
        #[arg(long, default_value = "text")]
        output_format: OutputFormat,

        /// Accrue vibrations into this state file (created if missing)
        #[arg(long)]
        state: Option<PathBuf>,

        /// User the measurement is accrued to
        #[arg(long, default_value = "local")]
        user: String,

        /// Measured location id; omit when creating a new location
        #[arg(long)]
        location_id: Option<String>,

        /// City of the measured location
        #[arg(long)]
        city: Option<String>,

        /// The location had no prior measurements
        #[arg(long)]
        new_location: bool,

        /// User's offset from UTC in minutes, for new users
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        utc_offset: i32,
    },

    /// Compute the vibrations earned by a vibe score
    Points {
        /// Vibe score (0-100)
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        vibe_score: u8,

        /// First measurement of the day
        #[arg(long)]
        first_today: bool,

        /// First measurement of the location
        #[arg(long)]
        new_location: bool,

        /// Current streak in days
        #[arg(long, default_value = "0")]
        streak: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the rank and progress for a vibrations total
    Rank {
        vibrations: u64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a catalog
    Catalog {
        #[arg(value_enum)]
        catalog: CatalogType,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Single-line JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum CatalogType {
    /// Resonance rank ladder
    Ranks,
    /// Unlockable badges
    Badges,
}

#[derive(Serialize)]
struct MeasureReport {
    producer: String,
    version: String,
    result: MeasurementResult,
    indicator: VibeIndicator,
    expectation: Option<ExpectationReport>,
    accrual: Option<AccrualOutcome>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), VibeCliError> {
    match cli.command {
        Commands::Measure {
            duration,
            sample_rate,
            seed,
            location_type,
            events,
            output_format,
            state,
            user,
            location_id,
            city,
            new_location,
            utc_offset,
        } => {
            let config = MeasurementConfig {
                duration_seconds: duration,
                sample_rate,
                use_real_sensors: false,
            };
            let mut target = MeasurementTarget::new(user);
            target.location_id = location_id;
            target.location_type = location_type;
            target.city = city;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_time()
                .build()?;
            runtime.block_on(cmd_measure(
                config,
                seed,
                events,
                &output_format,
                state.as_deref(),
                &target,
                new_location,
                utc_offset,
            ))
        }
        Commands::Points {
            vibe_score,
            first_today,
            new_location,
            streak,
            json,
        } => cmd_points(vibe_score, first_today, new_location, streak, json),
        Commands::Rank { vibrations, json } => cmd_rank(vibrations, json),
        Commands::Catalog { catalog, json } => cmd_catalog(catalog, json),
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_measure(
    config: MeasurementConfig,
    seed: Option<u64>,
    events: bool,
    output_format: &OutputFormat,
    state: Option<&Path>,
    target: &MeasurementTarget,
    new_location: bool,
    utc_offset: i32,
) -> Result<(), VibeCliError> {
    let source: Box<dyn SampleSource> = match seed {
        Some(seed) => Box::new(SimulatedSource::seeded(seed)),
        None => Box::new(SimulatedSource::new()),
    };

    let analyzer = VibeAnalyzer::new();
    let mut run = analyzer.start_with_source(config, source)?;
    if let Some(location_type) = target.location_type {
        run = run.for_location(location_type);
    }

    let (observer, rx) = BroadcastObserver::new(config.total_samples() + 1);
    let show_progress = !events && atty::is(atty::Stream::Stderr);
    let renderer = tokio::spawn(render_events(rx, events, show_progress));

    let outcome = run.with_observer(Box::new(observer)).execute().await;
    // the observer is dropped with the run, closing the channel
    renderer.await.map_err(|e| VibeCliError::Io(io::Error::other(e)))??;
    let result = outcome?.ok_or(VibeCliError::Stopped)?;

    let accrual = match state {
        Some(path) => Some(accrue(path, target, &result, new_location, utc_offset).await?),
        None => None,
    };

    let report = MeasureReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        indicator: classify(result.vibe_score),
        expectation: target
            .location_type
            .map(|location_type| compare_to_expected(&result, location_type)),
        result,
        accrual,
    };

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_measure_report(&report),
    }
    Ok(())
}

async fn render_events(
    mut rx: broadcast::Receiver<MeasurementEvent>,
    events: bool,
    show_progress: bool,
) -> Result<(), VibeCliError> {
    let stdout = io::stdout();
    let stderr = io::stderr();
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if events {
            let mut out = stdout.lock();
            writeln!(out, "{}", serde_json::to_string(&event)?)?;
            out.flush()?;
        } else if show_progress {
            let mut err = stderr.lock();
            match &event {
                MeasurementEvent::Progress(update) => {
                    let filled = (update.progress_percent / 5.0).round() as usize;
                    write!(
                        err,
                        "\r[{:<20}] {:>5.1}%  {:>2}s left  {:>5.1} dB {:>5.0} lux",
                        "#".repeat(filled.min(20)),
                        update.progress_percent,
                        update.seconds_remaining,
                        update.latest_sample.sound,
                        update.latest_sample.light,
                    )?;
                }
                MeasurementEvent::Complete(_) => writeln!(err)?,
            }
            err.flush()?;
        }
    }
    Ok(())
}

async fn accrue(
    path: &Path,
    target: &MeasurementTarget,
    result: &MeasurementResult,
    new_location: bool,
    utc_offset: i32,
) -> Result<AccrualOutcome, VibeCliError> {
    let store = if path.exists() {
        InMemoryStore::from_json(&fs::read_to_string(path)?)?
    } else {
        InMemoryStore::new()
    };
    store
        .register(UserAccrualState::new(target.user_id.clone()).with_utc_offset(utc_offset))
        .await;

    let processor = ResonanceProcessor::new(store);
    let outcome = processor.record(target, result, new_location).await?;
    fs::write(path, processor.store().to_json().await?)?;
    Ok(outcome)
}

fn print_measure_report(report: &MeasureReport) {
    let result = &report.result;
    println!("{} {}", report.indicator.emoji, report.indicator.label);
    println!("==================");
    println!("Vibe score:     {}/100", result.vibe_score);
    println!("Comfort:        {}/10", result.comfort_rating);
    println!("Sound:          {:.1} dB (score {})", result.sound_db, result.sound_score);
    println!("Light:          {:.0} lux (score {})", result.light_lux, result.light_score);
    println!(
        "Stability:      {:.1}% (score {})",
        result.stability_percent, result.stability_score
    );
    println!("Samples:        {} over {}s", result.sample_count, result.duration_seconds);

    if let Some(expectation) = &report.expectation {
        println!("\nExpected for {}:", expectation.location_type);
        for (name, c) in [
            ("sound", &expectation.sound),
            ("light", &expectation.light),
            ("stability", &expectation.stability),
        ] {
            let status_icon = if c.in_range { "[OK]" } else { "[--]" };
            println!("  {} {}: {} (expected {})", status_icon, name, c.actual, c.expected);
        }
    }

    if let Some(accrual) = &report.accrual {
        println!("\n+{} vibrations", accrual.points.total);
        println!(
            "Total:          {} ({})",
            format_vibrations(accrual.vibrations),
            accrual.rank.name
        );
        if let Some(rank) = &accrual.rank_up {
            println!("Rank up!        {} {}", rank.icon, rank.name);
        }
        for badge in &accrual.new_badges {
            println!("Badge:          {} {}", badge.icon, badge.name);
        }
        if !accrual.unrecorded_badge_ids.is_empty() {
            println!("Unsaved badges: {}", accrual.unrecorded_badge_ids.join(", "));
        }
    }
}

fn cmd_points(
    vibe_score: u8,
    first_today: bool,
    new_location: bool,
    streak: u32,
    json: bool,
) -> Result<(), VibeCliError> {
    let context = AccrualContext {
        is_first_today: first_today,
        is_new_location: new_location,
    };
    let breakdown = PointsBreakdown::compute(vibe_score, &context, streak);

    if json {
        println!("{}", serde_json::to_string_pretty(&breakdown)?);
    } else {
        println!("Base:           {}", breakdown.base);
        println!("Streak:         x{:.1}", breakdown.multiplier());
        println!("Daily bonus:    {}", breakdown.daily_bonus);
        println!("New location:   {}", breakdown.new_location_bonus);
        println!("Total:          {}", breakdown.total);
    }
    Ok(())
}

fn cmd_rank(vibrations: u64, json: bool) -> Result<(), VibeCliError> {
    let progress = RankCatalog::standard().rank_progress(vibrations);

    if json {
        println!("{}", serde_json::to_string_pretty(&progress)?);
    } else {
        println!(
            "{} {} ({} vibrations)",
            progress.current.icon,
            progress.current.name,
            format_vibrations(vibrations)
        );
        match &progress.next {
            Some(next) => println!(
                "{:.0}% to {} ({} to go)",
                progress.progress_percent, next.name, progress.to_next
            ),
            None => println!("Top rank reached"),
        }
    }
    Ok(())
}

fn cmd_catalog(catalog: CatalogType, json: bool) -> Result<(), VibeCliError> {
    match catalog {
        CatalogType::Ranks => {
            let ranks = RankCatalog::standard();
            if json {
                println!("{}", serde_json::to_string_pretty(ranks.ranks())?);
            } else {
                for rank in ranks.ranks() {
                    println!(
                        "{}. {} {:<17} {:>6}  {}",
                        rank.rank, rank.icon, rank.name, rank.min_vibrations, rank.description
                    );
                }
            }
        }
        CatalogType::Badges => {
            let badges = BadgeCatalog::standard();
            if json {
                println!("{}", serde_json::to_string_pretty(badges.badges())?);
            } else {
                for badge in badges.badges() {
                    println!("{} {:<16} {}", badge.icon, badge.name, badge.description);
                }
            }
        }
    }
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug)]
enum VibeCliError {
    Io(io::Error),
    Vibe(VibeError),
    Json(serde_json::Error),
    Stopped,
}

impl From<io::Error> for VibeCliError {
    fn from(e: io::Error) -> Self {
        VibeCliError::Io(e)
    }
}

impl From<VibeError> for VibeCliError {
    fn from(e: VibeError) -> Self {
        VibeCliError::Vibe(e)
    }
}

impl From<serde_json::Error> for VibeCliError {
    fn from(e: serde_json::Error) -> Self {
        VibeCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<VibeCliError> for CliError {
    fn from(e: VibeCliError) -> Self {
        match e {
            VibeCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            VibeCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax of the state file".to_string()),
            },
            VibeCliError::Stopped => CliError {
                code: "STOPPED".to_string(),
                message: "Measurement was stopped before completion".to_string(),
                hint: None,
            },
            VibeCliError::Vibe(e) => {
                let (code, hint) = match &e {
                    VibeError::InvalidConfig(_) => (
                        "INVALID_CONFIG",
                        Some("Duration must be 5-30 s and sample rate 1-100 Hz"),
                    ),
                    VibeError::AccrualNotApplied { .. } => (
                        "ACCRUAL_NOT_APPLIED",
                        Some("The measurement was saved; retry applying the reported points and badges"),
                    ),
                    VibeError::JsonError(_) => ("JSON_ERROR", Some("Check JSON syntax of the state file")),
                    VibeError::Storage(_) | VibeError::UnknownUser(_) => ("STORAGE_ERROR", None),
                    _ => ("VIBE_ERROR", None),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: hint.map(str::to_string),
                }
            }
        }
    }
}
