// mazad command-line entry point.
//
// Startup sequence:
// 1. Parse arguments
// 2. Load config (explicit path, ./config, user config dir, built-in)
// 3. Initialize tracing (stderr, so stdout stays parseable)
// 4. Read the clock once and run the requested command

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, FixedOffset, Local, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use mazad_core::clock::{Clock, PhaseTimezone, SystemClock};
use mazad_core::config::{self, Config, ConfigSource};
use mazad_core::watch::{self, PhaseEvent};
use mazad_core::{AuctionPhase, Locale, PhaseTransition};

#[derive(Debug, Parser)]
#[command(name = "mazad", version, about = "Which auction market is open right now")]
struct Cli {
    /// Config file to use instead of the default lookup.
    #[arg(long, global = true, env = "MAZAD_CONFIG")]
    config: Option<PathBuf>,

    /// Zone whose hour decides the phase: "local" or an offset like +03:00.
    #[arg(long, global = true)]
    timezone: Option<PhaseTimezone>,

    /// Label language: en or ar.
    #[arg(long, global = true)]
    locale: Option<Locale>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Classify the current time (default).
    Now,
    /// Classify an hour (0-23), a time of day (HH:MM), or an RFC 3339 timestamp.
    At { time: String },
    /// Show the daily phase windows.
    Schedule,
    /// Print phase changes as they happen, until Ctrl+C.
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut config, source) =
        config::load_config(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(zone) = cli.timezone {
        config.clock.timezone = zone;
    }
    if let Some(locale) = cli.locale {
        config.display.locale = locale;
    }

    init_tracing(&config.logging.filter)?;
    match &source {
        ConfigSource::File(path) => info!("Config loaded from {}", path.display()),
        ConfigSource::BuiltIn => info!("No config file found, using built-in defaults"),
    }
    debug!("Phase timezone: {}", config.clock.timezone);

    let clock = SystemClock::new(config.clock.timezone);

    match cli.command.unwrap_or(Command::Now) {
        Command::Now => report(&config, clock.now(), cli.json),
        Command::At { time } => {
            let at = parse_time(&time, config.clock.timezone, clock.now())
                .with_context(|| format!("invalid time {time:?}"))?;
            report(&config, at, cli.json)
        }
        Command::Schedule => print_schedule(&config, cli.json),
        Command::Watch => run_watch(&config, Arc::new(clock), cli.json).await,
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PhaseReport {
    phase: AuctionPhase,
    label: &'static str,
    live_bidding: bool,
    at: String,
    next: TransitionReport,
}

#[derive(Debug, Serialize)]
struct TransitionReport {
    from: AuctionPhase,
    to: AuctionPhase,
    label: &'static str,
    at: String,
}

impl TransitionReport {
    fn new(t: &PhaseTransition<FixedOffset>, locale: Locale) -> Self {
        Self {
            from: t.from,
            to: t.to,
            label: t.to.label(locale),
            at: t.at.to_rfc3339(),
        }
    }
}

fn report(config: &Config, now: DateTime<FixedOffset>, json: bool) -> anyhow::Result<()> {
    let locale = config.display.locale;
    let phase = config.schedule.phase_at_time(&now);
    let next = config.clock.timezone.next_transition(&config.schedule, &now);

    if json {
        let report = PhaseReport {
            phase,
            label: phase.label(locale),
            live_bidding: phase.is_live_bidding(),
            at: now.to_rfc3339(),
            next: TransitionReport::new(&next, locale),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{phase} ({}) at {}", phase.label(locale), now.format("%Y-%m-%d %H:%M %:z"));
        println!(
            "next: {} ({}) at {}, in {}",
            next.to,
            next.to.label(locale),
            next.at.format("%Y-%m-%d %H:%M"),
            format_remaining(next.at - now)
        );
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct WindowReport {
    phase: AuctionPhase,
    label: &'static str,
    start_hour: u8,
    end_hour: u8,
}

fn print_schedule(config: &Config, json: bool) -> anyhow::Result<()> {
    let windows: Vec<WindowReport> = AuctionPhase::ALL
        .iter()
        .map(|&phase| {
            let (start_hour, end_hour) = config.schedule.window(phase);
            WindowReport {
                phase,
                label: phase.label(config.display.locale),
                start_hour,
                end_hour,
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&windows)?);
        return Ok(());
    }

    println!("timezone: {}", config.clock.timezone);
    for w in &windows {
        println!(
            "{:<8} {:02}:00-{:02}:00  {}",
            w.phase.as_str(),
            w.start_hour,
            w.end_hour,
            w.label
        );
    }
    Ok(())
}

async fn run_watch(config: &Config, clock: Arc<dyn Clock>, json: bool) -> anyhow::Result<()> {
    let locale = config.display.locale;
    let (tx, mut rx) = mpsc::channel(16);
    let watcher = tokio::spawn(watch::run(clock, config.schedule, tx));

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                print_event(&event, locale, json)?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watcher");
                break;
            }
        }
    }

    drop(rx);
    match tokio::time::timeout(std::time::Duration::from_secs(5), watcher).await {
        Ok(joined) => joined.context("watcher task panicked")??,
        Err(_) => bail!("watcher did not stop within 5s"),
    }
    Ok(())
}

fn print_event(event: &PhaseEvent, locale: Locale, json: bool) -> anyhow::Result<()> {
    match event {
        PhaseEvent::Current { phase, at } => {
            if json {
                let line = serde_json::json!({
                    "event": "current",
                    "phase": phase,
                    "label": phase.label(locale),
                    "at": at.to_rfc3339(),
                });
                println!("{line}");
            } else {
                println!("{} now: {phase} ({})", at.format("%H:%M:%S"), phase.label(locale));
            }
        }
        PhaseEvent::Changed(t) => {
            if json {
                let mut line = serde_json::to_value(TransitionReport::new(t, locale))?;
                line["event"] = "changed".into();
                println!("{line}");
            } else {
                println!(
                    "{} {} -> {} ({})",
                    t.at.format("%H:%M:%S"),
                    t.from,
                    t.to,
                    t.to.label(locale)
                );
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Accepts `H`/`HH` (hour of today), `HH:MM` (time of today), or RFC 3339.
/// "Today" is the date of `now`; the result is expressed in `zone`.
fn parse_time(
    input: &str,
    zone: PhaseTimezone,
    now: DateTime<FixedOffset>,
) -> anyhow::Result<DateTime<FixedOffset>> {
    let input = input.trim();

    let time_of_day = if let Ok(hour) = input.parse::<u32>() {
        let hour = mazad_core::LocalHour::new(hour)?;
        NaiveTime::from_hms_opt(u32::from(hour.get()), 0, 0)
    } else if let Ok(t) = NaiveTime::parse_from_str(input, "%H:%M") {
        Some(t)
    } else {
        return DateTime::parse_from_rfc3339(input)
            .map(|t| zone.localize(t.with_timezone(&Utc)))
            .context("expected an hour, HH:MM, or an RFC 3339 timestamp");
    };

    let naive = now
        .date_naive()
        .and_time(time_of_day.context("time of day out of range")?);
    let local = match zone {
        PhaseTimezone::Local => Local.from_local_datetime(&naive).earliest().map(|t| t.fixed_offset()),
        PhaseTimezone::Fixed(offset) => offset.from_local_datetime(&naive).single(),
    };
    local.context("time does not exist in this zone")
}

fn format_remaining(delta: chrono::Duration) -> String {
    let minutes = delta.num_minutes().max(0);
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// Initialize tracing to stderr. `RUST_LOG` overrides the configured filter.
fn init_tracing(filter: &str) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
