//! `dispatch` CLI — run scheduling checks over JSON documents from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Normalize free-form booking text
//! dispatch normalize --date 2024-06-10 --time "9:00 AM" --duration "2 hours"
//!
//! # Check a candidate booking against a technician's jobs (stdin → stdout)
//! echo '{"request": {...}, "existingJobs": [...]}' | dispatch conflicts
//!
//! # Audit persisted jobs for double bookings
//! dispatch audit -i jobs.json
//!
//! # Next occurrences of a recurring template
//! dispatch next --frequency weekly --last 2024-06-03 --day-of-week 1 --count 4
//!
//! # Tracking decision for a date (or a range with --until)
//! dispatch track --date 2024-06-08 --settings settings.json --exceptions leave.json
//!
//! # Route statistics for a window of location samples
//! dispatch route -i samples.json --from 2024-06-10T00:00:00Z --to 2024-06-10T23:59:59Z
//!
//! # Open slots in a technician's day
//! dispatch slots --date 2024-06-10 --technician tech-1 -i jobs.json
//! ```
//!
//! Results are pretty-printed JSON. Logs go to stderr; set `RUST_LOG` to
//! change the level (default `warn`).

use std::io::{self, Read};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use dispatch_engine::exceptions::{tracking_calendar, ScheduleException, SchedulingSettings};
use dispatch_engine::interval::{normalize_with, parse_date, DurationInput, DEFAULT_DURATION_MINUTES};
use dispatch_engine::openings::open_slots;
use dispatch_engine::recurrence::{occurrences, Frequency, RecurringTemplate};
use dispatch_engine::route::{
    job_site_visits, route_statistics_in_window, samples_in_window, LocationSample,
};
use dispatch_engine::{
    check_availability, find_double_bookings, resolve_tracking, BookingRequest, ExistingJob,
};

#[derive(Parser)]
#[command(
    name = "dispatch",
    version,
    about = "Scheduling-consistency checks for field-service dispatch"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a date, time and duration into a scheduled interval
    Normalize {
        #[arg(long)]
        date: String,
        #[arg(long)]
        time: String,
        /// Free-form duration ("2", "90 min", "1:30"); one hour when omitted
        #[arg(long)]
        duration: Option<String>,
        /// Minutes of padding after the job
        #[arg(long, default_value_t = 15)]
        buffer: u32,
    },
    /// Check a booking request against existing jobs
    Conflicts {
        /// Input JSON file with `request` and `existingJobs` (reads stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Report overlapping jobs already on record
    Audit {
        /// Input JSON array of jobs (reads stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        #[arg(long, default_value_t = 15)]
        buffer: u32,
    },
    /// Compute the next occurrences of a recurring job
    Next {
        #[arg(long)]
        frequency: String,
        /// Last generated occurrence (YYYY-MM-DD)
        #[arg(long)]
        last: NaiveDate,
        /// Pin occurrences to a weekday, 0=Sunday..6=Saturday
        #[arg(long)]
        day_of_week: Option<u8>,
        /// Stop after this date (inclusive)
        #[arg(long)]
        end_date: Option<NaiveDate>,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Decide whether a technician is expected to work
    Track {
        #[arg(long)]
        date: NaiveDate,
        /// Resolve every day from --date through this date
        #[arg(long)]
        until: Option<NaiveDate>,
        /// Company scheduling settings JSON (defaults when omitted)
        #[arg(long)]
        settings: Option<String>,
        /// JSON array of the technician's schedule exceptions
        #[arg(long)]
        exceptions: Option<String>,
    },
    /// Aggregate route statistics from location samples
    Route {
        /// Input JSON array of samples (reads stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        #[arg(long)]
        to: Option<DateTime<Utc>>,
        /// List job-site visits instead of totals
        #[arg(long)]
        visits: bool,
    },
    /// List open slots in a technician's day
    Slots {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        technician: String,
        /// Input JSON array of jobs (reads stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        #[arg(long)]
        settings: Option<String>,
        #[arg(long, default_value_t = 15)]
        buffer: u32,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConflictInput {
    request: BookingRequest,
    #[serde(default)]
    existing_jobs: Vec<ExistingJob>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Normalize {
            date,
            time,
            duration,
            buffer,
        } => {
            let date = parse_date(&date)
                .with_context(|| format!("Invalid date: '{}' (expected YYYY-MM-DD)", date))?;
            let duration = duration.map(DurationInput::from);
            let normalized = normalize_with(
                date,
                &time,
                duration.as_ref(),
                DEFAULT_DURATION_MINUTES,
                buffer,
            );
            print_json(&normalized, None)?;
        }
        Commands::Conflicts { input, output } => {
            let doc: ConflictInput = read_json(input.as_deref())?;
            debug!(existing = doc.existing_jobs.len(), "checking booking request");
            let report = check_availability(&doc.request, &doc.existing_jobs);
            print_json(&report, output.as_deref())?;
        }
        Commands::Audit { input, buffer } => {
            let jobs: Vec<ExistingJob> = read_json(input.as_deref())?;
            print_json(&find_double_bookings(&jobs, buffer), None)?;
        }
        Commands::Next {
            frequency,
            last,
            day_of_week,
            end_date,
            count,
        } => {
            let frequency: Frequency = frequency.parse()?;
            let template = RecurringTemplate {
                id: "cli".to_string(),
                frequency,
                day_of_week,
                start_date: last,
                end_date,
                is_active: true,
            };
            let dates = occurrences(&template, last, count)?;
            print_json(&dates, None)?;
        }
        Commands::Track {
            date,
            until,
            settings,
            exceptions,
        } => {
            let settings = load_settings(settings.as_deref())?;
            let exceptions: Vec<ScheduleException> = match exceptions.as_deref() {
                Some(path) => read_json(Some(path))?,
                None => Vec::new(),
            };
            match until {
                Some(until) => {
                    print_json(&tracking_calendar(&settings, &exceptions, date, until), None)?
                }
                None => print_json(&resolve_tracking(&settings, &exceptions, date), None)?,
            }
        }
        Commands::Route {
            input,
            from,
            to,
            visits,
        } => {
            let samples: Vec<LocationSample> = read_json(input.as_deref())?;
            let from = from.unwrap_or(DateTime::<Utc>::MIN_UTC);
            let to = to.unwrap_or(DateTime::<Utc>::MAX_UTC);
            if visits {
                let window = samples_in_window(&samples, from, to);
                print_json(&job_site_visits(&window), None)?;
            } else {
                print_json(&route_statistics_in_window(&samples, from, to), None)?;
            }
        }
        Commands::Slots {
            date,
            technician,
            input,
            settings,
            buffer,
        } => {
            let settings = load_settings(settings.as_deref())?;
            let jobs: Vec<ExistingJob> = read_json(input.as_deref())?;
            let booked: Vec<_> = jobs
                .iter()
                .filter(|j| !j.is_cancelled())
                .filter(|j| j.assigned_to.as_deref() == Some(technician.as_str()))
                .filter_map(|j| j.interval(DEFAULT_DURATION_MINUTES, buffer))
                .collect();
            print_json(&open_slots(&settings, date, &booked), None)?;
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays valid JSON.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_settings(path: Option<&str>) -> Result<SchedulingSettings> {
    match path {
        Some(path) => {
            read_json(Some(path)).with_context(|| format!("Failed to load settings: {}", path))
        }
        None => Ok(SchedulingSettings::default()),
    }
}

fn read_json<T: DeserializeOwned>(path: Option<&str>) -> Result<T> {
    let raw = read_input(path)?;
    serde_json::from_str(&raw).context("Failed to parse input JSON")
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T, output: Option<&str>) -> Result<()> {
    let pretty = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, pretty).with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            println!("{}", pretty);
        }
    }
    Ok(())
}
