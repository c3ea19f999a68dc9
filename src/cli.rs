use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "endoclient",
    about = "List, edit, create and export Endomondo workouts"
)]
pub struct Cli {
    /// Path to the TOML config file.
    ///
    /// Default: ~/.config/endoclient/config.toml
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv). Defaults to INFO.
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease log verbosity (-q, -qq). Defaults to INFO.
    #[arg(short = 'q', long, action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Print every known sport code and name.
    Sports,

    /// List recent workouts.
    List {
        #[arg(long, default_value_t = 15)]
        limit: u32,

        /// Only workouts of this sport code.
        #[arg(long)]
        sport: Option<i64>,

        /// Start of interval (RFC 3339 or YYYY-MM-DD).
        #[arg(long, requires = "before")]
        after: Option<String>,

        /// End of interval (RFC 3339 or YYYY-MM-DD).
        #[arg(long, requires = "after")]
        before: Option<String>,
    },

    /// Write a workout's track as GPX.
    ExportGpx {
        id: String,

        /// Output file. Default: <ID>.gpx
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Change the sport of every workout recorded as `--from` to `--to`.
    Resport {
        #[arg(long)]
        from: i64,

        #[arg(long)]
        to: i64,

        /// Show what would change without saving.
        #[arg(long)]
        dry_run: bool,
    },

    /// Create a manual workout.
    Create {
        #[arg(long)]
        sport: i64,

        /// Start time (RFC 3339 or "YYYY-MM-DD HH:MM:SS UTC").
        #[arg(long)]
        start: String,

        /// Duration in minutes.
        #[arg(long)]
        minutes: u64,

        /// Distance in kilometres.
        #[arg(long, default_value_t = 0.0)]
        distance: f64,

        #[arg(long)]
        calories: Option<f64>,
    },

    /// Record a body weight measurement.
    LogWeight {
        /// Weight in kilograms.
        kg: f64,

        /// Measurement time. Default: now.
        #[arg(long)]
        at: Option<String>,
    },
}
