use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the config file (crm_insights.toml). Defaults apply when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Inclusive reporting period.
#[derive(Args, Debug, Clone)]
pub struct PeriodArgs {
    /// First day of the period, YYYY-MM-DD
    #[arg(long)]
    pub start: String,

    /// Last day of the period, YYYY-MM-DD
    #[arg(long)]
    pub end: String,
}

#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    #[command(flatten)]
    pub period: PeriodArgs,

    /// Comma-separated CRM user ids (e.g. "8860,1"). All users when omitted.
    #[arg(long)]
    pub users: Option<String>,

    /// Activity type code: 1 meeting, 2 call, 4 task, 6 comment, or "all"
    #[arg(long = "type")]
    pub activity_type: Option<String>,

    /// Answer yes to every confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Add a side-by-side comparison series
    #[arg(long)]
    pub compare: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Per-user activity rollups
    Activity {
        #[command(flatten)]
        filter: FilterArgs,

        /// Include weekday, hourly and type statistics
        #[arg(long)]
        stats: bool,
    },

    /// Deals grouped by stage and outcome
    Deals {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Activities of one user, grouped by day
    User {
        /// CRM user id
        id: String,

        #[command(flatten)]
        period: PeriodArgs,
    },
}
