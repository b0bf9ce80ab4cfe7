//! CLI argument structures

use crate::consolidate::OutputKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Submit, monitor, recover and consolidate CRAB grid tasks
#[derive(Parser)]
#[command(name = "crab-pilot")]
#[command(about = "crab-pilot - Drive CRAB task submission, monitoring and output consolidation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (defaults to ./crab-pilot.toml when present)
    #[arg(short = 'c', long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write log output to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Directory templates are rendered into and grid commands run from
    #[arg(long, global = true, value_name = "DIR")]
    pub run_dir: Option<PathBuf>,

    /// Email a summary when the command finishes
    #[arg(long, global = true)]
    pub email: bool,

    /// Send an ntfy push notification when the command finishes
    #[arg(long, global = true)]
    pub ntfy: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render and submit every job entry of a batch description
    #[command(name = "submit")]
    Submit {
        /// Batch description (YAML list of job entries)
        #[arg(short, long, value_name = "YAML")]
        batch: PathBuf,

        /// Render and archive templates without submitting
        #[arg(long)]
        dry_run: bool,
    },

    /// Poll and classify every task in a grid project directory
    #[command(name = "status")]
    Status {
        /// Directory holding the crab_* task directories
        #[arg(short = 'd', long, value_name = "DIR")]
        directory: PathBuf,

        /// Record each task's state in the tracking spreadsheet
        #[arg(long)]
        update_sheet: bool,

        /// Consolidate the output of finished tasks
        #[arg(long)]
        merge_finished: bool,

        /// Output kind merged for finished tasks
        #[arg(long, value_enum, default_value_t = OutputKind::Hist)]
        kind: OutputKind,

        /// Merge finished tasks per selection instead of as one set
        #[arg(long)]
        group: bool,

        /// Delete source files of groups that were merged and archived
        #[arg(long, requires = "merge_finished")]
        cleanup: bool,
    },

    /// Resubmit failed jobs of every task in a grid project directory
    #[command(name = "resubmit")]
    Resubmit {
        /// Directory holding the crab_* task directories
        #[arg(short = 'd', long, value_name = "DIR")]
        directory: PathBuf,

        /// Memory limit in MB for resubmitted jobs
        #[arg(long)]
        maxmemory: Option<u32>,

        /// Sites to exclude
        #[arg(long, value_delimiter = ',', value_name = "SITE")]
        siteblacklist: Vec<String>,

        /// Sites to restrict to
        #[arg(long, value_delimiter = ',', value_name = "SITE")]
        sitewhitelist: Vec<String>,

        /// Only resubmit tasks whose failures are worth retrying
        #[arg(long)]
        failed_only: bool,
    },

    /// Submit a recovery task for the unfinished part of a task
    #[command(name = "recover")]
    Recover {
        /// Task directory, e.g. crab_MuonTagSkim_2023C_v1_Muon0
        #[arg(long, value_name = "DIR")]
        task: PathBuf,

        /// Extra or replacement parameters
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,

        /// Render and archive without submitting
        #[arg(long)]
        dry_run: bool,
    },

    /// Merge task output files on remote storage
    #[command(name = "merge")]
    Merge {
        /// Remote task output directory
        output_root: String,

        /// Output kind to merge
        #[arg(long, value_enum)]
        kind: OutputKind,

        /// Merge per selection instead of as one set
        #[arg(long)]
        group: bool,

        /// Copy merged files back to remote storage
        #[arg(long)]
        copy_back: bool,

        /// Delete source files of groups that were merged and copied back
        #[arg(long)]
        cleanup: bool,
    },

    /// Delete the subdirectories of a remote task output directory
    #[command(name = "clean")]
    Clean {
        /// Remote directory whose subdirectories are removed
        remote_dir: String,

        /// Skip the confirmation prompt
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },
}
