//! # crab-pilot
//!
//! Drives the lifecycle of CRAB grid tasks: derive submission parameters
//! from a batch description, render and submit the grid-client
//! configuration, poll and classify task status, recover failed work, and
//! consolidate task output on remote storage.
//!
//! ## Usage
//!
//! ```bash
//! crab-pilot submit --batch batch.yml [--dry-run]
//! crab-pilot status -d crab_projects [--update-sheet] [--merge-finished]
//! crab-pilot merge /store/group/... --kind hist --group --copy-back
//! ```
//!
//! ## Modules
//!
//! - `params` - Typed, case-normalized submission parameters
//! - `generators` - Named derivation steps building a job's parameters
//! - `template` - `__TOKEN__` rendering, template manifest and archival copies
//! - `status` - Status parsing, task-state classification and recovery actions
//! - `grid` - Wrapper around the grid submission client
//! - `submit` - Batch submission over generators, templates and the grid client
//! - `storage` - Remote storage client wrapper
//! - `consolidate` - Output discovery, grouping, merging and verified cleanup
//! - `sheets` - Spreadsheet task tracking
//! - `notify` - Push and email notifications
//! - `subprocess` - Subprocess abstraction with a mockable runner
pub mod app;
pub mod cli;
pub mod config;
pub mod consolidate;
pub mod error;
pub mod generators;
pub mod grid;
pub mod notify;
pub mod params;
pub mod pool;
pub mod sheets;
pub mod status;
pub mod storage;
pub mod submit;
pub mod subprocess;
pub mod template;
