//! One module per subcommand

pub mod clean;
pub mod merge;
pub mod recover;
pub mod resubmit;
pub mod status;
pub mod submit;

pub use clean::run_clean;
pub use merge::run_merge;
pub use recover::run_recover;
pub use resubmit::run_resubmit;
pub use status::{find_task_dirs, run_status, StatusParams};
pub use submit::run_submit;
