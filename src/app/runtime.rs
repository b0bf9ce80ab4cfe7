//! Runtime setup: signal handling for cooperative cancellation

use crate::error::CrabError;
use anyhow::{Context, Result};
use signal_hook::consts::{SIGINT, SIGTERM};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set by SIGINT/SIGTERM and polled between units of work
///
/// Batch loops check the flag before starting the next task, job entry or
/// file group. A second signal while the flag is already set exits
/// immediately with status 130.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    flag: Arc<AtomicBool>,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the process signal handlers onto a fresh flag
    pub fn install() -> Result<Self> {
        let interrupt = Self::new();
        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register_conditional_shutdown(
                signal,
                130,
                Arc::clone(&interrupt.flag),
            )
            .context("Failed to register shutdown handler")?;
            signal_hook::flag::register(signal, Arc::clone(&interrupt.flag))
                .context("Failed to register interrupt handler")?;
        }
        Ok(interrupt)
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// `Err(Interrupted)` once a signal has arrived
    pub fn check(&self) -> std::result::Result<(), CrabError> {
        if self.is_set() {
            Err(CrabError::interrupted())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_shared_between_clones() {
        let flag = InterruptFlag::new();
        let clone = flag.clone();
        assert!(flag.check().is_ok());

        clone.trigger();
        assert!(flag.is_set());
        assert_eq!(flag.check().unwrap_err().exit_code(), 130);
    }
}
