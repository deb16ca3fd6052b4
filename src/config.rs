//! Runner configuration.
//!
//! Settings come from the environment first and are then overridden by
//! command-line flags.

use crate::utils::log::{self, Level};
use crate::virtual_machine::vm::VM;
use std::sync::atomic::Ordering;

/// Environment variable holding the default step limit.
pub const STEP_LIMIT_ENV: &str = "INTCODE_STEP_LIMIT";

/// Knobs for a single program run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// Maximum instructions executed before the run fails.
    pub step_limit: Option<u64>,
    /// Log every executed instruction.
    pub trace: bool,
    /// Exchange text lines instead of raw integers.
    pub ascii: bool,
    /// Prefix log lines with a timestamp.
    pub show_timestamps: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            step_limit: None,
            trace: false,
            ascii: false,
            show_timestamps: true,
        }
    }
}

impl RunConfig {
    /// Builds a configuration from the process environment.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = Self::default();
        if let Some(value) = lookup(STEP_LIMIT_ENV) {
            config.step_limit = Some(parse_step_limit(&value)?);
        }
        Ok(config)
    }

    /// Installs the logging settings globally.
    pub fn apply_logging(&self) {
        if self.trace {
            log::set_level(Level::Trace);
        }
        log::SHOW_TIMESTAMP.store(self.show_timestamps, Ordering::Relaxed);
    }

    /// Applies execution limits to `vm`.
    pub fn apply(&self, vm: &mut VM) {
        vm.set_step_limit(self.step_limit);
    }
}

/// Parses a positive step count.
pub fn parse_step_limit(value: &str) -> Result<u64, String> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err("step limit must be positive".to_string()),
        Ok(limit) => Ok(limit),
        Err(_) => Err(format!("invalid step limit '{}'", value.trim())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::utils::image;
    use crate::virtual_machine::errors::VMError;

    #[test]
    fn defaults_without_environment() {
        let config = RunConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, RunConfig::default());
        assert!(config.show_timestamps);
    }

    #[test]
    fn step_limit_from_environment() {
        let config = RunConfig::from_lookup(|key| {
            (key == STEP_LIMIT_ENV).then(|| " 5000 ".to_string())
        })
        .unwrap();
        assert_eq!(config.step_limit, Some(5000));
    }

    #[test]
    fn bad_step_limit_is_rejected() {
        assert!(parse_step_limit("lots").is_err());
        assert!(parse_step_limit("0").is_err());
        assert!(parse_step_limit("-3").is_err());
        assert!(RunConfig::from_lookup(|_| Some("x".to_string())).is_err());
    }

    #[test]
    fn apply_sets_vm_limit() {
        let config = RunConfig {
            step_limit: Some(3),
            ..RunConfig::default()
        };
        let mut vm = VM::from_image(&image(&[1105, 1, 0]));
        config.apply(&mut vm);
        assert!(matches!(
            vm.run_to_halt(),
            Err(VMError::StepLimitExceeded { limit: 3 })
        ));
    }
}
