//! Intcode virtual machine library.
//!
//! Provides the VM, its channel-based I/O, pipelines of cooperating programs
//! and the configuration used by the `intcode` runner.

pub mod config;
pub mod utils;
pub mod virtual_machine;
