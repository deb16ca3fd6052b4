//! Intcode virtual machine.
//!
//! Executes programs of integer opcodes against a sparse integer memory and
//! connects programs to each other through FIFO channels.
//!
//! # Architecture
//!
//! - **Memory**: unbounded, sparse, zero-initialized [`memory::Value`] cells
//! - **Instruction format**: opcode in the two lowest decimal digits, one
//!   addressing-mode digit per parameter above them
//! - **Addressing modes**: position, immediate and relative (offset from the
//!   relative base)
//! - **I/O**: input and output [`channel::Channel`]s; an empty input suspends
//!   the program without consuming anything
//! - **Composition**: [`pipeline::Pipeline`] chains or cycles programs and runs
//!   them cooperatively or on concurrent tasks
//!
//! # Modules
//!
//! - [`ascii`]: Text encoding convention for channel traffic
//! - [`channel`]: Shared FIFO queues with blocking and non-blocking receive
//! - [`errors`]: Parse, decode and execution error types
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`memory`]: Sparse memory and snapshots
//! - [`operand`]: Extended opcode and parameter mode decoding
//! - [`pipeline`]: Multi-program wiring and drivers
//! - [`program`]: Program image parsing
//! - [`vm`]: Core virtual machine implementation

pub mod ascii;
pub mod channel;
pub mod errors;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod memory;
pub mod operand;
pub mod pipeline;
pub mod program;
pub mod vm;
