//! Sparse Intcode memory.
//!
//! Memory is an unbounded address space of [`Value`]s. Unset cells read as zero,
//! so programs can freely write past the end of their image (typically through
//! the relative base).

use crate::virtual_machine::errors::VMError;
use std::collections::HashMap;
use std::fmt;

/// Integer type stored in memory and exchanged over channels.
///
/// Wider than 64 bits so intermediate products of 64-bit operands fit.
pub type Value = i128;

/// Sparse address to value map with an implicit zero default.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Memory {
    cells: HashMap<usize, Value>,
    /// Length of the image this memory was loaded from.
    image_len: usize,
}

impl Memory {
    /// Creates an empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a memory holding `values` at addresses `0..values.len()`.
    pub fn from_values(values: &[Value]) -> Self {
        Self {
            cells: values.iter().copied().enumerate().collect(),
            image_len: values.len(),
        }
    }

    /// Returns the value at `address`, zero if it was never written.
    #[inline]
    pub fn get(&self, address: usize) -> Value {
        self.cells.get(&address).copied().unwrap_or(0)
    }

    /// Writes `value` at `address`.
    #[inline]
    pub fn set(&mut self, address: usize, value: Value) {
        self.cells.insert(address, value);
    }

    pub fn image_len(&self) -> usize {
        self.image_len
    }

    /// Highest address ever written, `None` for an empty memory.
    pub fn highest_address(&self) -> Option<usize> {
        self.cells.keys().max().copied()
    }

    /// Every written cell in address order.
    pub fn entries(&self) -> Vec<(usize, Value)> {
        let mut entries: Vec<_> = self.cells.iter().map(|(&a, &v)| (a, v)).collect();
        entries.sort_unstable_by_key(|&(address, _)| address);
        entries
    }

    /// Returns a dense copy of the image region `0..image_len()`.
    ///
    /// Cells written past the image are only visible through
    /// [`entries`](Self::entries) and [`get`](Self::get).
    pub fn to_vec(&self) -> Vec<Value> {
        (0..self.image_len).map(|addr| self.get(addr)).collect()
    }

    /// Converts a resolved parameter into an address.
    ///
    /// Returns [`VMError::NegativeAddress`] when `value` is negative or too large.
    pub fn address(value: Value, ip: usize) -> Result<usize, VMError> {
        usize::try_from(value).map_err(|_| VMError::NegativeAddress { address: value, ip })
    }
}

impl fmt::Display for Memory {
    /// Image region comma-joined, then cells written past it as `[addr]=value`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for value in self.to_vec() {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{value}")?;
            first = false;
        }
        for (address, value) in self.entries() {
            if address < self.image_len {
                continue;
            }
            if !first {
                f.write_str(",")?;
            }
            write!(f, "[{address}]={value}")?;
            first = false;
        }
        Ok(())
    }
}

/// Opaque capture of a program's full memory.
///
/// Produced by [`VM::dump_memory`](crate::virtual_machine::vm::VM::dump_memory) and
/// restored with [`VM::load_memory`](crate::virtual_machine::vm::VM::load_memory).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot(pub(crate) Memory);

impl Snapshot {
    /// Value stored at `address` in the captured memory.
    pub fn get(&self, address: usize) -> Value {
        self.0.get(address)
    }
}
