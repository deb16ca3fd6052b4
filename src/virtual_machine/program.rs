//! Program image representation and parsing.
//!
//! A [`ProgramImage`] is the initial memory contents of an Intcode program,
//! conventionally written as comma-separated signed integers:
//!
//! ```text
//! 1,9,10,3,2,3,11,0,99,30,40,50
//! ```
//!
//! Whitespace around tokens (including a trailing newline) is ignored.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::memory::{Memory, Value};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Initial memory image of an Intcode program, loaded at address 0.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgramImage {
    values: Vec<Value>,
}

impl ProgramImage {
    /// Wraps an already parsed list of values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Parses an image from comma-separated text.
    ///
    /// Returns [`VMError::ParseError`] naming the first token that is not an integer.
    pub fn parse(source: &str) -> Result<Self, VMError> {
        let source = source.trim();
        if source.is_empty() {
            return Ok(Self::default());
        }

        let values = source
            .split(',')
            .enumerate()
            .map(|(index, token)| {
                let token = token.trim();
                token.parse::<Value>().map_err(|_| VMError::ParseError {
                    index,
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { values })
    }

    /// Reads and parses an image from a text file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, VMError> {
        let source = fs::read_to_string(path)?;
        Self::parse(&source)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Builds a fresh memory holding this image.
    pub fn to_memory(&self) -> Memory {
        Memory::from_values(&self.values)
    }
}

impl FromStr for ProgramImage {
    type Err = VMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Vec<Value>> for ProgramImage {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl From<&[Value]> for ProgramImage {
    fn from(values: &[Value]) -> Self {
        Self::new(values.to_vec())
    }
}

impl fmt::Display for ProgramImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{value}")?;
        }
        Ok(())
    }
}
