use crate::virtual_machine::memory::Value;

/// Errors that can occur while parsing, decoding or executing Intcode.
#[derive(Debug, thiserror::Error)]
pub enum VMError {
    /// Fetched opcode has no entry in the instruction set.
    #[error("unknown opcode {opcode} at ip {ip}")]
    UnknownOpcode { opcode: Value, ip: usize },
    /// Parameter mode digit outside of position/immediate/relative.
    #[error("invalid parameter mode {mode} at ip {ip}")]
    InvalidParameterMode { mode: Value, ip: usize },
    /// Resolved memory address is negative or does not fit the address space.
    #[error("invalid memory address {address} at ip {ip}")]
    NegativeAddress { address: Value, ip: usize },
    /// Instruction at `ip` extends past the end of the address space.
    #[error("instruction at ip {ip} runs past the end of memory")]
    AddressOverflow { ip: usize },
    /// Checked arithmetic overflowed the value range.
    #[error("arithmetic overflow in {instruction} at ip {ip}")]
    ArithmeticOverflow {
        instruction: &'static str,
        ip: usize,
    },
    /// Execution exceeded the configured step budget.
    #[error("step limit of {limit} exceeded")]
    StepLimitExceeded { limit: u64 },
    /// A blocking receive was woken by a closed, empty channel.
    #[error("channel closed")]
    ChannelClosed,
    /// Program image contains a token that is not an integer.
    #[error("invalid token {token:?} at index {index}")]
    ParseError { index: usize, token: String },
    /// File I/O error while loading an image.
    #[error("io error: {0}")]
    Io(String),
    /// No pipeline member could make progress.
    #[error("pipeline deadlock: every running member is waiting for input")]
    Deadlock,
    /// A pipeline member failed, aborting the pipeline.
    #[error("pipeline member {index} failed: {source}")]
    MemberFailed {
        index: usize,
        #[source]
        source: Box<VMError>,
    },
    /// Pipeline index out of range.
    #[error("pipeline has no member {index}")]
    NoSuchMember { index: usize },
    /// The terminal program halted without producing any output.
    #[error("terminal program produced no output")]
    NoOutput,
}

impl From<std::io::Error> for VMError {
    fn from(err: std::io::Error) -> Self {
        VMError::Io(err.to_string())
    }
}
