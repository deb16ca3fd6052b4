use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::memory::{Memory, Value};
use crate::virtual_machine::operand::{self, MAX_PARAMS, Parameter, ParameterMode};
use std::fmt;

/// Decoded state of the instruction being executed.
///
/// Built fresh for every step from the extended opcode at the instruction
/// pointer. Parameters are consumed in order by the dispatch table.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    /// Raw word fetched at `ip`, opcode plus mode digits.
    pub extended_opcode: Value,
    /// Address of the extended opcode.
    pub ip: usize,
    /// Relative base at fetch time.
    pub relative_base: Value,
    /// Instruction selected by the base opcode.
    pub instruction: Instruction,
    params: [Parameter; MAX_PARAMS],
    cursor: usize,
    next_ip: usize,
}

impl ExecutionContext {
    /// Fetches and decodes the instruction at `ip`.
    ///
    /// Returns [`VMError::UnknownOpcode`] if the base opcode is not in the
    /// instruction set, [`VMError::InvalidParameterMode`] for a bad mode digit
    /// and [`VMError::AddressOverflow`] when the instruction or its successor
    /// would lie past `usize::MAX`.
    pub fn fetch(memory: &Memory, ip: usize, relative_base: Value) -> Result<Self, VMError> {
        let extended_opcode = memory.get(ip);
        let (opcode, mode_digits) = operand::split(extended_opcode);
        let instruction = Instruction::from_opcode(opcode).ok_or(VMError::UnknownOpcode {
            opcode: extended_opcode,
            ip,
        })?;
        let modes = operand::decode_modes(mode_digits, instruction.arity(), ip)?;
        let next_ip = match ip.checked_add(instruction.width()) {
            Some(next_ip) => next_ip,
            // HALT has no successor.
            None if instruction == Instruction::Halt => ip,
            None => return Err(VMError::AddressOverflow { ip }),
        };

        let mut params = [Parameter {
            raw: 0,
            mode: ParameterMode::Position,
        }; MAX_PARAMS];
        for (i, param) in params.iter_mut().enumerate().take(instruction.arity()) {
            *param = Parameter {
                raw: memory.get(ip + 1 + i),
                mode: modes[i],
            };
        }

        Ok(Self {
            extended_opcode,
            ip,
            relative_base,
            instruction,
            params,
            cursor: 0,
            next_ip,
        })
    }

    /// Decoded parameters of the current instruction.
    pub fn parameters(&self) -> &[Parameter] {
        &self.params[..self.instruction.arity()]
    }

    /// Number of parameters consumed so far.
    pub(super) fn consumed(&self) -> usize {
        self.cursor
    }

    /// Takes the next undecoded parameter.
    pub(super) fn next_param(&mut self) -> Parameter {
        let param = self.params[self.cursor];
        self.cursor += 1;
        param
    }

    fn relative(&self, offset: Value) -> Result<Value, VMError> {
        self.relative_base
            .checked_add(offset)
            .ok_or(VMError::ArithmeticOverflow {
                instruction: self.instruction.mnemonic(),
                ip: self.ip,
            })
    }

    /// Resolves a parameter to the value it denotes.
    pub(super) fn read(&self, param: Parameter, memory: &Memory) -> Result<Value, VMError> {
        match param.mode {
            ParameterMode::Immediate => Ok(param.raw),
            ParameterMode::Position => Ok(memory.get(Memory::address(param.raw, self.ip)?)),
            ParameterMode::Relative => {
                let address = self.relative(param.raw)?;
                Ok(memory.get(Memory::address(address, self.ip)?))
            }
        }
    }

    /// Resolves a parameter to the address a result is written to.
    ///
    /// The word is taken literally; only relative mode adjusts it.
    pub(super) fn write_target(&self, param: Parameter) -> Result<usize, VMError> {
        let address = match param.mode {
            ParameterMode::Position | ParameterMode::Immediate => param.raw,
            ParameterMode::Relative => self.relative(param.raw)?,
        };
        Memory::address(address, self.ip)
    }

    /// Address of the instruction following this one.
    pub fn next_ip(&self) -> usize {
        self.next_ip
    }
}

impl fmt::Display for ExecutionContext {
    /// Renders the instruction in assembly form, e.g. `ADD [9] #3 ~r+2`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.instruction.mnemonic())?;
        for param in self.parameters() {
            match param.mode {
                ParameterMode::Position => write!(f, " [{}]", param.raw)?,
                ParameterMode::Immediate => write!(f, " #{}", param.raw)?,
                ParameterMode::Relative if param.raw < 0 => write!(f, " ~r{}", param.raw)?,
                ParameterMode::Relative => write!(f, " ~r+{}", param.raw)?,
            }
        }
        Ok(())
    }
}
