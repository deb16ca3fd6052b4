//! Extended opcode decoding.
//!
//! An extended opcode packs the instruction opcode into its two lowest decimal
//! digits. Every further digit, least significant first, selects the
//! [`ParameterMode`] of parameters 1, 2 and 3. Missing digits mean
//! [`ParameterMode::Position`].

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::memory::Value;

/// Largest arity of any instruction.
pub const MAX_PARAMS: usize = 3;

/// How a raw parameter value is turned into an operand.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParameterMode {
    /// Value is an address to dereference.
    #[default]
    Position = 0,
    /// Value is used as-is.
    Immediate = 1,
    /// Value is an offset from the relative base.
    Relative = 2,
}

impl TryFrom<Value> for ParameterMode {
    type Error = VMError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Position),
            1 => Ok(Self::Immediate),
            2 => Ok(Self::Relative),
            _ => Err(VMError::InvalidParameterMode { mode: value, ip: 0 }),
        }
    }
}

/// Raw parameter word paired with its addressing mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub raw: Value,
    pub mode: ParameterMode,
}

/// Splits an extended opcode into `(opcode, packed mode digits)`.
#[inline]
pub const fn split(extended: Value) -> (Value, Value) {
    (extended % 100, extended / 100)
}

/// Decodes the first `arity` parameter modes from the packed mode digits.
///
/// Digits beyond `arity` are ignored. `ip` is only used for error reporting.
pub fn decode_modes(
    mut digits: Value,
    arity: usize,
    ip: usize,
) -> Result<[ParameterMode; MAX_PARAMS], VMError> {
    let mut modes = [ParameterMode::Position; MAX_PARAMS];
    for mode in modes.iter_mut().take(arity) {
        *mode = ParameterMode::try_from(digits % 10)
            .map_err(|_| VMError::InvalidParameterMode { mode: digits % 10, ip })?;
        digits /= 10;
    }
    Ok(modes)
}

/// Rebuilds an extended opcode from an opcode and explicit modes.
pub fn encode(opcode: Value, modes: &[ParameterMode]) -> Value {
    let mut scale = 100;
    let mut extended = opcode;
    for mode in modes {
        extended += *mode as Value * scale;
        scale *= 10;
    }
    extended
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_machine::isa::Instruction;

    #[test]
    fn parameter_mode_try_from_valid() {
        assert_eq!(ParameterMode::try_from(0).unwrap(), ParameterMode::Position);
        assert_eq!(ParameterMode::try_from(1).unwrap(), ParameterMode::Immediate);
        assert_eq!(ParameterMode::try_from(2).unwrap(), ParameterMode::Relative);
    }

    #[test]
    fn parameter_mode_try_from_invalid() {
        for mode in 3..=9 {
            let err = ParameterMode::try_from(mode).unwrap_err();
            assert!(matches!(err, VMError::InvalidParameterMode { mode: m, .. } if m == mode));
        }
    }

    #[test]
    fn split_plain_opcode() {
        assert_eq!(split(99), (99, 0));
        assert_eq!(split(3), (3, 0));
    }

    #[test]
    fn decode_modes_right_to_left() {
        let (opcode, digits) = split(1002);
        assert_eq!(opcode, 2);
        let modes = decode_modes(digits, 3, 0).unwrap();
        assert_eq!(
            modes,
            [
                ParameterMode::Position,
                ParameterMode::Immediate,
                ParameterMode::Position
            ]
        );
    }

    #[test]
    fn decode_modes_relative() {
        let (opcode, digits) = split(21201);
        assert_eq!(opcode, 1);
        let modes = decode_modes(digits, 3, 0).unwrap();
        assert_eq!(
            modes,
            [
                ParameterMode::Relative,
                ParameterMode::Immediate,
                ParameterMode::Relative
            ]
        );
    }

    #[test]
    fn decode_modes_ignores_digits_past_arity() {
        let (_, digits) = split(31104);
        let modes = decode_modes(digits, 1, 0).unwrap();
        assert_eq!(modes[0], ParameterMode::Immediate);
        assert_eq!(modes[1], ParameterMode::Position);
    }

    #[test]
    fn decode_modes_reports_bad_digit_with_ip() {
        let (_, digits) = split(301);
        let err = decode_modes(digits, 3, 12).unwrap_err();
        assert!(matches!(err, VMError::InvalidParameterMode { mode: 3, ip: 12 }));
    }

    #[test]
    fn decode_then_encode_is_identity() {
        let all = [
            ParameterMode::Position,
            ParameterMode::Immediate,
            ParameterMode::Relative,
        ];
        for instr in Instruction::ALL {
            let arity = instr.arity();
            let combos = 3usize.pow(arity as u32);
            for combo in 0..combos {
                let mut modes = Vec::with_capacity(arity);
                let mut c = combo;
                for _ in 0..arity {
                    modes.push(all[c % 3]);
                    c /= 3;
                }
                let extended = encode(instr.opcode(), &modes);
                let (opcode, digits) = split(extended);
                let decoded = decode_modes(digits, arity, 0).unwrap();
                assert_eq!(opcode, instr.opcode());
                assert_eq!(&decoded[..arity], modes.as_slice());
            }
        }
    }
}
