//! Instruction Set Architecture (ISA) definitions.
//!
//! The [`for_each_instruction!`](crate::for_each_instruction) macro holds the
//! canonical instruction table and invokes a callback macro for code
//! generation, so the opcode list is written down exactly once.
//!
//! This module generates:
//! - The [`Instruction`] enum with opcode mappings
//! - Opcode lookup, mnemonics and per-parameter access kinds
//!
//! # Parameter kinds
//!
//! - `Read`: the parameter is resolved through its addressing mode to a value.
//! - `Write`: the parameter names the address a result is stored to. It is
//!   never dereferenced; relative mode still offsets it by the relative base.

use crate::virtual_machine::memory::Value;

/// Invokes a callback macro with the complete instruction definition list.
#[macro_export]
macro_rules! for_each_instruction {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Arithmetic
            // =========================
            /// ADD a, b, dst ; dst = a + b
            Add = 1, "ADD" => [a: Read, b: Read, dst: Write],
            /// MUL a, b, dst ; dst = a * b
            Mul = 2, "MUL" => [a: Read, b: Read, dst: Write],
            // =========================
            // I/O
            // =========================
            /// IN dst ; dst = next input value, suspends when none is available
            In = 3, "IN" => [dst: Write],
            /// OUT a ; push a to the output channel
            Out = 4, "OUT" => [a: Read],
            // =========================
            // Control flow
            // =========================
            /// JNZ cond, target ; if cond != 0 then ip = target
            JumpIfTrue = 5, "JNZ" => [cond: Read, target: Read],
            /// JZ cond, target ; if cond == 0 then ip = target
            JumpIfFalse = 6, "JZ" => [cond: Read, target: Read],
            // =========================
            // Comparison
            // =========================
            /// LT a, b, dst ; dst = (a < b) as 0/1
            LessThan = 7, "LT" => [a: Read, b: Read, dst: Write],
            /// EQ a, b, dst ; dst = (a == b) as 0/1
            Equals = 8, "EQ" => [a: Read, b: Read, dst: Write],
            // =========================
            // Machine
            // =========================
            /// ARB a ; relative_base += a
            AdjustRelativeBase = 9, "ARB" => [a: Read],
            /// HALT ; stop execution
            Halt = 99, "HALT" => [],
        }
    };
}

/// How an instruction uses one of its parameters.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ParamKind {
    /// Resolved to a value (interpreted).
    Read,
    /// Resolved to a destination address (literal).
    Write,
}

#[macro_export]
macro_rules! define_instructions {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => [
                $( $field:ident : $kind:ident ),* $(,)?
            ]
        ),* $(,)?
    ) => {
        /// Intcode instruction, discriminant equal to its opcode.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        pub enum Instruction {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl Instruction {
            /// Every instruction in table order.
            pub const ALL: &'static [Instruction] = &[ $( Instruction::$name, )* ];

            /// Looks up the instruction for a base opcode.
            pub const fn from_opcode(opcode: Value) -> Option<Self> {
                match opcode {
                    $( $opcode => Some(Instruction::$name), )*
                    _ => None,
                }
            }

            /// Base opcode of this instruction.
            pub const fn opcode(&self) -> Value {
                *self as Value
            }

            /// Returns the assembly mnemonic for this instruction.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Instruction::$name => $mnemonic, )*
                }
            }

            /// Access kind of each parameter, in order.
            pub const fn params(&self) -> &'static [ParamKind] {
                match self {
                    $( Instruction::$name => &[ $( ParamKind::$kind, )* ], )*
                }
            }

            /// Number of parameter words following the opcode.
            pub const fn arity(&self) -> usize {
                self.params().len()
            }

            /// Instruction length in memory words.
            pub const fn width(&self) -> usize {
                1 + self.arity()
            }
        }
    };
}

for_each_instruction!(define_instructions);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_opcode_known() {
        assert_eq!(Instruction::from_opcode(1), Some(Instruction::Add));
        assert_eq!(Instruction::from_opcode(9), Some(Instruction::AdjustRelativeBase));
        assert_eq!(Instruction::from_opcode(99), Some(Instruction::Halt));
    }

    #[test]
    fn from_opcode_unknown() {
        for opcode in [0, 10, 42, 98, -1] {
            assert_eq!(Instruction::from_opcode(opcode), None);
        }
    }

    #[test]
    fn arities_match_table() {
        let expected = [
            (Instruction::Add, 3),
            (Instruction::Mul, 3),
            (Instruction::In, 1),
            (Instruction::Out, 1),
            (Instruction::JumpIfTrue, 2),
            (Instruction::JumpIfFalse, 2),
            (Instruction::LessThan, 3),
            (Instruction::Equals, 3),
            (Instruction::AdjustRelativeBase, 1),
            (Instruction::Halt, 0),
        ];
        for (instr, arity) in expected {
            assert_eq!(instr.arity(), arity, "{}", instr.mnemonic());
        }
    }

    #[test]
    fn only_result_writers_have_write_params() {
        for instr in Instruction::ALL {
            let writes: Vec<usize> = instr
                .params()
                .iter()
                .enumerate()
                .filter(|(_, k)| **k == ParamKind::Write)
                .map(|(i, _)| i)
                .collect();
            match instr {
                Instruction::Add
                | Instruction::Mul
                | Instruction::In
                | Instruction::LessThan
                | Instruction::Equals => assert_eq!(writes, vec![instr.arity() - 1]),
                _ => assert!(writes.is_empty(), "{}", instr.mnemonic()),
            }
        }
    }

    #[test]
    fn opcode_roundtrips_through_lookup() {
        for instr in Instruction::ALL {
            assert_eq!(Instruction::from_opcode(instr.opcode()), Some(*instr));
        }
    }
}
