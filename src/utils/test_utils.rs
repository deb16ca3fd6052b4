//! Shared fixtures for Intcode tests.

#[cfg(test)]
pub mod utils {
    use crate::virtual_machine::memory::Value;
    use crate::virtual_machine::pipeline::{Pipeline, Topology};
    use crate::virtual_machine::program::ProgramImage;

    /// Outputs a copy of itself using relative-mode addressing.
    pub const QUINE_PROGRAM: &[Value] = &[
        109, 1, 204, -1, 1001, 100, 1, 100, 1008, 100, 16, 101, 1006, 101, 0, 99,
    ];

    /// Reads one value and outputs 999, 1000 or 1001 when it is below, equal
    /// to or above 8.
    pub const LARGER_COMPARE_PROGRAM: &[Value] = &[
        3, 21, 1008, 21, 8, 20, 1005, 20, 22, 107, 8, 21, 20, 1006, 20, 31, 1106, 0, 36, 98, 0,
        0, 1002, 21, 125, 20, 4, 20, 1105, 1, 46, 104, 999, 1105, 1, 46, 1101, 1000, 1, 20, 4,
        20, 1105, 1, 46, 98, 99,
    ];

    /// Amplifier reading a phase and a signal once. Phases 4,3,2,1,0 give 43210.
    pub const AMPLIFIER_CHAIN_PROGRAM: &[Value] = &[
        3, 15, 3, 16, 1002, 16, 10, 16, 1, 16, 15, 15, 4, 15, 99, 0, 0,
    ];

    /// Feedback amplifier. Phases 9,8,7,6,5 give 139629729.
    pub const AMPLIFIER_FEEDBACK_PROGRAM: &[Value] = &[
        3, 26, 1001, 26, -4, 26, 3, 27, 1002, 27, 2, 27, 1, 27, 26, 27, 4, 27, 1001, 28, -1, 28,
        1005, 28, 6, 99, 0, 0, 5,
    ];

    /// Feedback amplifier. Phases 9,7,8,5,6 give 18216.
    pub const AMPLIFIER_FEEDBACK_LONG_PROGRAM: &[Value] = &[
        3, 52, 1001, 52, -5, 52, 3, 53, 1, 52, 56, 54, 1007, 54, 5, 55, 1005, 55, 26, 1001, 54,
        -5, 54, 1105, 1, 12, 1, 53, 54, 53, 1008, 54, 0, 55, 1001, 55, 1, 55, 2, 53, 55, 53, 4,
        53, 1001, 56, -1, 56, 1005, 56, 6, 99, 0, 0, 0, 0, 10,
    ];

    pub fn image(values: &[Value]) -> ProgramImage {
        ProgramImage::from(values)
    }

    /// Builds one amplifier per phase, seeds each with its phase and feeds
    /// the initial signal 0 to the first.
    pub fn amplifiers(program: &[Value], phases: &[Value], topology: Topology) -> Pipeline {
        let pipeline = match topology {
            Topology::Chain => Pipeline::chain(&image(program), phases.len()),
            Topology::Cycle => Pipeline::cycle(&image(program), phases.len()),
        };
        for (index, phase) in phases.iter().enumerate() {
            pipeline.seed(index, [*phase]).expect("phase seeding failed");
        }
        pipeline.seed(0, [0]).expect("signal seeding failed");
        pipeline
    }
}
