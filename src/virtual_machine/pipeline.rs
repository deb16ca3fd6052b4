//! Composition of several programs over shared channels.
//!
//! Member `i` writes to the channel member `i + 1` reads from. In a
//! [`Topology::Cycle`] the last member additionally feeds the first, so the
//! terminal member's output and the first member's input are the same queue.
//!
//! A pipeline can be driven two ways:
//! - [`Pipeline::run_cooperative`]: one thread, members stepped round-robin,
//!   suspending whenever they starve for input. Deterministic.
//! - [`Pipeline::run_concurrent`]: one tokio task per member with blocking
//!   input. Channels are the only shared state.
//!
//! Both return the last value output by the terminal (last) member.

use crate::debug;
use crate::virtual_machine::channel::Channel;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::memory::Value;
use crate::virtual_machine::program::ProgramImage;
use crate::virtual_machine::vm::{RunOutcome, VM};
use tokio::sync::mpsc::channel;

/// How pipeline members are wired together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    /// Open chain with a free input on the first member and a free output on
    /// the last.
    Chain,
    /// Closed loop; the last member's output feeds back into the first.
    Cycle,
}

/// Several programs connected output-to-input.
#[derive(Debug)]
pub struct Pipeline {
    members: Vec<VM>,
    channels: Vec<Channel>,
    topology: Topology,
}

impl Pipeline {
    /// Wires `members` in order with fresh channels.
    ///
    /// Any channels the members were previously attached to are replaced.
    pub fn new(mut members: Vec<VM>, topology: Topology) -> Self {
        let count = match topology {
            Topology::Chain => members.len() + 1,
            Topology::Cycle => members.len(),
        };
        let channels: Vec<Channel> = (0..count).map(|_| Channel::new()).collect();
        for (i, vm) in members.iter_mut().enumerate() {
            vm.set_input(channels[i].clone());
            vm.set_output(channels[(i + 1) % count].clone());
        }
        Self {
            members,
            channels,
            topology,
        }
    }

    /// `n` copies of `image` wired as a chain.
    pub fn chain(image: &ProgramImage, n: usize) -> Self {
        Self::new(Self::instances(image, n), Topology::Chain)
    }

    /// `n` copies of `image` wired as a feedback cycle.
    pub fn cycle(image: &ProgramImage, n: usize) -> Self {
        Self::new(Self::instances(image, n), Topology::Cycle)
    }

    fn instances(image: &ProgramImage, n: usize) -> Vec<VM> {
        (0..n).map(|_| VM::from_image(image)).collect()
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member(&self, index: usize) -> Option<&VM> {
        self.members.get(index)
    }

    /// Input channel of the first member.
    pub fn input(&self) -> Option<&Channel> {
        self.channels.first()
    }

    /// Output channel of the terminal member.
    ///
    /// For a cycle this is the same queue as [`input`](Self::input).
    pub fn output(&self) -> Option<&Channel> {
        match self.topology {
            Topology::Chain => self.channels.last(),
            Topology::Cycle => self.channels.first(),
        }
    }

    /// Queues `values` on member `index`'s input, e.g. a phase setting.
    pub fn seed(
        &self,
        index: usize,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<(), VMError> {
        let vm = self
            .members
            .get(index)
            .ok_or(VMError::NoSuchMember { index })?;
        vm.push_inputs(values);
        Ok(())
    }

    /// Applies the same step budget to every member.
    pub fn set_step_limit(&mut self, limit: Option<u64>) {
        for vm in &mut self.members {
            vm.set_step_limit(limit);
        }
    }

    /// Runs every member on the current thread until the terminal member halts.
    ///
    /// Each round gives every running member a turn that lasts until it halts
    /// or starves for input. Returns [`VMError::Deadlock`] when a whole round
    /// executes no instruction.
    pub fn run_cooperative(&mut self) -> Result<Value, VMError> {
        let terminal = self.members.len().checked_sub(1).ok_or(VMError::NoOutput)?;

        loop {
            let mut progressed = false;
            for (index, vm) in self.members.iter_mut().enumerate() {
                if vm.is_halted() {
                    continue;
                }
                let before = vm.steps();
                let outcome = vm
                    .run_to_halt()
                    .map_err(|source| VMError::MemberFailed {
                        index,
                        source: Box::new(source),
                    })?;
                progressed |= vm.steps() != before;
                if outcome == RunOutcome::Halted {
                    debug!("pipeline member {} halted after {} steps", index, vm.steps());
                }
            }

            let last = &self.members[terminal];
            if last.is_halted() {
                return last.last_output().ok_or(VMError::NoOutput);
            }
            if !progressed {
                return Err(VMError::Deadlock);
            }
        }
    }

    /// Runs every member on its own task until the terminal member halts.
    ///
    /// On terminal halt, or on the first member failure, every channel is
    /// closed and the remaining tasks are aborted. Members still blocked on
    /// input at that point are discarded. There is no deadlock detection in
    /// this mode; wrap the call in a timeout if the members may starve.
    pub async fn run_concurrent(self) -> Result<Value, VMError> {
        let count = self.members.len();
        let terminal = count.checked_sub(1).ok_or(VMError::NoOutput)?;
        let (sx, mut rx) = channel::<(usize, Result<Option<Value>, VMError>)>(count);

        let mut handles = Vec::with_capacity(count);
        for (index, mut vm) in self.members.into_iter().enumerate() {
            let sender = sx.clone();
            handles.push(tokio::spawn(async move {
                let result = vm.run().await.map(|()| vm.last_output());
                let _ = sender.send((index, result)).await;
            }));
        }
        drop(sx);

        let outcome = loop {
            match rx.recv().await {
                Some((index, Ok(last))) if index == terminal => {
                    debug!("pipeline terminal member {} halted", index);
                    break last.ok_or(VMError::NoOutput);
                }
                Some((index, Ok(_))) => debug!("pipeline member {} halted", index),
                Some((index, Err(source))) => {
                    break Err(VMError::MemberFailed {
                        index,
                        source: Box::new(source),
                    });
                }
                None => break Err(VMError::NoOutput),
            }
        };

        for channel in &self.channels {
            channel.close();
        }
        for handle in &handles {
            handle.abort();
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::utils::{
        AMPLIFIER_CHAIN_PROGRAM, AMPLIFIER_FEEDBACK_LONG_PROGRAM, AMPLIFIER_FEEDBACK_PROGRAM,
        amplifiers, image,
    };
    use std::time::Duration;
    use tokio::time::timeout;

    fn permutations(values: &[Value]) -> Vec<Vec<Value>> {
        if values.len() <= 1 {
            return vec![values.to_vec()];
        }
        let mut out = Vec::new();
        for i in 0..values.len() {
            let mut rest = values.to_vec();
            let head = rest.remove(i);
            for mut tail in permutations(&rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn chain_wires_outputs_to_next_inputs() {
        let pipeline = Pipeline::chain(&image(&[99]), 3);
        assert_eq!(pipeline.len(), 3);
        for i in 0..2 {
            let (a, b) = (pipeline.member(i).unwrap(), pipeline.member(i + 1).unwrap());
            assert!(a.output().same_channel(b.input()));
        }
        let last = pipeline.member(2).unwrap();
        assert!(last.output().same_channel(pipeline.output().unwrap()));
        assert!(!last.output().same_channel(pipeline.input().unwrap()));
    }

    #[test]
    fn cycle_feeds_back_to_first() {
        let pipeline = Pipeline::cycle(&image(&[99]), 4);
        let first = pipeline.member(0).unwrap();
        let last = pipeline.member(3).unwrap();
        assert!(last.output().same_channel(first.input()));
        assert!(pipeline.input().unwrap().same_channel(pipeline.output().unwrap()));
    }

    #[test]
    fn chain_of_amplifiers() {
        let mut pipeline = amplifiers(AMPLIFIER_CHAIN_PROGRAM, &[4, 3, 2, 1, 0], Topology::Chain);
        assert_eq!(pipeline.run_cooperative().unwrap(), 43210);
        assert_eq!(pipeline.output().unwrap().drain(), vec![43210]);
    }

    #[test]
    fn feedback_cycle_cooperative() {
        let mut pipeline =
            amplifiers(AMPLIFIER_FEEDBACK_PROGRAM, &[9, 8, 7, 6, 5], Topology::Cycle);
        assert_eq!(pipeline.run_cooperative().unwrap(), 139629729);

        let mut pipeline =
            amplifiers(AMPLIFIER_FEEDBACK_LONG_PROGRAM, &[9, 7, 8, 5, 6], Topology::Cycle);
        assert_eq!(pipeline.run_cooperative().unwrap(), 18216);
    }

    #[test]
    fn best_feedback_permutation() {
        let best = permutations(&[5, 6, 7, 8, 9])
            .into_iter()
            .map(|phases| {
                amplifiers(AMPLIFIER_FEEDBACK_PROGRAM, &phases, Topology::Cycle)
                    .run_cooperative()
                    .unwrap()
            })
            .max();
        assert_eq!(best, Some(139629729));
    }

    #[tokio::test]
    async fn feedback_cycle_concurrent() {
        let pipeline = amplifiers(AMPLIFIER_FEEDBACK_PROGRAM, &[9, 8, 7, 6, 5], Topology::Cycle);
        let result = timeout(Duration::from_secs(5), pipeline.run_concurrent())
            .await
            .expect("pipeline stalled");
        assert_eq!(result.unwrap(), 139629729);

        let pipeline =
            amplifiers(AMPLIFIER_FEEDBACK_LONG_PROGRAM, &[9, 7, 8, 5, 6], Topology::Cycle);
        let result = timeout(Duration::from_secs(5), pipeline.run_concurrent())
            .await
            .expect("pipeline stalled");
        assert_eq!(result.unwrap(), 18216);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_matches_cooperative() {
        for phases in permutations(&[5, 6, 7, 8, 9]).into_iter().take(12) {
            let expected = amplifiers(AMPLIFIER_FEEDBACK_LONG_PROGRAM, &phases, Topology::Cycle)
                .run_cooperative()
                .unwrap();
            let pipeline = amplifiers(AMPLIFIER_FEEDBACK_LONG_PROGRAM, &phases, Topology::Cycle);
            let actual = timeout(Duration::from_secs(5), pipeline.run_concurrent())
                .await
                .expect("pipeline stalled")
                .unwrap();
            assert_eq!(actual, expected, "phases {phases:?}");
        }
    }

    #[tokio::test]
    async fn concurrent_chain() {
        let pipeline = amplifiers(AMPLIFIER_CHAIN_PROGRAM, &[4, 3, 2, 1, 0], Topology::Chain);
        let result = timeout(Duration::from_secs(5), pipeline.run_concurrent())
            .await
            .expect("pipeline stalled");
        assert_eq!(result.unwrap(), 43210);
    }

    #[test]
    fn starved_cycle_deadlocks() {
        let mut pipeline = Pipeline::cycle(&image(&[3, 0, 4, 0, 99]), 2);
        assert!(matches!(pipeline.run_cooperative(), Err(VMError::Deadlock)));
    }

    #[test]
    fn member_failure_is_reported_with_index() {
        let members = vec![
            VM::from_image(&image(&[3, 0, 4, 0, 99])),
            VM::from_image(&image(&[3, 0, 42])),
        ];
        let mut pipeline = Pipeline::new(members, Topology::Chain);
        pipeline.seed(0, [5]).unwrap();
        let err = pipeline.run_cooperative().unwrap_err();
        assert!(matches!(
            err,
            VMError::MemberFailed { index: 1, ref source }
                if matches!(**source, VMError::UnknownOpcode { opcode: 42, ip: 2 })
        ));
    }

    #[tokio::test]
    async fn concurrent_member_failure_tears_down() {
        // Member 0 waits forever on input that never comes; member 1 fails.
        let members = vec![
            VM::from_image(&image(&[3, 0, 99])),
            VM::from_image(&image(&[1, -1, 0, 0, 99])),
            VM::from_image(&image(&[3, 0, 4, 0, 99])),
        ];
        let pipeline = Pipeline::new(members, Topology::Chain);
        let result = timeout(Duration::from_secs(5), pipeline.run_concurrent())
            .await
            .expect("pipeline stalled");
        assert!(matches!(
            result,
            Err(VMError::MemberFailed { index: 1, .. })
        ));
    }

    #[test]
    fn terminal_without_output() {
        let mut pipeline = Pipeline::chain(&image(&[99]), 2);
        assert!(matches!(pipeline.run_cooperative(), Err(VMError::NoOutput)));
    }

    #[test]
    fn empty_pipeline_has_no_output() {
        let mut pipeline = Pipeline::new(Vec::new(), Topology::Cycle);
        assert!(pipeline.is_empty());
        assert!(pipeline.input().is_none());
        assert!(matches!(pipeline.run_cooperative(), Err(VMError::NoOutput)));
    }

    #[test]
    fn seed_rejects_unknown_member() {
        let pipeline = Pipeline::chain(&image(&[99]), 2);
        assert!(matches!(
            pipeline.seed(2, [1]),
            Err(VMError::NoSuchMember { index: 2 })
        ));
    }

    #[test]
    fn step_limit_applies_to_members() {
        let mut pipeline = Pipeline::chain(&image(&[1105, 1, 0]), 2);
        pipeline.set_step_limit(Some(50));
        assert!(matches!(
            pipeline.run_cooperative(),
            Err(VMError::MemberFailed {
                index: 0,
                ref source
            }) if matches!(**source, VMError::StepLimitExceeded { limit: 50 })
        ));
    }
}
