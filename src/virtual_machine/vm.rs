//! Core Intcode virtual machine.
//!
//! A [`VM`] is one running Intcode program: sparse memory, an instruction
//! pointer, a relative base and an input/output [`Channel`] pair. It can be
//! driven one instruction at a time ([`VM::step`]), run until it halts or
//! starves for input ([`VM::run_to_halt`]), or run on a task with blocking
//! input ([`VM::run`]).
//!
//! All arithmetic is checked. Overflow aborts with
//! [`VMError::ArithmeticOverflow`] rather than wrapping.

mod context;

pub use context::ExecutionContext;

use crate::virtual_machine::channel::Channel;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Instruction;
use crate::virtual_machine::memory::{Memory, Snapshot, Value};
use crate::virtual_machine::program::ProgramImage;
use crate::{debug, trace};

/// Result of executing a single instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The instruction executed; more may follow.
    Continued,
    /// An input instruction found its channel empty. Nothing was consumed and the
    /// instruction pointer still addresses the input instruction.
    NeedsInput,
    /// The program reached `HALT`. Further steps return `Halted` again.
    Halted,
}

/// Why [`VM::run_to_halt`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Halted,
    NeedsInput,
}

/// Control flow requested by an instruction handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Next,
    Jump(usize),
    Suspend,
    Halt,
}

macro_rules! exec_vm {
    // Entry point
    (
        vm = $vm:ident,
        ctx = $ctx:ident,
        { $( $variant:ident => $handler:ident ( $( $field:ident : $kind:ident ),* $(,)? ) ),* $(,)? }
    ) => {{
        match $ctx.instruction {
            $(
                Instruction::$variant => {
                    $( let $field = exec_vm!(@read $vm, $ctx, $kind)?; )*
                    debug_assert_eq!($ctx.consumed(), $ctx.instruction.arity());
                    $vm.$handler(&$ctx, $( $field ),*)
                }
            ),*
        }
    }};

    // Interpreted parameter: resolve through its addressing mode
    (@read $vm:ident, $ctx:ident, Read) => {{
        let param = $ctx.next_param();
        $ctx.read(param, &$vm.memory)
    }};

    // Literal parameter: resolve to a destination address
    (@read $vm:ident, $ctx:ident, Write) => {{
        let param = $ctx.next_param();
        $ctx.write_target(param)
    }};
}

/// A running Intcode program.
#[derive(Debug, Default)]
pub struct VM {
    /// Sparse program memory.
    memory: Memory,
    /// Address of the next extended opcode.
    ip: usize,
    /// Offset applied to relative-mode parameters.
    relative_base: Value,
    /// Channel the `IN` instruction reads from.
    input: Channel,
    /// Channel the `OUT` instruction writes to.
    output: Channel,
    /// Input taken by a blocking receive, handed to the next `IN`.
    pending_input: Option<Value>,
    /// Most recent value written by `OUT`, kept even after it is consumed.
    last_output: Option<Value>,
    /// Instructions executed since the last reset.
    steps: u64,
    /// Optional execution budget.
    step_limit: Option<u64>,
    halted: bool,
}

impl VM {
    /// Creates a VM with empty memory and fresh channels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a VM with `image` loaded at address 0 and fresh channels.
    pub fn from_image(image: &ProgramImage) -> Self {
        let mut vm = Self::new();
        vm.load_image(image);
        vm
    }

    /// Creates a VM wired to existing channels.
    pub fn with_channels(image: &ProgramImage, input: Channel, output: Channel) -> Self {
        Self {
            input,
            output,
            ..Self::from_image(image)
        }
    }

    /// Caps the number of instructions executed before
    /// [`VMError::StepLimitExceeded`] is raised.
    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = Some(limit);
        self
    }

    pub fn set_step_limit(&mut self, limit: Option<u64>) {
        self.step_limit = limit;
    }

    /// Replaces memory with `image` and resets execution state.
    pub fn load_image(&mut self, image: &ProgramImage) {
        self.memory = image.to_memory();
        self.reset();
    }

    /// Captures the full current memory.
    pub fn dump_memory(&self) -> Snapshot {
        Snapshot(self.memory.clone())
    }

    /// Replaces memory with `snapshot` and resets the instruction pointer and
    /// relative base to 0. Channels are left untouched.
    pub fn load_memory(&mut self, snapshot: &Snapshot) {
        self.memory = snapshot.0.clone();
        self.reset();
    }

    fn reset(&mut self) {
        self.ip = 0;
        self.relative_base = 0;
        self.pending_input = None;
        self.last_output = None;
        self.steps = 0;
        self.halted = false;
    }

    /// Reads memory at `address`.
    pub fn peek(&self, address: usize) -> Value {
        self.memory.get(address)
    }

    /// Writes memory at `address`, e.g. to patch parameters before a run.
    pub fn poke(&mut self, address: usize, value: Value) {
        self.memory.set(address, value);
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn relative_base(&self) -> Value {
        self.relative_base
    }

    /// Instructions executed since the last load.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn input(&self) -> &Channel {
        &self.input
    }

    pub fn output(&self) -> &Channel {
        &self.output
    }

    pub fn set_input(&mut self, channel: Channel) {
        self.input = channel;
    }

    pub fn set_output(&mut self, channel: Channel) {
        self.output = channel;
    }

    /// Queues a value on the input channel.
    pub fn push_input(&self, value: Value) {
        self.input.send(value);
    }

    /// Queues several values on the input channel, in order.
    pub fn push_inputs(&self, values: impl IntoIterator<Item = Value>) {
        for value in values {
            self.input.send(value);
        }
    }

    /// Most recent value this program has output since the last load.
    pub fn last_output(&self) -> Option<Value> {
        self.last_output
    }

    /// Pops the oldest output value without waiting.
    pub fn try_pop_output(&self) -> Option<Value> {
        self.output.try_recv()
    }

    /// Pops the oldest output value, waiting for one to be produced.
    pub async fn pop_output(&self) -> Result<Value, VMError> {
        self.output.recv().await
    }

    /// Feeds this program's output into `other`'s input.
    ///
    /// Both programs share the channel afterwards. `other`'s previous input
    /// channel is dropped from `other`, including anything still queued on it.
    pub fn link_output_to(&self, other: &mut VM) {
        other.input = self.output.clone();
    }

    /// Renders the instruction at `address` in assembly form.
    pub fn disassemble(&self, address: usize) -> Result<String, VMError> {
        Ok(ExecutionContext::fetch(&self.memory, address, self.relative_base)?.to_string())
    }

    /// Executes one instruction.
    ///
    /// `NeedsInput` and `Halted` are outcomes, not errors: the caller may queue
    /// input and step again. Decode and execution failures are returned as `Err`
    /// and leave the instruction pointer on the faulting instruction.
    pub fn step(&mut self) -> Result<StepOutcome, VMError> {
        if self.halted {
            return Ok(StepOutcome::Halted);
        }
        if let Some(limit) = self.step_limit
            && self.steps >= limit
        {
            return Err(VMError::StepLimitExceeded { limit });
        }

        let mut ctx = ExecutionContext::fetch(&self.memory, self.ip, self.relative_base)?;
        let flow = self.exec(&mut ctx)?;
        trace!(
            "{:>6} {} ({}) rb={}",
            ctx.ip,
            ctx,
            ctx.extended_opcode,
            self.relative_base
        );

        match flow {
            Flow::Next => {
                self.ip = ctx.next_ip();
                self.steps += 1;
                Ok(StepOutcome::Continued)
            }
            Flow::Jump(target) => {
                self.ip = target;
                self.steps += 1;
                Ok(StepOutcome::Continued)
            }
            Flow::Suspend => {
                debug!("waiting for input at ip {}", self.ip);
                Ok(StepOutcome::NeedsInput)
            }
            Flow::Halt => {
                self.halted = true;
                self.steps += 1;
                debug!("halted at ip {} after {} steps", self.ip, self.steps);
                Ok(StepOutcome::Halted)
            }
        }
    }

    /// Steps until the program halts or needs input.
    pub fn run_to_halt(&mut self) -> Result<RunOutcome, VMError> {
        loop {
            match self.step()? {
                StepOutcome::Continued => {}
                StepOutcome::Halted => return Ok(RunOutcome::Halted),
                StepOutcome::NeedsInput => return Ok(RunOutcome::NeedsInput),
            }
        }
    }

    /// Runs to completion, waiting on the input channel whenever it is empty.
    ///
    /// Returns [`VMError::ChannelClosed`] if the input channel is closed while
    /// the program is waiting on it.
    pub async fn run(&mut self) -> Result<(), VMError> {
        loop {
            match self.run_to_halt()? {
                RunOutcome::Halted => return Ok(()),
                RunOutcome::NeedsInput => {
                    let value = self.input.recv().await?;
                    self.pending_input = Some(value);
                }
            }
        }
    }

    /// Executes the decoded instruction.
    fn exec(&mut self, ctx: &mut ExecutionContext) -> Result<Flow, VMError> {
        exec_vm! {
            vm = self,
            ctx = ctx,
            {
                Add => op_add(a: Read, b: Read, dst: Write),
                Mul => op_mul(a: Read, b: Read, dst: Write),
                In => op_in(dst: Write),
                Out => op_out(a: Read),
                JumpIfTrue => op_jump_if_true(cond: Read, target: Read),
                JumpIfFalse => op_jump_if_false(cond: Read, target: Read),
                LessThan => op_less_than(a: Read, b: Read, dst: Write),
                Equals => op_equals(a: Read, b: Read, dst: Write),
                AdjustRelativeBase => op_adjust_relative_base(a: Read),
                Halt => op_halt(),
            }
        }
    }

    fn overflow(ctx: &ExecutionContext) -> VMError {
        VMError::ArithmeticOverflow {
            instruction: ctx.instruction.mnemonic(),
            ip: ctx.ip,
        }
    }

    fn op_add(
        &mut self,
        ctx: &ExecutionContext,
        a: Value,
        b: Value,
        dst: usize,
    ) -> Result<Flow, VMError> {
        let sum = a.checked_add(b).ok_or_else(|| Self::overflow(ctx))?;
        self.memory.set(dst, sum);
        Ok(Flow::Next)
    }

    fn op_mul(
        &mut self,
        ctx: &ExecutionContext,
        a: Value,
        b: Value,
        dst: usize,
    ) -> Result<Flow, VMError> {
        let product = a.checked_mul(b).ok_or_else(|| Self::overflow(ctx))?;
        self.memory.set(dst, product);
        Ok(Flow::Next)
    }

    fn op_in(&mut self, _ctx: &ExecutionContext, dst: usize) -> Result<Flow, VMError> {
        let value = match self.pending_input.take() {
            Some(value) => value,
            None => match self.input.try_recv() {
                Some(value) => value,
                None => return Ok(Flow::Suspend),
            },
        };
        self.memory.set(dst, value);
        Ok(Flow::Next)
    }

    fn op_out(&mut self, _ctx: &ExecutionContext, a: Value) -> Result<Flow, VMError> {
        self.output.send(a);
        self.last_output = Some(a);
        Ok(Flow::Next)
    }

    fn jump_target(ctx: &ExecutionContext, target: Value) -> Result<Flow, VMError> {
        Ok(Flow::Jump(Memory::address(target, ctx.ip)?))
    }

    fn op_jump_if_true(
        &mut self,
        ctx: &ExecutionContext,
        cond: Value,
        target: Value,
    ) -> Result<Flow, VMError> {
        if cond != 0 {
            Self::jump_target(ctx, target)
        } else {
            Ok(Flow::Next)
        }
    }

    fn op_jump_if_false(
        &mut self,
        ctx: &ExecutionContext,
        cond: Value,
        target: Value,
    ) -> Result<Flow, VMError> {
        if cond == 0 {
            Self::jump_target(ctx, target)
        } else {
            Ok(Flow::Next)
        }
    }

    fn op_less_than(
        &mut self,
        _ctx: &ExecutionContext,
        a: Value,
        b: Value,
        dst: usize,
    ) -> Result<Flow, VMError> {
        self.memory.set(dst, Value::from(a < b));
        Ok(Flow::Next)
    }

    fn op_equals(
        &mut self,
        _ctx: &ExecutionContext,
        a: Value,
        b: Value,
        dst: usize,
    ) -> Result<Flow, VMError> {
        self.memory.set(dst, Value::from(a == b));
        Ok(Flow::Next)
    }

    fn op_adjust_relative_base(
        &mut self,
        ctx: &ExecutionContext,
        a: Value,
    ) -> Result<Flow, VMError> {
        self.relative_base = self
            .relative_base
            .checked_add(a)
            .ok_or_else(|| Self::overflow(ctx))?;
        Ok(Flow::Next)
    }

    fn op_halt(&mut self, _ctx: &ExecutionContext) -> Result<Flow, VMError> {
        Ok(Flow::Halt)
    }
}
