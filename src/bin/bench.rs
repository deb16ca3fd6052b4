//! VM benchmark binary.
//!
//! Measures execution time for representative Intcode programs and pipelines.
//! Run with: `cargo run --release --bin bench`

use std::time::{Duration, Instant};

use intcode::virtual_machine::memory::Value;
use intcode::virtual_machine::pipeline::Pipeline;
use intcode::virtual_machine::program::ProgramImage;
use intcode::virtual_machine::vm::VM;

// ---------------------------------------------------------------------------
// Benchmark harness
// ---------------------------------------------------------------------------

struct BenchResult {
    name: &'static str,
    iterations: u64,
    total: Duration,
    steps: u64,
}

impl BenchResult {
    fn avg(&self) -> Duration {
        self.total / self.iterations as u32
    }

    fn print(&self) {
        let avg = self.avg();
        let ns_per_op = avg.as_nanos();
        let ns_per_step = if self.steps > 0 {
            format!("{:>8.1}", ns_per_op as f64 / self.steps as f64)
        } else {
            "       -".to_string()
        };
        println!(
            "  {:<30} {:>7} iters {:>10.3} us/iter {:>12} steps  {} ns/step",
            self.name,
            self.iterations,
            ns_per_op as f64 / 1000.0,
            self.steps,
            ns_per_step,
        );
    }
}

/// Runs `f` for at least `min_duration`, returning aggregated results.
///
/// `f` returns the number of instructions it executed, or 0 when unknown.
fn bench<F>(name: &'static str, min_duration: Duration, mut f: F) -> BenchResult
where
    F: FnMut() -> u64,
{
    // Warmup
    for _ in 0..5 {
        f();
    }

    let mut iterations = 0u64;
    let mut last_steps = 0u64;
    let start = Instant::now();
    while start.elapsed() < min_duration {
        last_steps = f();
        iterations += 1;
    }
    let total = start.elapsed();

    BenchResult {
        name,
        iterations,
        total,
        steps: last_steps,
    }
}

/// Runs `image` to completion with `counter` patched in, returns steps executed.
fn run_steps(image: &ProgramImage, counter: Value) -> u64 {
    let mut vm = VM::from_image(image);
    vm.poke(COUNTER_ADDR, counter);
    vm.run_to_halt().expect("run failed");
    vm.steps()
}

// ---------------------------------------------------------------------------
// Benchmark definitions
// ---------------------------------------------------------------------------

const COUNTER_ADDR: usize = 50;

// Decrements mem[50] until zero.
const TIGHT_LOOP: &[Value] = &[1001, 50, -1, 50, 1005, 50, 0, 99];

// Multiply and compare per iteration, then decrement mem[50].
const ARITHMETIC_MIX: &[Value] = &[
    1002, 51, 3, 52, 1007, 52, 1000, 53, 1001, 50, -1, 50, 1005, 50, 0, 99,
];

// Writes through the relative base and reads the value back, advancing the base.
const RELATIVE_WALK: &[Value] = &[
    109, 100, 21101, 7, 0, 0, 2201, 0, 0, 51, 109, 1, 1001, 50, -1, 50, 1005, 50, 2, 99,
];

const QUINE: &[Value] = &[
    109, 1, 204, -1, 1001, 100, 1, 100, 1008, 100, 16, 101, 1006, 101, 0, 99,
];

const FEEDBACK_AMPLIFIER: &[Value] = &[
    3, 52, 1001, 52, -5, 52, 3, 53, 1, 52, 56, 54, 1007, 54, 5, 55, 1005, 55, 26, 1001, 54,
    -5, 54, 1105, 1, 12, 1, 53, 54, 53, 1008, 54, 0, 55, 1001, 55, 1, 55, 2, 53, 55, 53, 4, 53,
    1001, 56, -1, 56, 1005, 56, 6, 99, 0, 0, 0, 0, 10,
];
const FEEDBACK_PHASES: [Value; 5] = [9, 7, 8, 5, 6];

fn feedback_pipeline(image: &ProgramImage) -> Pipeline {
    let pipeline = Pipeline::cycle(image, FEEDBACK_PHASES.len());
    for (index, phase) in FEEDBACK_PHASES.iter().enumerate() {
        pipeline.seed(index, [*phase]).expect("seed");
    }
    pipeline.seed(0, [0]).expect("seed");
    pipeline
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    let min = Duration::from_secs(2);

    println!("VM Benchmarks (each runs for >= 2s)\n");
    println!(
        "  {:<30} {:>7}       {:>14} {:>12}  {:>10}",
        "benchmark", "iters", "avg time", "steps/run", "ns/step"
    );
    println!("  {}", "-".repeat(84));

    // Images are built once (parsing cost excluded from benchmark)
    let tight = ProgramImage::from(TIGHT_LOOP);
    let arith = ProgramImage::from(ARITHMETIC_MIX);
    let relative = ProgramImage::from(RELATIVE_WALK);
    let quine = ProgramImage::from(QUINE);
    let amplifier = ProgramImage::from(FEEDBACK_AMPLIFIER);

    // 1. Tight loop
    for &n in &[1_000 as Value, 100_000] {
        let name: &'static str = match n {
            1_000 => "tight_loop(1K)",
            100_000 => "tight_loop(100K)",
            _ => unreachable!(),
        };
        bench(name, min, || run_steps(&tight, n)).print();
    }

    // 2. Arithmetic mix (10K iterations)
    bench("arithmetic_mix(10K)", min, || run_steps(&arith, 10_000)).print();

    // 3. Relative-mode writes over fresh cells (10K iterations)
    bench("relative_walk(10K)", min, || run_steps(&relative, 10_000)).print();

    // 4. Quine, output heavy
    bench("quine", min, || {
        let mut vm = VM::from_image(&quine);
        vm.run_to_halt().expect("run failed");
        vm.output().drain();
        vm.steps()
    })
    .print();

    // 5. Snapshot rewind instead of reparsing
    let mut rewind_vm = VM::from_image(&tight);
    let snapshot = rewind_vm.dump_memory();
    bench("snapshot_rewind(1K)", min, || {
        rewind_vm.load_memory(&snapshot);
        rewind_vm.poke(COUNTER_ADDR, 1_000);
        rewind_vm.run_to_halt().expect("run failed");
        rewind_vm.steps()
    })
    .print();

    // 6. Feedback pipeline, cooperative
    bench("feedback_cooperative(5)", min, || {
        feedback_pipeline(&amplifier)
            .run_cooperative()
            .expect("pipeline failed");
        0
    })
    .print();

    // 7. Feedback pipeline, one task per member
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("runtime");
    bench("feedback_concurrent(5)", min, || {
        runtime
            .block_on(feedback_pipeline(&amplifier).run_concurrent())
            .expect("pipeline failed");
        0
    })
    .print();

    println!();
}
