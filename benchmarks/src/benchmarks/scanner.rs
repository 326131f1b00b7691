//! Scanner and token engine benchmarks

use crate::benchmarks::generate_script;
use crate::{run_benchmark, run_benchmark_with_throughput, BenchmarkResult};
use bustle_core::{detect_tokens, process_code, substitute_tokens, CodeSpans, TypeStripper};
use std::collections::BTreeMap;

const CATEGORY: &str = "Scanner";
const ITERATIONS: u32 = 100;
const CLASSES: [&str; 4] = ["Player", "Inventory", "Weapon", "Enemy"];

pub fn run_all() -> Vec<BenchmarkResult> {
    vec![
        bench_scan_identity(),
        bench_code_spans(),
        bench_detect_tokens(),
        bench_substitute_tokens(),
        bench_strip_types(),
    ]
}

fn bench_scan_identity() -> BenchmarkResult {
    let text = generate_script("Main", &CLASSES, 16 * 1024);
    run_benchmark_with_throughput("Scan code segments (16KB)", CATEGORY, ITERATIONS, text.len() as u64, || {
        std::hint::black_box(process_code(&text, |segment, _| segment.to_string()));
    })
}

fn bench_code_spans() -> BenchmarkResult {
    let text = generate_script("Main", &CLASSES, 16 * 1024);
    run_benchmark("Code spans (16KB)", CATEGORY, ITERATIONS, || {
        std::hint::black_box(CodeSpans::of(&text));
    })
}

fn bench_detect_tokens() -> BenchmarkResult {
    let text = generate_script("Main", &CLASSES, 16 * 1024);
    run_benchmark_with_throughput("Detect tokens (16KB, 4 classes)", CATEGORY, ITERATIONS, text.len() as u64, || {
        std::hint::black_box(detect_tokens(&text, CLASSES));
    })
}

fn bench_substitute_tokens() -> BenchmarkResult {
    let text = generate_script("Main", &CLASSES, 16 * 1024);
    let replacements: BTreeMap<String, String> = CLASSES
        .iter()
        .map(|c| (c.to_string(), format!("{}ABCD", c)))
        .collect();
    run_benchmark_with_throughput("Substitute tokens (16KB, 4 classes)", CATEGORY, ITERATIONS, text.len() as u64, || {
        std::hint::black_box(substitute_tokens(&text, &replacements));
    })
}

fn bench_strip_types() -> BenchmarkResult {
    let text = generate_script("Main", &CLASSES, 16 * 1024);
    let stripper = TypeStripper::new(CLASSES);
    run_benchmark_with_throughput("Strip type hints (16KB)", CATEGORY, ITERATIONS, text.len() as u64, || {
        std::hint::black_box(stripper.strip_types(&text));
    })
}
