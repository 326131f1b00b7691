//! Bustle Benchmark Runner
//!
//! Times the scanner and the stripping pipeline and writes a JSON report to
//! `benchmarks/results/` (or prints it with `--json-only`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

mod benchmarks;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub name: String,
    pub category: String,
    pub iterations: u32,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub std_dev_ms: f64,
    pub throughput: Option<Throughput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Throughput {
    pub value: f64,
    pub unit: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub timestamp: String,
    pub version: String,
    pub os: String,
    pub arch: String,
    pub results: Vec<BenchmarkResult>,
    pub categories: Vec<CategorySummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategorySummary {
    pub name: String,
    pub benchmark_count: usize,
    pub total_time_ms: f64,
}

/// Run `f` once to warm up, then `iterations` timed times
pub fn run_benchmark<F>(name: &str, category: &str, iterations: u32, mut f: F) -> BenchmarkResult
where
    F: FnMut(),
{
    f();
    let samples: Vec<f64> = (0..iterations)
        .map(|_| {
            let start = Instant::now();
            f();
            start.elapsed().as_secs_f64() * 1000.0
        })
        .collect();

    let count = samples.len().max(1) as f64;
    let mean_ms = samples.iter().sum::<f64>() / count;
    let variance = samples.iter().map(|t| (t - mean_ms).powi(2)).sum::<f64>() / count;

    BenchmarkResult {
        name: name.to_string(),
        category: category.to_string(),
        iterations,
        mean_ms,
        min_ms: samples.iter().copied().fold(f64::INFINITY, f64::min),
        max_ms: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        std_dev_ms: variance.sqrt(),
        throughput: None,
    }
}

/// Like [`run_benchmark`], also reporting MB/s over `bytes` per iteration
pub fn run_benchmark_with_throughput<F>(name: &str, category: &str, iterations: u32, bytes: u64, f: F) -> BenchmarkResult
where
    F: FnMut(),
{
    let mut result = run_benchmark(name, category, iterations, f);
    let bytes_per_sec = bytes as f64 * 1000.0 / result.mean_ms;
    result.throughput = Some(Throughput {
        value: bytes_per_sec / (1024.0 * 1024.0),
        unit: "MB/s".to_string(),
    });
    result
}

fn summarize(results: &[BenchmarkResult]) -> Vec<CategorySummary> {
    let mut categories: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for r in results {
        let entry = categories.entry(r.category.as_str()).or_default();
        entry.0 += 1;
        entry.1 += r.mean_ms;
    }
    categories
        .into_iter()
        .map(|(name, (benchmark_count, total_time_ms))| CategorySummary {
            name: name.to_string(),
            benchmark_count,
            total_time_ms,
        })
        .collect()
}

fn print_report(report: &BenchmarkReport) {
    println!("\n======== Bustle Benchmark Report ========");
    println!("Version: {} | {} ({})", report.version, report.os, report.arch);

    let mut category = "";
    for r in &report.results {
        if r.category != category {
            category = &r.category;
            println!("\n--- {} ---", category);
        }
        print!("  {:<40} {:>8.3}ms (±{:.3})", r.name, r.mean_ms, r.std_dev_ms);
        if let Some(tp) = &r.throughput {
            print!(" [{:.2} {}]", tp.value, tp.unit);
        }
        println!();
    }

    println!();
    for c in &report.categories {
        println!("{}: {} benchmarks, {:.3}ms total", c.name, c.benchmark_count, c.total_time_ms);
    }
}

fn main() -> Result<()> {
    let json_only = std::env::args().any(|a| a == "--json-only");

    println!("Running Bustle benchmarks...\n");
    let mut results = Vec::new();

    println!("Scanner benchmarks...");
    results.extend(benchmarks::scanner::run_all());

    println!("Pipeline benchmarks...");
    results.extend(benchmarks::pipeline::run_all());

    let now = chrono::Utc::now();
    let report = BenchmarkReport {
        timestamp: now.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        categories: summarize(&results),
        results,
    };
    let json = serde_json::to_string_pretty(&report)?;

    if json_only {
        println!("{}", json);
        return Ok(());
    }

    print_report(&report);
    let dir = PathBuf::from("benchmarks").join("results");
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(format!("benchmark-{}.json", now.format("%Y%m%d_%H%M%S")));
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("\nResults saved to {}", path.display());
    Ok(())
}
