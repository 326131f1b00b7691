//! Whole-mod pipeline benchmarks

use crate::benchmarks::generate_mod;
use crate::{run_benchmark, BenchmarkResult};
use bustle_core::{strip_mod, strip_units, StripConfig};
use std::fs;
use tempfile::TempDir;

const CATEGORY: &str = "Pipeline";
const ITERATIONS: u32 = 20;

pub fn run_all() -> Vec<BenchmarkResult> {
    vec![
        bench_strip_units(10),
        bench_strip_units(100),
        bench_strip_mod_on_disk(),
        bench_strip_mod_dry_run(),
    ]
}

fn bench_strip_units(count: usize) -> BenchmarkResult {
    let units = generate_mod(count, 4 * 1024);
    let config = StripConfig::new("BenchMod");
    run_benchmark(&format!("Strip in memory ({} x 4KB)", count), CATEGORY, ITERATIONS, || {
        std::hint::black_box(strip_units(&config, units.clone()));
    })
}

fn write_mod_to(dir: &std::path::Path, count: usize) {
    for (path, text) in generate_mod(count, 4 * 1024) {
        let dest = dir.join(path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(dest, text).unwrap();
    }
}

fn bench_strip_mod_on_disk() -> BenchmarkResult {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("src");
    write_mod_to(&src, 50);
    let config = StripConfig::new("BenchMod");

    run_benchmark("Strip mod to disk (50 files)", CATEGORY, ITERATIONS, || {
        let dest = temp_dir.path().join(format!("dist_{}", rand::random::<u32>()));
        std::hint::black_box(strip_mod(&config, &src, &dest).unwrap());
    })
}

fn bench_strip_mod_dry_run() -> BenchmarkResult {
    let temp_dir = TempDir::new().unwrap();
    let src = temp_dir.path().join("src");
    write_mod_to(&src, 50);
    let mut config = StripConfig::new("BenchMod");
    config.dry_run = true;
    let dest = temp_dir.path().join("dist");

    run_benchmark("Strip mod dry run (50 files)", CATEGORY, ITERATIONS, || {
        std::hint::black_box(strip_mod(&config, &src, &dest).unwrap());
    })
}
