//! Scanner and token engine benchmarks using Criterion

use bustle_core::{detect_tokens, process_code, substitute_tokens, TypeStripper};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::collections::BTreeMap;

const CLASSES: [&str; 3] = ["Player", "Inventory", "Weapon"];

fn generate_content(size: usize) -> String {
    let template = "var p: Player = Player.new() # Player\nfunc use(w: Weapon) -> Inventory:\n\treturn \"Inventory\"\n";
    template.repeat(size / template.len() + 1)[..size].to_string()
}

fn scanner_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("scanner");

    for size in [1024, 64 * 1024] {
        let text = generate_content(size);
        group.throughput(Throughput::Bytes(text.len() as u64));

        group.bench_function(format!("process_code_{}b", size), |b| {
            b.iter(|| black_box(process_code(&text, |segment, _| segment.to_string())))
        });

        group.bench_function(format!("detect_tokens_{}b", size), |b| {
            b.iter(|| black_box(detect_tokens(&text, CLASSES)))
        });

        let replacements: BTreeMap<String, String> =
            CLASSES.iter().map(|c| (c.to_string(), format!("{}QXRT", c))).collect();
        group.bench_function(format!("substitute_tokens_{}b", size), |b| {
            b.iter(|| black_box(substitute_tokens(&text, &replacements)))
        });

        let stripper = TypeStripper::new(CLASSES);
        group.bench_function(format!("strip_types_{}b", size), |b| {
            b.iter(|| black_box(stripper.strip_types(&text)))
        });
    }

    group.finish();
}

criterion_group!(benches, scanner_benchmarks);
criterion_main!(benches);
