use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::fs;
use tempfile::tempdir;
use yard_fs::tree::{self, ScanOptions};
use yard_fs::{Fingerprint, FingerprintMode, NormalizedPath, TreeEntry, io};

fn populate(root: &std::path::Path, dirs: usize, files_per_dir: usize) {
    for d in 0..dirs {
        let dir = root.join(format!("dir{d}"));
        fs::create_dir_all(&dir).unwrap();
        for f in 0..files_per_dir {
            fs::write(dir.join(format!("file{f}.txt")), format!("{d}:{f}")).unwrap();
        }
    }
}

fn scan_benchmark(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    populate(dir.path(), 20, 50);

    c.bench_function("scan_structural_1000_files", |b| {
        let options = ScanOptions::default();
        b.iter(|| tree::scan(black_box(dir.path()), &options).unwrap())
    });

    c.bench_function("scan_hashed_1000_files", |b| {
        let options = ScanOptions {
            hash_contents: true,
            ..ScanOptions::default()
        };
        b.iter(|| tree::scan(black_box(dir.path()), &options).unwrap())
    });
}

fn fingerprint_benchmark(c: &mut Criterion) {
    let entries: Vec<TreeEntry> = (0..10_000)
        .map(|i| TreeEntry {
            path: NormalizedPath::new(format!("d{}/f{}.bin", i % 97, i)),
            size: i as u64,
            modified: 1_700_000_000 + i as i64,
            hash: None,
        })
        .collect();

    c.bench_function("fingerprint_10000_entries", |b| {
        b.iter(|| Fingerprint::compute(black_box(&entries), FingerprintMode::Structural))
    });
}

fn write_atomic_benchmark(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let path = NormalizedPath::new(dir.path().join("repometa.toml"));
    let content = "name = \"bench\"\ngroups = [\"a\", \"b\"]\n";

    c.bench_function("write_atomic_record", |b| {
        b.iter(|| io::write_text(black_box(&path), black_box(content)).unwrap())
    });
}

criterion_group!(
    benches,
    scan_benchmark,
    fingerprint_benchmark,
    write_atomic_benchmark
);
criterion_main!(benches);
