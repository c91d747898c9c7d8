use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pkgmap::cache::CacheStore;
use pkgmap::mapping::{MappingTable, MappingTableGenerator};
use pkgmap::names::NameMappings;
use pkgmap::overrides::Overrides;
use pkgmap::platform::EcosystemKey;
use pkgmap::record::{HomebrewMetadata, PackageRecord};
use pkgmap::repology::{RepologyEntry, parse_project};
use pkgmap::scheduler::order_by_staleness;
use tempfile::TempDir;

fn sample_record(i: usize) -> PackageRecord {
    let name = format!("tool{}", i);
    let mut record = PackageRecord::empty();
    let keys = [
        EcosystemKey::ArchOfficial,
        EcosystemKey::Debian,
        EcosystemKey::Fedora,
        EcosystemKey::Homebrew,
    ];
    for key in keys.iter().take(1 + i % keys.len()) {
        record.set_available(*key, true);
        record.offer_name(*key, &name);
    }
    if record.is_available(EcosystemKey::Homebrew) {
        record.homebrew_metadata = Some(HomebrewMetadata::formula());
    }
    record.description = Some(format!("Description of {}", name));
    record
}

/// A cache of `n` packages, every fifth one negative.
fn sample_store(dir: &TempDir, n: usize) -> (CacheStore, Vec<String>) {
    let path = dir.path().join("cache.json");
    let mut file = serde_json::Map::new();
    let mut names = Vec::with_capacity(n);
    for i in 0..n {
        let name = format!("tool{}", i);
        let record = if i % 5 == 0 {
            PackageRecord::not_found()
        } else {
            sample_record(i)
        };
        let mut entry = serde_json::to_value(&record).unwrap();
        entry["_timestamp"] = serde_json::json!(1_700_000_000.0 + i as f64);
        file.insert(name.clone(), entry);
        names.push(name);
    }
    std::fs::write(&path, serde_json::Value::Object(file).to_string()).unwrap();
    (CacheStore::load(path).unwrap(), names)
}

fn bench_parse_project(c: &mut Criterion) {
    let entries: Vec<RepologyEntry> = [
        "arch", "aur", "debian_12", "debian_13", "ubuntu_24_04", "fedora_40", "fedora_41",
        "homebrew", "flathub", "nix_unstable", "alpine_edge", "gentoo",
    ]
    .iter()
    .map(|repo| RepologyEntry {
        repo: repo.to_string(),
        binname: Some("ripgrep".to_string()),
        summary: Some("Search tool".to_string()),
        ..Default::default()
    })
    .collect();

    c.bench_function("parse_project", |b| {
        b.iter(|| parse_project(black_box(&entries)))
    });
}

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate_table");
    let names_map = NameMappings::default();
    let overrides = Overrides::default();

    for size in [100, 1000] {
        let dir = TempDir::new().unwrap();
        let (store, names) = sample_store(&dir, size);
        let generator = MappingTableGenerator::new(&store, &names_map, &overrides);

        group.bench_with_input(BenchmarkId::new("render", size), &names, |b, names| {
            b.iter(|| generator.render(black_box(names)))
        });
    }

    group.finish();
}

fn bench_parse_table(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let (store, names) = sample_store(&dir, 1000);
    let names_map = NameMappings::default();
    let overrides = Overrides::default();
    let text = MappingTableGenerator::new(&store, &names_map, &overrides).render(&names);

    c.bench_function("parse_table 1000", |b| {
        b.iter(|| MappingTable::parse(black_box(&text)).unwrap())
    });
}

fn bench_staleness_order(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let (store, mut names) = sample_store(&dir, 1000);
    names.extend((0..200).map(|i| format!("uncached{}", i)));
    let names_map = NameMappings::default();

    c.bench_function("order_by_staleness 1200", |b| {
        b.iter(|| order_by_staleness(black_box(&names), &store, &names_map, 1_800_000_000.0))
    });
}

criterion_group!(
    benches,
    bench_parse_project,
    bench_generate,
    bench_parse_table,
    bench_staleness_order
);
criterion_main!(benches);
