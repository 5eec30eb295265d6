use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use seitenwerk::document::DigitalDocument;
use seitenwerk::images::{DefaultPagination, ImageSettings, ImageSorting, ImagesHelper, DEFAULT_IMAGE_PREFIX};
use seitenwerk::paginator::{PaginationMode, PaginationScope, PaginationType, Paginator};
use seitenwerk::process::ProcessLayout;
use seitenwerk::ruleset::Ruleset;
use std::fs;
use std::hint::black_box;
use tempfile::TempDir;

const RULESET: &str = r#"<Preferences>
  <MetadataType><Name>TitleDocMain</Name></MetadataType>
  <DocStrctType topStruct="true"><Name>Monograph</Name><metadata num="1o">TitleDocMain</metadata></DocStrctType>
</Preferences>"#;

fn benchmark_pagination_modes(c: &mut Criterion) {
    let mut group = c.benchmark_group("paginate_1000_pages");
    let modes = [
        ("pages", PaginationMode::Pages),
        ("columns", PaginationMode::Columns),
        ("foliation", PaginationMode::Foliation),
        ("rectoverso_foliation", PaginationMode::RectoversoFoliation),
        ("double_pages", PaginationMode::DoublePages),
    ];
    for (name, mode) in modes {
        for (kind, start) in [(PaginationType::Arabic, "1"), (PaginationType::Roman, "I")] {
            group.bench_with_input(BenchmarkId::new(name, format!("{:?}", kind)), &mode, |b, &mode| {
                b.iter(|| {
                    let mut labels = vec![String::new(); 1000];
                    Paginator::new(kind, start)
                        .mode(mode)
                        .scope(PaginationScope::FromFirst)
                        .selected(vec![0])
                        .run(&mut labels)
                        .unwrap();
                    black_box(labels)
                });
            });
        }
    }
    group.finish();
}

fn benchmark_reconciliation(c: &mut Criterion) {
    let ruleset = Ruleset::parse(RULESET).unwrap();
    let settings = ImageSettings::new(
        &["*.tif".to_string()],
        DEFAULT_IMAGE_PREFIX,
        ImageSorting::Number,
        DefaultPagination::Uncounted,
    )
    .unwrap();

    let mut group = c.benchmark_group("reconcile");
    for count in [100usize, 1000] {
        let dir = TempDir::new().unwrap();
        let layout = ProcessLayout::new(dir.path(), 1, "bench");
        fs::create_dir_all(layout.tif_dir()).unwrap();
        for i in 1..=count {
            fs::write(layout.tif_dir().join(format!("{:08}.tif", i)), b"").unwrap();
        }

        group.bench_with_input(BenchmarkId::new("initial", count), &count, |b, _| {
            b.iter(|| {
                let mut doc = DigitalDocument::with_logical_root("Monograph");
                let report = ImagesHelper::new(&settings, &ruleset).create_pagination(&mut doc, &layout, None).unwrap();
                black_box(report)
            });
        });

        let mut reconciled = DigitalDocument::with_logical_root("Monograph");
        ImagesHelper::new(&settings, &ruleset).create_pagination(&mut reconciled, &layout, None).unwrap();
        group.bench_with_input(BenchmarkId::new("noop", count), &count, |b, _| {
            b.iter(|| {
                let mut doc = reconciled.clone();
                let report = ImagesHelper::new(&settings, &ruleset).create_pagination(&mut doc, &layout, None).unwrap();
                black_box(report)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_pagination_modes, benchmark_reconciliation);
criterion_main!(benches);
