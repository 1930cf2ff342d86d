//! Criterion benchmarks for the scan path
//!
//! Benchmarks the work done on every throttled scroll:
//! - Visibility: ancestor clip walk at different nesting depths
//! - Scan: a pass over many pending off-screen candidates
//! - Scenario: parsing and replaying a scenario file

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use progressive::geometry::Rect;
use progressive::scenario::Scenario;
use progressive::sim::{FetchScript, MemoryPage, NodeId, NodeSpec, Trace, VirtualRuntime};
use progressive::{in_view, Loader, MarkupConfig, Options};

// =============================================================================
// Test Data Generators
// =============================================================================

/// A page with `count` images stacked below the fold.
fn make_long_page(count: usize) -> MemoryPage {
    let markup = MarkupConfig::default();
    let mut page = MemoryPage::new(1280.0, 720.0);
    for i in 0..count {
        let rect = Rect::new(0.0, 1000.0 + i as f64 * 300.0, 400.0, 280.0);
        let url = format!("/img/{}.jpg", i);
        page.append(page.body(), NodeSpec::image(&markup, rect, &url, Some("/img/sm.jpg")));
    }
    page
}

/// An image nested `depth` scroll containers deep.
fn make_nested_page(depth: usize) -> (MemoryPage, NodeId) {
    let mut page = MemoryPage::new(1280.0, 720.0);
    let mut parent = page.body();
    for _ in 0..depth {
        parent = page.append(parent, NodeSpec::container(Rect::new(0.0, 0.0, 1280.0, 700.0)));
    }
    let image = NodeSpec::image(&MarkupConfig::default(), Rect::new(0.0, 100.0, 10.0, 10.0), "/a.jpg", None);
    let el = page.append(parent, image);
    (page, el)
}

fn make_scenario(count: usize) -> String {
    let page: Vec<String> = (0..count)
        .map(|i| {
            format!(
                r#"{{ name: "img{i}", kind: "image", rect: [0, {y}, 300, 200], full: "/img/{i}.jpg" }}"#,
                i = i,
                y = i * 250
            )
        })
        .collect();
    let steps: Vec<String> = (0..count / 4)
        .map(|i| format!(r#"{{ do: "scroll", y: {} }}, {{ do: "wait", ms: 400 }}"#, i * 1000))
        .collect();
    format!(
        "{{ viewport: {{ width: 1280, height: 720 }}, page: [{}], steps: [{}, {{ do: \"settle\" }}] }}",
        page.join(",\n"),
        steps.join(",\n")
    )
}

// =============================================================================
// Visibility Benchmarks
// =============================================================================

fn bench_visibility(c: &mut Criterion) {
    let mut group = c.benchmark_group("visibility");

    for depth in [0, 4, 16, 64].iter() {
        let (page, el) = make_nested_page(*depth);
        group.bench_with_input(BenchmarkId::new("in_view_depth", depth), &(page, el), |b, (page, el)| {
            b.iter(|| in_view(black_box(page), black_box(el)))
        });
    }

    group.finish();
}

// =============================================================================
// Scan Benchmarks
// =============================================================================

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");

    for count in [10, 100, 1000].iter() {
        let runtime = VirtualRuntime::new(FetchScript::default(), Trace::new());
        let mut loader = Loader::new(make_long_page(*count), runtime, Options::default());
        loader.activate();

        group.throughput(Throughput::Elements(*count as u64));
        group.bench_function(BenchmarkId::new("offscreen_pending", count), |b| {
            b.iter(|| {
                loader.scan();
                black_box(loader.pending_full())
            })
        });
    }

    group.finish();
}

// =============================================================================
// Scenario Benchmarks
// =============================================================================

fn bench_scenario(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenario");

    for count in [20, 200].iter() {
        let source = make_scenario(*count);

        group.bench_with_input(BenchmarkId::new("parse", count), &source, |b, source| {
            b.iter(|| Scenario::parse(black_box(source)))
        });

        let scenario = Scenario::parse(&source).expect("generated scenario parses");
        group.bench_with_input(BenchmarkId::new("run", count), &scenario, |b, scenario| {
            b.iter(|| scenario.run(Options::default()))
        });
    }

    group.finish();
}

// =============================================================================
// Criterion Configuration
// =============================================================================

criterion_group!(benches, bench_visibility, bench_scan, bench_scenario);

criterion_main!(benches);
