use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use label_placer::config::PlacementConfig;
use label_placer::geometry::{BoundingBox, Geometry, Point, Polygon};
use label_placer::layout::text::{TextFormat, measure_block};
use label_placer::render::render_svg;
use label_placer::scene::{Feature, Scene, SymbolizerKind};
use label_placer::style::{PropertyKey, StyleMap};
use label_placer::symbolizer::text_placements;
use label_placer::transform::ViewTransform;
use label_placer::{LabelCollisionDetector, PlacementParams};
use std::hint::black_box;

const CANVAS: f64 = 1024.0;

/// Deterministic pseudo-random points so runs are comparable.
fn scatter(count: usize) -> Vec<Point> {
    let mut state = 0x2545_f491_4f6c_dd1du64;
    (0..count)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let x = (state & 0xffff) as f64 / 65535.0 * CANVAS;
            let y = ((state >> 16) & 0xffff) as f64 / 65535.0 * CANVAS;
            Point::new(x, y)
        })
        .collect()
}

fn dense_scene(points: usize, lines: usize, areas: usize) -> Scene {
    let mut features = Vec::new();
    for (idx, p) in scatter(points).into_iter().enumerate() {
        features.push(Feature {
            id: None,
            geometry: Geometry::Point(p),
            symbolizer: SymbolizerKind::Text,
            style: StyleMap::new().with(PropertyKey::Margin, 2.0),
            text: Some(format!("Place {idx}")),
            alternatives: vec![StyleMap::new().with(PropertyKey::Dy, 12.0)],
            boxes: Vec::new(),
        });
    }
    for i in 0..lines {
        let y = (i as f64 + 0.5) * CANVAS / lines.max(1) as f64;
        features.push(Feature {
            id: None,
            geometry: Geometry::LineString(vec![
                Point::new(0.0, y),
                Point::new(CANVAS / 2.0, y + 40.0),
                Point::new(CANVAS, y),
            ]),
            symbolizer: SymbolizerKind::Text,
            style: StyleMap::new()
                .with(PropertyKey::LabelPlacement, "line")
                .with(PropertyKey::Spacing, 150.0)
                .with(PropertyKey::LabelPositionTolerance, 40.0),
            text: Some(format!("Road {i}")),
            alternatives: Vec::new(),
            boxes: Vec::new(),
        });
    }
    for (i, c) in scatter(areas).into_iter().enumerate() {
        features.push(Feature {
            id: None,
            geometry: Geometry::Polygon(Polygon::new(vec![
                Point::new(c.x - 60.0, c.y - 40.0),
                Point::new(c.x + 60.0, c.y - 40.0),
                Point::new(c.x + 60.0, c.y + 40.0),
                Point::new(c.x - 60.0, c.y + 40.0),
            ])),
            symbolizer: SymbolizerKind::Text,
            style: StyleMap::new()
                .with(PropertyKey::LabelPlacement, "alternating-grid")
                .with(PropertyKey::GridCellWidth, 10.0)
                .with(PropertyKey::GridCellHeight, 10.0),
            text: Some(format!("Park {i}")),
            alternatives: Vec::new(),
            boxes: Vec::new(),
        });
    }
    Scene {
        width: Some(CANVAS),
        height: Some(CANVAS),
        features,
        ..Scene::default()
    }
}

fn fast_config() -> PlacementConfig {
    PlacementConfig {
        fast_text_metrics: true,
        ..PlacementConfig::default()
    }
}

fn bench_point_labels(c: &mut Criterion) {
    let mut group = c.benchmark_group("point_labels");
    let view = ViewTransform::pixel(CANVAS, CANVAS);
    let style = StyleMap::new();
    let format = TextFormat::default().with_fast_metrics(true);
    let label = [measure_block("Label", &format, 1.0)];
    for count in [100usize, 1_000, 5_000] {
        let points: Vec<Geometry> = scatter(count).into_iter().map(Geometry::Point).collect();
        group.bench_with_input(BenchmarkId::from_parameter(count), &points, |b, points| {
            b.iter(|| {
                let params = PlacementParams::new(&view, &style);
                let mut detector =
                    LabelCollisionDetector::new(BoundingBox::new(0.0, 0.0, CANVAS, CANVAS));
                let mut placed = 0usize;
                for geometry in points {
                    placed += text_placements(&params, &mut detector, geometry, &label).len();
                }
                black_box(placed);
            });
        });
    }
    group.finish();
}

fn bench_scene(c: &mut Criterion) {
    let mut group = c.benchmark_group("scene");
    let config = fast_config();
    for (name, scene) in [
        ("small", dense_scene(100, 10, 10)),
        ("medium", dense_scene(1_000, 40, 50)),
        ("large", dense_scene(4_000, 100, 200)),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), &scene, |b, scene| {
            b.iter(|| {
                let report = scene.place(black_box(&config));
                black_box(report.placed());
            });
        });
    }
    group.finish();
}

fn bench_end_to_end(c: &mut Criterion) {
    let scene = dense_scene(1_000, 40, 50);
    let config = fast_config();
    c.bench_function("end_to_end_svg", |b| {
        b.iter(|| {
            let report = scene.place(&config);
            let svg = render_svg(&report);
            black_box(svg.len());
        });
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_point_labels, bench_scene, bench_end_to_end
);
criterion_main!(benches);
