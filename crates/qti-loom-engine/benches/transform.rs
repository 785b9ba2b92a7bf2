use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use qti_loom_engine::{ItemScoring, ProcessingMode, parse, serialize};
use qti_loom_engine::processing::CandidateResponses;
mod common;

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    group.sample_size(20);

    for size in [1, 10, 50] {
        let item = common::generate_item(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &item, |b, item| {
            b.iter(|| std::hint::black_box(parse(std::hint::black_box(item))));
        });
    }

    group.finish();
}

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");
    group.sample_size(20);

    for size in [1, 10, 50] {
        let item = common::generate_item(size);
        let doc = parse(&item).document;
        let summed = doc.with_processing_mode(ProcessingMode::SumScores);

        group.bench_with_input(BenchmarkId::new("body_only", size), &doc, |b, doc| {
            b.iter(|| std::hint::black_box(serialize(doc, None)));
        });
        group.bench_with_input(BenchmarkId::new("patch_all_correct", size), &doc, |b, doc| {
            b.iter(|| std::hint::black_box(serialize(doc, Some(&item))));
        });
        group.bench_with_input(BenchmarkId::new("patch_sum_scores", size), &summed, |b, doc| {
            b.iter(|| std::hint::black_box(serialize(doc, Some(&item))));
        });
    }

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let item = common::generate_item(10);
    let markup = serialize(&parse(&item).document, Some(&item)).markup;
    let Ok(scoring) = ItemScoring::from_markup(&markup) else {
        panic!("generated item should be readable");
    };
    let mut candidate = CandidateResponses::new();
    for i in 0..10 {
        candidate.set(format!("R{i}"), [format!("answer {i}")]);
    }

    c.bench_function("evaluate_all_correct_10", |b| {
        b.iter(|| std::hint::black_box(scoring.evaluate(&candidate)));
    });
}

criterion_group!(benches, bench_parse, bench_serialize, bench_evaluate);
criterion_main!(benches);
