//! Evaluator benchmarks: the four variants compared across corpus size.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use dsquery::indices::keyword_index::{DocumentFields, InMemoryKeywordIndex};
use dsquery::indices::name_index::HnswNameIndex;
use dsquery::indices::percentile_index::{Histogram, InMemoryPercentileIndex};
use dsquery::indices::EvaluationMode;
use dsquery::{ColId, Config, DocId, HistId, Metadata, QueryEngine};
use std::collections::HashMap;
use std::time::Duration;

fn synthetic_engine(num_docs: u32, config: Config) -> QueryEngine {
    let mut docs = HashMap::new();
    let mut hists = HashMap::new();
    let mut doc_to_cols = Vec::with_capacity(num_docs as usize);
    let mut col_to_doc = Vec::with_capacity(num_docs as usize);

    for i in 0..num_docs {
        let keyword = if i % 3 == 0 { "germany" } else { "france" };
        docs.insert(
            DocId(i),
            DocumentFields(HashMap::from([("description".to_string(), format!("dataset about {keyword} number {i}"))])),
        );
        hists.insert(HistId(i), Histogram::new(0.0, 100.0, vec![(i % 10 + 1) as u64; 10]));
        doc_to_cols.push(vec![ColId(i)]);
        col_to_doc.push(DocId(i));
    }

    let keyword_index = InMemoryKeywordIndex::new(docs);
    let percentile_index = InMemoryPercentileIndex::new(hists);
    let name_index = HnswNameIndex::new(vec![]);
    let metadata = Metadata::from_tables(doc_to_cols, col_to_doc, HashMap::new(), vec![], num_docs).unwrap();

    QueryEngine::new(metadata, config, Box::new(keyword_index), Box::new(percentile_index), Box::new(name_index)).unwrap()
}

fn config_for(threaded: bool, prefiltering: bool) -> Config {
    let mut config = Config::default();
    config.evaluation.enable_threading = threaded;
    config.evaluation.enable_prefiltering = prefiltering;
    config.cache.capacity = 0;
    config
}

const QUERY: &str = "kw('germany') AND col(pp(0.5;ge;20.0))";

fn bench_evaluator_variants(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluator_variants");
    for size in [100u32, 1_000, 10_000] {
        for (threaded, prefiltering) in [(false, false), (false, true), (true, false), (true, true)] {
            let label = format!("{size}/threaded={threaded}/prefiltering={prefiltering}");
            let engine = synthetic_engine(size, config_for(threaded, prefiltering));
            group.bench_with_input(BenchmarkId::from_parameter(label), &size, |b, _| {
                b.iter(|| engine.query(QUERY, EvaluationMode::Exact, false).unwrap());
            });
        }
    }
    group.finish();
}

fn bench_cache_hit(c: &mut Criterion) {
    let mut config = Config::default();
    config.cache.capacity = 16;
    let engine = synthetic_engine(1_000, config);
    engine.query(QUERY, EvaluationMode::Exact, false).unwrap();

    c.bench_function("cached_query", |b| {
        b.iter(|| engine.query(QUERY, EvaluationMode::Exact, false).unwrap());
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1));
    targets = bench_evaluator_variants, bench_cache_hit
}
criterion_main!(benches);
