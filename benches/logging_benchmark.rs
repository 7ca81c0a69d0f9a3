// Performance benchmarks for logmill

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use logmill::prelude::*;
use std::sync::Arc;
use tempfile::TempDir;

fn noop_handler(level: Level) -> HandlerConfig {
    HandlerConfig {
        sink: SinkTarget::Callable(Arc::new(|text: &str| {
            black_box(text);
            Ok(())
        })),
        level: level.into(),
        format: Some("{level} | {message}".to_string()),
        ..Default::default()
    }
}

fn bench_suppressed_emission(c: &mut Criterion) {
    let logger = Logger::new();
    logger.add(noop_handler(Level::Warning)).unwrap();

    // The fast path: admission fails before any allocation.
    c.bench_function("suppressed_debug", |b| {
        b.iter(|| logger.debug(black_box("below threshold")));
    });
}

fn bench_admitted_emission(c: &mut Criterion) {
    let logger = Logger::new();
    logger.add(noop_handler(Level::Trace)).unwrap();

    c.bench_function("admitted_info", |b| {
        b.iter(|| logger.info(black_box("through the pipeline")));
    });
}

fn bench_render(c: &mut Criterion) {
    let template = Template::compile("{time} | {level:<8} | {name}:{function}:{line} - {message}");
    let record = LogRecord::new(Level::Info, "render target").with_caller(Caller {
        name: Some("app.core".to_string()),
        function: Some("tick".to_string()),
        line: Some(120),
        file: Some("core.rs".to_string()),
    });

    c.bench_function("template_render", |b| {
        b.iter(|| black_box(template.render(&record)));
    });
}

fn bench_file_sync_vs_enqueued(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_write");

    for enqueue in [false, true] {
        let dir = TempDir::new().unwrap();
        let logger = Logger::new();
        logger
            .add(HandlerConfig {
                sink: SinkTarget::Path(dir.path().join("bench.log")),
                format: Some("{message}".to_string()),
                enqueue,
                queue_capacity: 65536,
                ..Default::default()
            })
            .unwrap();

        let label = if enqueue { "enqueued" } else { "sync" };
        group.bench_with_input(BenchmarkId::from_parameter(label), &enqueue, |b, _| {
            b.iter(|| logger.info(black_box("file benchmark message")));
        });
        logger.complete();
    }

    group.finish();
}

fn bench_concurrent_producers(c: &mut Criterion) {
    let logger = Arc::new(Logger::new());
    logger.add(noop_handler(Level::Trace)).unwrap();

    c.bench_function("concurrent_4_threads", |b| {
        b.iter(|| {
            std::thread::scope(|scope| {
                for t in 0..4 {
                    let logger = Arc::clone(&logger);
                    scope.spawn(move || {
                        for i in 0..25 {
                            logger.info(format!("t{} m{}", t, i));
                        }
                    });
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_suppressed_emission,
    bench_admitted_emission,
    bench_render,
    bench_file_sync_vs_enqueued,
    bench_concurrent_producers
);

criterion_main!(benches);
