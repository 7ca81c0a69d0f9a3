// Advanced integration tests for logmill: enqueued sinks, compression,
// custom levels, and configuration files.

use logmill::prelude::*;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

#[test]
fn test_enqueued_happy_path_no_drops() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("enqueued.log");

    let logger = Logger::new();
    logger
        .add(HandlerConfig {
            sink: SinkTarget::Path(path.clone()),
            format: Some("{message}".to_string()),
            enqueue: true,
            queue_capacity: 1024,
            ..Default::default()
        })
        .unwrap();

    const THREADS: usize = 4;
    const PER_THREAD: usize = 2500;
    std::thread::scope(|scope| {
        for t in 0..THREADS {
            let logger = &logger;
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    logger.info(format!("t{}-m{}", t, i));
                }
            });
        }
    });
    logger.complete();

    let contents = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), THREADS * PER_THREAD);

    let unique: HashSet<&str> = lines.iter().copied().collect();
    assert_eq!(unique.len(), THREADS * PER_THREAD, "no duplicates");
    for t in 0..THREADS {
        for i in 0..PER_THREAD {
            assert!(unique.contains(format!("t{}-m{}", t, i).as_str()));
        }
    }
    assert_eq!(logger.dropped(), 0);
}

#[test]
fn test_enqueued_preserves_per_producer_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fifo.log");

    let logger = Logger::new();
    logger
        .add(HandlerConfig {
            sink: SinkTarget::Path(path.clone()),
            format: Some("{message}".to_string()),
            enqueue: true,
            ..Default::default()
        })
        .unwrap();

    for i in 0..500 {
        logger.info(format!("seq-{}", i));
    }
    logger.complete();

    let contents = fs::read_to_string(&path).unwrap();
    let expected: Vec<String> = (0..500).map(|i| format!("seq-{}", i)).collect();
    let actual: Vec<&str> = contents.lines().collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_enqueued_matches_sync_output() {
    let dir = TempDir::new().unwrap();
    let sync_path = dir.path().join("sync.log");
    let queued_path = dir.path().join("queued.log");

    let logger = Logger::new();
    logger
        .add(HandlerConfig {
            sink: SinkTarget::Path(sync_path.clone()),
            format: Some("{message}".to_string()),
            ..Default::default()
        })
        .unwrap();
    logger
        .add(HandlerConfig {
            sink: SinkTarget::Path(queued_path.clone()),
            format: Some("{message}".to_string()),
            enqueue: true,
            ..Default::default()
        })
        .unwrap();

    for i in 0..200 {
        logger.info(format!("both-{}", i));
    }
    logger.complete();

    assert_eq!(
        fs::read_to_string(&sync_path).unwrap(),
        fs::read_to_string(&queued_path).unwrap()
    );
}

#[test]
fn test_removing_enqueued_handler_drains_it() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("drained.log");

    let logger = Logger::new();
    let id = logger
        .add(HandlerConfig {
            sink: SinkTarget::Path(path.clone()),
            format: Some("{message}".to_string()),
            enqueue: true,
            ..Default::default()
        })
        .unwrap();

    for i in 0..100 {
        logger.info(format!("pending-{}", i));
    }
    assert!(logger.remove(id));

    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 100);
}

#[test]
fn test_compression_gzips_rotated_segment() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gz.log");

    let logger = Logger::new();
    logger
        .add(HandlerConfig {
            sink: SinkTarget::Path(path.clone()),
            format: Some("{message}".to_string()),
            rotation: Some("40 B".to_string()),
            compression: true,
            ..Default::default()
        })
        .unwrap();

    for i in 0..6 {
        logger.info(format!("compressible-{}", i));
    }
    logger.complete();

    // Compression is deferred to a background task; poll briefly.
    let gz = dir.path().join("gz.1.log.gz");
    let raw = dir.path().join("gz.1.log");
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline && !gz.exists() {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(gz.exists(), "rotated segment should be gzipped");
    assert!(!raw.exists(), "raw segment should be removed after gzip");
    assert!(path.exists(), "active file is never compressed");
}

#[test]
fn test_custom_level_emission() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.log");

    let logger = Logger::new();
    logger
        .register_level("AUDIT", 28, Some("bright_blue"), Some("📋"))
        .unwrap();
    logger
        .add(HandlerConfig {
            sink: SinkTarget::Path(path.clone()),
            level: LevelThreshold::Name("audit".to_string()),
            format: Some("{level} {message}".to_string()),
            ..Default::default()
        })
        .unwrap();

    logger.info("below audit");
    logger.log_named("AUDIT", "user deleted").unwrap();
    logger.error("above audit");
    logger.complete();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "AUDIT user deleted\nERROR above audit\n"
    );
}

#[test]
fn test_level_conflict_surfaces_at_registration() {
    let logger = Logger::new();
    logger.register_level("AUDIT", 28, None, None).unwrap();
    assert!(logger.register_level("AUDIT", 29, None, None).is_err());
    // Identical re-registration is idempotent.
    assert!(logger.register_level("AUDIT", 28, None, None).is_ok());
}

#[test]
fn test_bad_config_fails_at_add_not_later() {
    let dir = TempDir::new().unwrap();
    let logger = Logger::new();

    let bad_rotation = logger.add(HandlerConfig {
        sink: SinkTarget::Path(dir.path().join("a.log")),
        rotation: Some("every other tuesday".to_string()),
        ..Default::default()
    });
    assert!(bad_rotation.is_err());

    let bad_retention = logger.add(HandlerConfig {
        sink: SinkTarget::Path(dir.path().join("b.log")),
        retention: Some("7 fortnights".to_string()),
        ..Default::default()
    });
    assert!(bad_retention.is_err());

    let bad_level = logger.add(HandlerConfig {
        sink: SinkTarget::Path(dir.path().join("c.log")),
        level: LevelThreshold::Name("blaring".to_string()),
        ..Default::default()
    });
    assert!(bad_level.is_err());

    assert_eq!(logger.handler_count(), 0);
}

#[test]
fn test_configure_from_file() {
    let dir = TempDir::new().unwrap();
    let log_path = dir.path().join("from-config.log");
    let config_path = dir.path().join("logmill.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[[logmill.level]]
name = "AUDIT"
no = 28
color = "bright_blue"

[[logmill.handler]]
path = "{}"
level = "AUDIT"
format = "{{level}} | {{message}}"
"#,
            log_path.display()
        ),
    )
    .unwrap();

    let logger = Logger::new();
    let ids = logger.configure_from_file(&config_path).unwrap();
    assert_eq!(ids.len(), 1);

    logger.log_named("AUDIT", "configured").unwrap();
    logger.complete();

    assert_eq!(
        fs::read_to_string(&log_path).unwrap(),
        "AUDIT | configured\n"
    );
}

#[test]
fn test_error_callback_receives_sink_failures() {
    let logger = Logger::new();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let errors_clone = Arc::clone(&errors);
    logger.add_error_callback(Arc::new(move |message: &str, _backtrace: &str| {
        errors_clone.lock().push(message.to_string());
    }));
    logger
        .add(HandlerConfig {
            sink: SinkTarget::Callable(Arc::new(|_| Err("disk on fire".to_string()))),
            format: Some("{message}".to_string()),
            ..Default::default()
        })
        .unwrap();

    logger.info("one");
    logger.info("two");

    // Reported once per handler, not per record.
    let errors = errors.lock();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("disk on fire"));
}

#[test]
fn test_elapsed_rendering() {
    let logger = Logger::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    logger
        .add(HandlerConfig {
            sink: SinkTarget::Callable(Arc::new(move |text: &str| {
                seen_clone.lock().push(text.to_string());
                Ok(())
            })),
            format: Some("{elapsed}".to_string()),
            ..Default::default()
        })
        .unwrap();

    logger.info("timed");

    let lines = seen.lock();
    // HH:MM:SS.mmm
    assert_eq!(lines[0].len(), 12);
    assert_eq!(&lines[0][2..3], ":");
    assert_eq!(&lines[0][5..6], ":");
    assert_eq!(&lines[0][8..9], ".");
}

#[test]
fn test_thread_and_process_tokens() {
    let logger = Logger::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    logger
        .add(HandlerConfig {
            sink: SinkTarget::Callable(Arc::new(move |text: &str| {
                seen_clone.lock().push(text.to_string());
                Ok(())
            })),
            format: Some("{thread}/{process}: {message}".to_string()),
            ..Default::default()
        })
        .unwrap();

    std::thread::Builder::new()
        .name("producer-a".to_string())
        .spawn(move || logger.info("from thread"))
        .unwrap()
        .join()
        .unwrap();

    let lines = seen.lock();
    assert!(lines[0].starts_with("producer-a/"));
    assert!(lines[0].ends_with(": from thread"));
}
