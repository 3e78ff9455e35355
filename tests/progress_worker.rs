mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{RecordingSink, importer, request, shared_db, write_file};
use tabload::ImportError;
use tabload::error::ImportSeverity;
use tabload::execution::{
    CallbackSink, CompositeSink, FileSink, ProgressEvent, ProgressSink, TracingSink,
    progress_channel, spawn_import,
};
use tabload::types::{SourceKind, Summary};

#[test]
fn worker_delivers_events_in_order_through_the_channel() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.csv", b"x\n1\n");
    write_file(dir.path(), "b.csv", b"x\n");

    let db = shared_db();
    let (sink, events) = progress_channel(4);
    let handle = spawn_import(
        importer(&db),
        request(dir.path(), "public", SourceKind::Delimited),
        Arc::new(sink),
    )
    .unwrap();

    let mut received = Vec::new();
    let outcome = handle
        .wait_polling(Duration::from_millis(5), || received.extend(events.try_iter()))
        .unwrap();
    received.extend(events.try_iter());

    assert_eq!(outcome.summary(), Summary::Partial { succeeded: 1, total: 2 });
    assert!(matches!(received.first(), Some(ProgressEvent::RunStarted { .. })));
    assert_eq!(
        received.last(),
        Some(&ProgressEvent::RunFinished {
            summary: Summary::Partial { succeeded: 1, total: 2 }
        })
    );

    let started: Vec<usize> = received
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::UnitStarted { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(started, [1, 2]);

    let loaded = received
        .iter()
        .position(|e| matches!(e, ProgressEvent::UnitLoaded { .. }))
        .unwrap();
    let skipped = received
        .iter()
        .position(|e| matches!(e, ProgressEvent::UnitSkippedEmpty { .. }))
        .unwrap();
    assert!(loaded < skipped);
}

#[test]
fn join_returns_fatal_errors_from_the_worker() {
    let dir = tempfile::tempdir().unwrap();
    let db = shared_db();
    let handle = spawn_import(
        importer(&db),
        request(&dir.path().join("absent"), "public", SourceKind::Delimited),
        Arc::new(RecordingSink::default()),
    )
    .unwrap();

    let err = handle.join().unwrap_err();
    assert!(matches!(err, ImportError::SourceDirectory { .. }));
}

struct PanickingSink;

impl ProgressSink for PanickingSink {
    fn report(&self, _line: &str) {
        panic!("sink exploded");
    }
}

#[test]
fn worker_panic_becomes_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let db = shared_db();
    let handle = spawn_import(
        importer(&db),
        request(dir.path(), "public", SourceKind::Delimited),
        Arc::new(PanickingSink),
    )
    .unwrap();

    match handle.join() {
        Err(ImportError::WorkerPanicked { message }) => assert_eq!(message, "sink exploded"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn dropped_receiver_does_not_block_the_worker() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.csv", b"x\n1\n");

    let db = shared_db();
    let (sink, events) = progress_channel(1);
    drop(events);
    let outcome = spawn_import(
        importer(&db),
        request(dir.path(), "public", SourceKind::Delimited),
        Arc::new(sink),
    )
    .unwrap()
    .join()
    .unwrap();
    assert!(outcome.overall_success());
}

#[test]
fn callback_sink_receives_display_lines() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.csv", b"x\n1\n2\n");

    let lines = Arc::new(Mutex::new(Vec::<String>::new()));
    let captured = Arc::clone(&lines);
    let sink = CallbackSink::new(move |line: &str| captured.lock().unwrap().push(line.to_string()));

    let db = shared_db();
    importer(&db)
        .run(&request(dir.path(), "public", SourceKind::Delimited), &sink)
        .unwrap();

    let lines = lines.lock().unwrap();
    assert!(lines.contains(&r#"  loaded 2 row(s) into "public"."a""#.to_string()));
    assert_eq!(
        lines.last().map(String::as_str),
        Some("all 1 units imported successfully")
    );
}

#[test]
fn composite_sink_fans_out_and_file_sink_appends() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("import.log");

    let recorder = Arc::new(RecordingSink::default());
    let sink = CompositeSink::new(vec![
        Arc::clone(&recorder) as Arc<dyn ProgressSink>,
        Arc::new(FileSink::new(&log)),
        Arc::new(TracingSink),
    ]);

    sink.on_event(&ProgressEvent::UnitSkippedEmpty {
        unit: "a.csv".to_string(),
    });
    sink.report("free-form note");

    assert_eq!(recorder.events().len(), 2);
    let text = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("Warning   WARNING: a.csv has no data rows, skipping"));
    assert!(lines[1].ends_with("Info free-form note"));
}

#[test]
fn event_severity_follows_the_summary() {
    let finished = |summary| ProgressEvent::RunFinished { summary }.severity();
    assert_eq!(finished(Summary::NoSources), ImportSeverity::Info);
    assert_eq!(finished(Summary::AllSucceeded { total: 2 }), ImportSeverity::Info);
    assert_eq!(
        finished(Summary::Partial { succeeded: 1, total: 2 }),
        ImportSeverity::Warning
    );
    assert_eq!(finished(Summary::NoneSucceeded { total: 2 }), ImportSeverity::Error);
    assert_eq!(
        ProgressEvent::Fatal {
            message: "x".to_string()
        }
        .severity(),
        ImportSeverity::Critical
    );
}

#[test]
fn outcome_serializes_for_machine_readable_output() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "a.csv", b"x\n1\n");

    let db = shared_db();
    let outcome = importer(&db)
        .run(
            &request(dir.path(), "public", SourceKind::Delimited),
            &RecordingSink::default(),
        )
        .unwrap();

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["succeeded"], 1);
    assert_eq!(json["cancelled"], false);
    let summary = serde_json::to_value(outcome.summary()).unwrap();
    assert_eq!(summary["outcome"], "all_succeeded");
    assert_eq!(summary["total"], 1);
}
