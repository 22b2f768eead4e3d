use log::{Level, LevelFilter, Log, Metadata, Record};
use parking_lot::{const_mutex, Mutex};
use pseudogrep_core::search::LogSink;
use pseudogrep_core::{FunctionRef, ReportSink, SearchEvent};

/// Keeps every record emitted by this test binary.
struct RecordingLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl Log for RecordingLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.records.lock().push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static LOGGER: RecordingLogger = RecordingLogger { records: const_mutex(Vec::new()) };

#[test]
fn log_sink_routes_lines_by_level() {
    log::set_logger(&LOGGER).expect("install logger");
    log::set_max_level(LevelFilter::Trace);

    let mut sink = LogSink;
    sink.emit(&SearchEvent::Matches {
        function: FunctionRef::new(0x2000, "copy_name"),
        count: 2,
        snippets: vec!["memcpy(dst, src, n);".into()],
    });
    sink.emit(&SearchEvent::DecompilationFailed {
        function: FunctionRef::new(0x2200, "broken"),
        reason: "no pseudocode".into(),
    });

    let records = LOGGER.records.lock().clone();
    let level_of = |text: &str| records.iter().find(|(_, t)| t == text).map(|(level, _)| *level);
    assert_eq!(level_of("2 matches in copy_name @ 0x00002000"), Some(Level::Info));
    assert_eq!(level_of("memcpy(dst, src, n);"), Some(Level::Info));
    assert_eq!(
        level_of("Decompilation failed for broken @ 0x00002200. Skipping.."),
        Some(Level::Warn)
    );
}
