//! A tiny global trace logger.
//!
//! The emulation core calls [`log`] on hot paths (per-instruction traces,
//! DMA transfers, MMIO oddities). Until [`init_logger`] installs a sink the
//! calls are no-ops, so release frontends pay nothing for them. The file
//! sink is buffered: a per-instruction trace at full speed produces tens of
//! megabytes per second and unbuffered writes would dominate the frame time.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    sync::Mutex,
    time::Instant,
};

use chrono::Utc;
use once_cell::sync::OnceCell;

static SINK: OnceCell<Mutex<Sink>> = OnceCell::new();

/// Where the trace stream goes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LogKind {
    /// Straight to the console.
    Stdout,
    /// A timestamped file under the system temp directory
    /// (`pomelo-<unix-time>.log`).
    File,
}

struct Sink {
    writer: Box<dyn Write + Send>,
    started: Instant,
}

impl Sink {
    fn new(kind: LogKind) -> Self {
        let writer: Box<dyn Write + Send> = match kind {
            LogKind::Stdout => Box::new(io::stdout()),
            LogKind::File => {
                let name = format!("pomelo-{}.log", Utc::now().timestamp());
                let file = File::create(std::env::temp_dir().join(name))
                    .expect("failed to create the trace log file");
                Box::new(BufWriter::new(file))
            }
        };

        Self {
            writer,
            started: Instant::now(),
        }
    }

    fn write_line(&mut self, line: impl std::fmt::Display) {
        let elapsed = self.started.elapsed();
        let secs = elapsed.as_secs();
        let _ = writeln!(
            self.writer,
            "[{:02}:{:02}:{:02}.{:03}] {line}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            elapsed.subsec_millis()
        );
    }
}

/// Install the global trace sink. The first call wins; later calls are
/// ignored.
pub fn init_logger(kind: LogKind) {
    SINK.set(Mutex::new(Sink::new(kind))).ok();
}

/// Write one line through the global sink. A no-op until [`init_logger`]
/// runs.
pub fn log(line: impl std::fmt::Display) {
    if let Some(sink) = SINK.get() {
        if let Ok(mut sink) = sink.lock() {
            sink.write_line(line);
        }
    }
}

/// Flush the buffered sink, e.g. before the frontend exits.
pub fn flush() {
    if let Some(sink) = SINK.get() {
        if let Ok(mut sink) = sink.lock() {
            let _ = sink.writer.flush();
        }
    }
}
