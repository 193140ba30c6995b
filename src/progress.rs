//! Progress bars and the log writer that keeps them pinned
//!
//! Crawls run for hours; chapter progress renders as indicatif bars on
//! stderr while tracing output is routed through the same `MultiProgress`
//! so log lines print above the bars instead of tearing them.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing_subscriber::fmt::MakeWriter;

static MULTI_PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

fn multi_progress() -> &'static MultiProgress {
    MULTI_PROGRESS.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

/// A per-novel chapter progress bar
pub fn chapter_bar(total_chapters: u64, title: &str) -> ProgressBar {
    let bar = multi_progress().add(ProgressBar::new(total_chapters));
    bar.set_style(
        ProgressStyle::with_template("{msg:20!} [{bar:30}] {pos}/{len} {eta}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(title.to_string());
    bar
}

#[derive(Default, Clone)]
pub struct LogWriterFactory;

pub struct LogWriter {
    buffer: String,
}

impl LogWriter {
    fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    fn emit(&mut self, upto: Option<usize>) {
        let (chunk, rest) = match upto {
            Some(idx) => {
                let chunk = self.buffer[..idx].to_string();
                let rest = self.buffer[idx + 1..].to_string();
                (chunk, rest)
            }
            None => (std::mem::take(&mut self.buffer), String::new()),
        };
        let line = chunk.trim_end_matches(['\n', '\r']);
        let _ = multi_progress().println(line.to_string());
        self.buffer = rest;
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.push_str(&String::from_utf8_lossy(buf));
        while let Some(idx) = self.buffer.find('\n') {
            self.emit(Some(idx));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.emit(None);
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter::new()
    }
}
