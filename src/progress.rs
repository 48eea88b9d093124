//! Progress bars that share the terminal with tracing output.
//!
//! Log lines are printed through the same [`MultiProgress`] as the bars,
//! so bars stay pinned below the log.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

static MULTI_PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

fn multi_progress() -> &'static MultiProgress {
    MULTI_PROGRESS.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

pub fn add_progress_bar(len: u64) -> ProgressBar {
    multi_progress().add(ProgressBar::new(len))
}

fn styled(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .tick_chars(TICK_CHARS)
}

/// Bar for a download; a spinner when the size is unknown
pub fn start_byte_bar(total: Option<u64>, message: &str) -> ProgressBar {
    let pb = match total {
        Some(len) if len > 0 => {
            let pb = add_progress_bar(len);
            pb.set_style(styled(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
            ));
            pb
        }
        _ => {
            let pb = multi_progress().add(ProgressBar::new_spinner());
            pb.set_style(styled(
                "{spinner:.green} [{elapsed_precise}] {bytes} ({bytes_per_sec}) {msg}",
            ));
            pb
        }
    };
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Spinner counting imported records; list sizes are not known up front
pub fn start_record_bar(message: &str) -> ProgressBar {
    let pb = multi_progress().add(ProgressBar::new_spinner());
    pb.set_style(styled(
        "{spinner:.green} [{elapsed_precise}] {human_pos} records ({per_sec}) {msg}",
    ));
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn finish_progress(pb: ProgressBar, message: &str) {
    pb.finish_with_message(message.to_string());
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

    fn print_line(line: &str) {
        let _ = multi_progress().println(line.to_string());
    }

    fn flush_buffer(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        Self::print_line(self.buffer.trim_end_matches(['\n', '\r']));
        self.buffer.clear();
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.push_str(&String::from_utf8_lossy(buf));

        while let Some(idx) = self.buffer.find('\n') {
            Self::print_line(self.buffer[..idx].trim_end_matches('\r'));
            self.buffer.drain(..idx + 1);
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer();
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_writer_accepts_partial_lines() {
        let mut writer = LogWriterFactory.make_writer();
        assert_eq!(writer.write(b"first line\nsecond ").unwrap(), 18);
        assert_eq!(writer.buffer, "second ");
        writer.write_all(b"half\r\n").unwrap();
        assert!(writer.buffer.is_empty());
        writer.write_all(b"tail").unwrap();
        writer.flush().unwrap();
        assert!(writer.buffer.is_empty());
    }

    #[test]
    fn test_bars_track_position() {
        let bytes = start_byte_bar(Some(100), "Downloading");
        bytes.inc(40);
        assert_eq!(bytes.position(), 40);
        assert_eq!(bytes.length(), Some(100));
        finish_progress(bytes, "done");

        let records = start_record_bar("Importing");
        records.set_position(5000);
        assert_eq!(records.position(), 5000);
        finish_progress(records, "done");
    }
}
