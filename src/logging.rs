use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILE: &str = "report_sender.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LineFormat {
    /// `timestamp - LEVEL - message`
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub destination: PathBuf,
    pub min_level: LevelFilter,
    pub line_format: LineFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            destination: PathBuf::from(DEFAULT_LOG_FILE),
            min_level: LevelFilter::INFO,
            line_format: LineFormat::Text,
        }
    }
}

/// Installs the process-wide subscriber. `RUST_LOG` overrides `min_level`.
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
    let file = open_destination(&config.destination)
        .with_context(|| format!("failed to open log file {}", config.destination.display()))?;
    let filter = EnvFilter::builder()
        .with_default_directive(config.min_level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false);

    let installed = match config.line_format {
        LineFormat::Text => builder.event_format(TextLine).try_init(),
        LineFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| anyhow::anyhow!("failed to install logger: {err}"))
}

fn open_destination(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Plain one-line format for the log file.
pub struct TextLine;

impl<S, N> FormatEvent<S, N> for TextLine
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        write!(
            writer,
            "{} - {} - ",
            Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            event.metadata().level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    use tracing::Level;
    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    struct BufferWriter(Arc<Mutex<Vec<u8>>>);

    impl<'a> MakeWriter<'a> for SharedBuffer {
        type Writer = BufferWriter;

        fn make_writer(&'a self) -> Self::Writer {
            BufferWriter(Arc::clone(&self.0))
        }
    }

    impl io::Write for BufferWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut guard = self
                .0
                .lock()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "lock poisoned"))?;
            guard.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured(sink: &SharedBuffer) -> String {
        let bytes = sink.0.lock().expect("lock output").clone();
        String::from_utf8(bytes).expect("utf8 log output")
    }

    #[test]
    fn text_lines_follow_timestamp_level_message_template() {
        let sink = SharedBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(sink.clone())
            .with_ansi(false)
            .with_max_level(Level::INFO)
            .event_format(TextLine)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Loaded {} students from {}", 2, "students.csv");
            tracing::error!("Failed to send to {}: {}", "a@example.com", "550 rejected");
            tracing::debug!("not written");
        });

        let text = captured(&sink);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let parts: Vec<&str> = lines[0].splitn(3, " - ").collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), "2026-01-01 00:00:00,000".len());
        assert!(chrono::NaiveDate::parse_from_str(&parts[0][..10], "%Y-%m-%d").is_ok());
        assert_eq!(parts[1], "INFO");
        assert_eq!(parts[2], "Loaded 2 students from students.csv");

        assert!(lines[1].ends_with(" - ERROR - Failed to send to a@example.com: 550 rejected"));
    }

    #[test]
    fn destination_is_appended_to() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(DEFAULT_LOG_FILE);

        writeln!(open_destination(&path).expect("open"), "first run").expect("write");
        writeln!(open_destination(&path).expect("open"), "second run").expect("write");

        let content = std::fs::read_to_string(&path).expect("read log");
        assert_eq!(content, "first run\nsecond run\n");
    }

    #[test]
    fn defaults_match_the_desktop_tool() {
        let config = LogConfig::default();
        assert_eq!(config.destination, PathBuf::from("report_sender.log"));
        assert_eq!(config.min_level, LevelFilter::INFO);
        assert_eq!(config.line_format, LineFormat::Text);
    }
}
