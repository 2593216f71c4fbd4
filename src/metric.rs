use anyhow::Context;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Destination for metric lines. Each call must write one complete line.
/// Writes are blocking; `MetricLogger` runs them off the async workers.
pub trait MetricSink: Send + Sync {
    fn write_line(&self, line: &str) -> std::io::Result<()>;
}

pub struct StdoutSink;

impl MetricSink for StdoutSink {
    fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}")?;
        out.flush()
    }
}

/// Append-mode log file shared by all requests.
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        Ok(FileSink { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricSink for FileSink {
    fn write_line(&self, line: &str) -> std::io::Result<()> {
        // One write per line so concurrent appends never interleave.
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        (&self.file).write_all(buf.as_bytes())
    }
}

/// Collects lines in memory, for tests and embedding.
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl MetricSink for MemorySink {
    fn write_line(&self, line: &str) -> std::io::Result<()> {
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }
}

pub fn format_metric(report_type: &str) -> String {
    format!("nel,type={report_type},value=1")
}

pub struct MetricLogger {
    sinks: Vec<Arc<dyn MetricSink>>,
}

impl MetricLogger {
    pub fn new(sinks: Vec<Arc<dyn MetricSink>>) -> Self {
        MetricLogger { sinks }
    }

    /// Stdout, plus the log file when one is given.
    pub fn from_log_path(log_path: Option<&Path>) -> anyhow::Result<Self> {
        let mut sinks: Vec<Arc<dyn MetricSink>> = vec![Arc::new(StdoutSink)];
        if let Some(path) = log_path {
            let sink = FileSink::open(path)?;
            log::info!("Appending metric lines to {}", sink.path().display());
            sinks.push(Arc::new(sink));
        }
        Ok(MetricLogger { sinks })
    }

    /// `report_type` must already be sanitized.
    pub async fn log(&self, report_type: &str) -> anyhow::Result<()> {
        let line = format_metric(report_type);
        let sinks = self.sinks.clone();
        tokio::task::spawn_blocking(move || {
            for sink in &sinks {
                sink.write_line(&line)
                    .with_context(|| format!("Failed to write metric line: {line}"))?;
            }
            Ok::<(), anyhow::Error>(())
        })
        .await
        .context("Metric writer task failed")?
    }
}
