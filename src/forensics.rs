use crate::report::CapturedRequest;
use crate::sanitize::UNKNOWN_TYPE;
use anyhow::Context;
use chrono::{Local, NaiveDate};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Writes one file per recorded report under
/// `<root>/<YYYY-MM-DD>/<type>/<uuid>`. Disabled when no root is set.
#[derive(Debug, Clone, Default)]
pub struct ForensicWriter {
    root: Option<PathBuf>,
}

impl ForensicWriter {
    pub fn new(root: Option<PathBuf>) -> Self {
        ForensicWriter { root }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub async fn write(
        &self,
        report_type: &str,
        request: &CapturedRequest,
    ) -> anyhow::Result<Option<PathBuf>> {
        self.write_on(Local::now().date_naive(), report_type, request)
            .await
    }

    pub async fn write_on(
        &self,
        date: NaiveDate,
        report_type: &str,
        request: &CapturedRequest,
    ) -> anyhow::Result<Option<PathBuf>> {
        let Some(root) = &self.root else {
            return Ok(None);
        };

        let dir = root
            .join(date.format("%Y-%m-%d").to_string())
            .join(type_dir(report_type));
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create forensics directory: {}", dir.display()))?;

        let path = dir.join(Uuid::new_v4().to_string());
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to create forensic artifact: {}", path.display()))?;

        file.write_all(&render_capture(request))
            .await
            .with_context(|| format!("Failed to write forensic artifact: {}", path.display()))?;
        file.flush().await?;

        log::debug!("Stored forensic artifact {}", path.display());
        Ok(Some(path))
    }
}

/// `.`, `..` and the empty string pass the type sanitizer but are not usable
/// as a directory of their own.
fn type_dir(report_type: &str) -> &str {
    match report_type {
        "" | "." | ".." => UNKNOWN_TYPE,
        other => other,
    }
}

/// Request line, blank line, headers, blank line, body.
pub fn render_capture(request: &CapturedRequest) -> Vec<u8> {
    let mut dump = format!("{} {}\n\n", request.method, request.url);
    for (name, value) in &request.headers {
        dump.push_str(name);
        dump.push_str(": ");
        dump.push_str(value);
        dump.push('\n');
    }
    dump.push('\n');

    let mut bytes = dump.into_bytes();
    match pretty_json(&request.body) {
        Some(pretty) => bytes.extend_from_slice(pretty.as_bytes()),
        // Not JSON: keep the exact bytes, whatever the encoding.
        None => bytes.extend_from_slice(&request.body),
    }
    bytes
}

/// Pretty-printed body if it parses as JSON. Numbers keep their original
/// literal text.
pub fn pretty_json(body: &[u8]) -> Option<String> {
    let value = serde_json::from_slice::<serde_json::Value>(body).ok()?;
    serde_json::to_string_pretty(&value).ok()
}
