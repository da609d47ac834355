//! Helpers shared by the `fleetdocs` binary: tracing setup, file loading and
//! table rendering.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use fleetdocs_core::models::{FileRecord, UploadedFile};

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Read a file from disk into an upload payload, guessing its MIME type from the extension.
pub async fn read_upload_file(path: &Path) -> Result<UploadedFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let original_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", path.display()))?
        .to_string();
    let mime_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    Ok(UploadedFile::new(original_name, mime_type, data))
}

/// Parse `YYYY-MM-DD` or an RFC 3339 timestamp. Bare dates mean midnight UTC,
/// or the last second of the day when `end_of_day` is set.
pub fn parse_date_bound(value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date {:?}, expected YYYY-MM-DD or RFC 3339", value))?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)
    } else {
        date.and_hms_opt(0, 0, 0)
    }
    .context("Invalid time of day")?;

    Ok(time.and_utc())
}

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Render records as a fixed-width table.
pub fn render_record_table(records: &[FileRecord]) -> String {
    if records.is_empty() {
        return "No files found.\n".to_string();
    }

    let mut out = format!(
        "{:<36} {:<10} {:<18} {:<30} {:>10} {:>20}\n",
        "ID", "Entity", "Document Type", "Original Name", "Size (KB)", "Uploaded At"
    );
    out.push_str(&"-".repeat(129));
    out.push('\n');

    for record in records {
        out.push_str(&format!(
            "{:<36} {:<10} {:<18} {:<30} {:>10.1} {:>20}\n",
            record.id,
            record.entity_type,
            truncate_string(&record.document_type, 18),
            truncate_string(&record.original_name, 30),
            record.size as f64 / 1024.0,
            record.upload_date.format("%Y-%m-%d %H:%M:%S")
        ));
    }

    out
}
