//! Plain-text log export

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use sair_core::prelude::*;
use sair_core::LogRecord;

/// `"HH:MM:SS  text"`
pub fn format_record(record: &LogRecord) -> String {
    format!("{}  {}", record.formatted_time(), record.text)
}

/// One formatted line per record, joined by `\n` with no trailing newline
pub fn render_export<'a>(records: impl IntoIterator<Item = &'a LogRecord>) -> String {
    records
        .into_iter()
        .map(format_record)
        .collect::<Vec<_>>()
        .join("\n")
}

/// `serial-air-log-YYYY-MM-DDTHH-MM-SS.txt`, from the UTC time `now`
pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("serial-air-log-{}.txt", now.format("%Y-%m-%dT%H-%M-%S"))
}

/// Write `records` to a new file in `dir` and return its path
pub fn write_export<'a>(
    dir: &Path,
    records: impl IntoIterator<Item = &'a LogRecord>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::export(format!("cannot create {}: {}", dir.display(), e)))?;

    let path = dir.join(export_file_name(Utc::now()));
    let content = render_export(records);
    std::fs::write(&path, content)
        .map_err(|e| Error::export(format!("cannot write {}: {}", path.display(), e)))?;

    info!("Exported log to {}", path.display());
    Ok(path)
}
