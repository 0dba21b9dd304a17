//! Report files written at the end of a run.

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Write one JSON document per line.
///
/// # Arguments
/// * `path` - Destination file, truncated if it exists
/// * `records` - Serializable records to write
pub fn write_json_lines<P: AsRef<Path>, T: Serialize>(path: P, records: &[T]) -> anyhow::Result<()> {
    let mut writer = BufWriter::new(File::create(&path)?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    info!("Wrote {} records to {:?}", records.len(), path.as_ref());
    Ok(())
}

/// Write records as CSV with a header row derived from the field names.
pub fn write_csv<P: AsRef<Path>, T: Serialize>(path: P, records: &[T]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(&path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    info!("Wrote {} rows to {:?}", records.len(), path.as_ref());
    Ok(())
}

/// Write plain text, e.g. a metrics exposition.
pub fn write_text<P: AsRef<Path>>(path: P, text: &str) -> anyhow::Result<()> {
    std::fs::write(&path, text)?;
    info!("Wrote {:?}", path.as_ref());
    Ok(())
}
