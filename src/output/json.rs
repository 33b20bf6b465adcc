//! JSON export

use crate::output::OutputResult;
use crate::report::AuditResult;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Serializes a result as pretty-printed JSON
pub fn to_json(result: &AuditResult) -> OutputResult<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Writes a result as pretty-printed JSON to `output_path`
pub fn write_json(result: &AuditResult, output_path: &Path) -> OutputResult<()> {
    let mut writer = BufWriter::new(File::create(output_path)?);
    serde_json::to_writer_pretty(&mut writer, result)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
