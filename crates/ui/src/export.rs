use schema::DetectionResult;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const EXPORT_PREFIX: &str = "detections_";
const EXPORT_SUFFIX: &str = ".json";

/// Create the output directory if it does not exist yet.
pub fn ensure_output_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

/// A fresh `detections_<uuid4 hex>.json` name.
pub fn export_file_name() -> String {
    format!("{EXPORT_PREFIX}{}{EXPORT_SUFFIX}", Uuid::new_v4().simple())
}

/// Whether `name` is something [`export_file_name`] could have produced.
pub fn is_export_file_name(name: &str) -> bool {
    name.strip_prefix(EXPORT_PREFIX)
        .and_then(|rest| rest.strip_suffix(EXPORT_SUFFIX))
        .is_some_and(|id| {
            id.len() == 32
                && id
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        })
}

/// Write `result` as pretty-printed JSON to a new uniquely named file in
/// `dir` and return its path.
///
/// Existing files are never overwritten.
pub fn save_detections_json(dir: &Path, result: &DetectionResult) -> io::Result<PathBuf> {
    let path = dir.join(export_file_name());

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, result)?;
    writer.flush()?;

    tracing::debug!(path = %path.display(), "Saved detections");

    Ok(path)
}
