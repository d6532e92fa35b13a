// output.rs - Stream and per-unit dump persistence
use crate::error::Result;
use crate::generator::GeneratedStream;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn write_stream(path: &Path, data: &[u8]) -> Result<()> {
    fs::write(path, data)?;
    debug!(path = %path.display(), bytes = data.len(), "wrote stream");
    Ok(())
}

/// Write `<unit>.data` for every unit and `<unit>.txt` for units carrying
/// syntax elements. Returns the paths written.
pub fn write_unit_dumps(dir: &Path, stream: &GeneratedStream) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    for unit in &stream.units {
        if !unit.elements.is_empty() {
            let log_path = dir.join(format!("{}.txt", unit.name));
            fs::write(&log_path, unit.field_log())?;
            written.push(log_path);
        }

        let data_path = dir.join(format!("{}.data", unit.name));
        fs::write(&data_path, stream.unit_data(unit))?;
        written.push(data_path);
    }

    debug!(dir = %dir.display(), files = written.len(), "wrote unit dumps");
    Ok(written)
}
