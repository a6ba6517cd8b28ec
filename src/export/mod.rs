//! Output artifacts: the figure-metadata JSON, the answers report, and the
//! cropped figure images. JSON artifacts are written atomically (temp file
//! plus rename) so a partially-written file is never observable.

pub mod answers;
pub mod figures;

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::core::error::{PipelineError, Result};

pub use answers::AnswerReportExporter;
pub use figures::FigureMetadataExporter;

pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path.parent().ok_or_else(|| PipelineError::Io(
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "artifact path has no parent"),
    ))?;
    std::fs::create_dir_all(dir)?;

    let data = serde_json::to_vec_pretty(value).map_err(|e| {
        PipelineError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&data)?;
    tmp.write_all(b"\n")?;
    tmp.persist(path)
        .map_err(|e| PipelineError::Io(e.error))?;
    Ok(())
}
