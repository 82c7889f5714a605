//! Report payload decoding and saving.
//!
//! The backend returns finished workbooks inline as base64. This module turns
//! that payload into a `ReportArtifact` and hands it to an `ArtifactSink`,
//! which decides where the bytes end up (a directory for the CLI, a save
//! dialog for the GUI).

use std::io::Write;
use std::path::{Path, PathBuf};

use base64::Engine;

use crate::error::EngineError;

/// MIME type of the workbooks produced by the backend.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// A decoded report file ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifact {
    pub filename: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ReportArtifact {
    /// Decode a base64 payload into a workbook artifact.
    ///
    /// Only the final path component of `filename` is kept.
    pub fn from_base64(filename: &str, filedata: &str) -> Result<Self, EngineError> {
        let filename = sanitize_filename(filename)?;
        let cleaned: String = filedata.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = base64::engine::general_purpose::STANDARD.decode(cleaned)?;

        Ok(ReportArtifact {
            filename,
            mime_type: XLSX_MIME,
            bytes,
        })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn sanitize_filename(name: &str) -> Result<String, EngineError> {
    // Backslashes count as separators too; the backend may run on Windows.
    let normalized = name.trim().replace('\\', "/");
    Path::new(&normalized)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| EngineError::InvalidFilename {
            name: name.to_string(),
        })
}

/// Destination for finished reports.
///
/// `save` runs synchronously inside `JobController::handle_event` and may
/// block its caller (a file write, or a modal save dialog in the GUI).
pub trait ArtifactSink {
    /// Persist the artifact. `Ok(None)` means the user chose not to save.
    fn save(&self, artifact: &ReportArtifact) -> Result<Option<PathBuf>, EngineError>;
}

/// Writes artifacts into a fixed directory.
///
/// Bytes are staged in a temporary file inside the target directory and then
/// persisted under the final name, so readers never see a half-written
/// workbook and a failed save leaves no temporary behind.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectorySink { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for DirectorySink {
    fn save(&self, artifact: &ReportArtifact) -> Result<Option<PathBuf>, EngineError> {
        let path = self.dir.join(&artifact.filename);
        let save_error = |source: std::io::Error| EngineError::Save {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(save_error)?;

        let mut staged = tempfile::NamedTempFile::new_in(&self.dir).map_err(save_error)?;
        staged.write_all(&artifact.bytes).map_err(save_error)?;
        staged.flush().map_err(save_error)?;
        staged.persist(&path).map_err(|e| save_error(e.error))?;

        tracing::info!(
            path = %path.display(),
            bytes = artifact.len(),
            "Report saved"
        );
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // "PK\x03\x04" - the zip signature every xlsx file starts with.
    const XLSX_MAGIC_B64: &str = "UEsDBA==";

    fn decode(filename: &str) -> ReportArtifact {
        ReportArtifact::from_base64(filename, XLSX_MAGIC_B64).expect("Failed to decode")
    }

    #[test]
    fn test_decode_valid_payload() {
        let artifact = decode("r.xlsx");
        assert_eq!(artifact.filename, "r.xlsx");
        assert_eq!(artifact.mime_type, XLSX_MIME);
        assert_eq!(artifact.bytes, b"PK\x03\x04");
    }

    #[test]
    fn test_decode_ignores_line_breaks() {
        let artifact =
            ReportArtifact::from_base64("r.xlsx", "UEsD\nBA==\r\n").expect("Failed to decode");
        assert_eq!(artifact.bytes, b"PK\x03\x04");
    }

    #[test]
    fn test_decode_rejects_malformed_base64() {
        let result = ReportArtifact::from_base64("r.xlsx", "not base64!!");
        assert!(matches!(result, Err(EngineError::Decode(_))));
    }

    #[test]
    fn test_filename_is_reduced_to_final_component() {
        let artifact = decode("../../etc/report.xlsx");
        assert_eq!(artifact.filename, "report.xlsx");

        let artifact = decode("C:\\reports\\june.xlsx");
        assert_eq!(artifact.filename, "june.xlsx");
    }

    #[test]
    fn test_empty_filename_is_rejected() {
        assert!(matches!(
            ReportArtifact::from_base64("", XLSX_MAGIC_B64),
            Err(EngineError::InvalidFilename { .. })
        ));
        assert!(matches!(
            ReportArtifact::from_base64("reports/..", XLSX_MAGIC_B64),
            Err(EngineError::InvalidFilename { .. })
        ));
    }

    #[test]
    fn test_directory_sink_writes_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let sink = DirectorySink::new(temp_dir.path().join("out"));
        let artifact = decode("r.xlsx");

        let saved = sink.save(&artifact).expect("Failed to save");
        let path = saved.expect("Directory sink always saves");

        assert_eq!(path, temp_dir.path().join("out").join("r.xlsx"));
        assert_eq!(std::fs::read(&path).expect("Failed to read"), b"PK\x03\x04");

        // Only the final file remains; the staging file was persisted away.
        let entries = std::fs::read_dir(temp_dir.path().join("out"))
            .expect("Failed to list dir")
            .count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_directory_sink_overwrites_existing_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::write(temp_dir.path().join("r.xlsx"), b"old").expect("Failed to write");

        let sink = DirectorySink::new(temp_dir.path());
        let artifact = decode("r.xlsx");
        sink.save(&artifact).expect("Failed to save");

        assert_eq!(
            std::fs::read(temp_dir.path().join("r.xlsx")).expect("Failed to read"),
            b"PK\x03\x04"
        );
    }
}
