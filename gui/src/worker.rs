use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use engine::{ArtifactSink, EngineError, ReportArtifact};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// Receiving end of a background task's event channel, tagged with the run
/// it belongs to so replies from an older run can be told apart.
pub struct Pump<T> {
    id: Uuid,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<T>>>,
}

impl<T: Send + 'static> Pump<T> {
    pub fn new(id: Uuid, rx: mpsc::UnboundedReceiver<T>) -> Self {
        Pump {
            id,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next event. Yields `None` once the task has hung up.
    pub fn next(&self) -> impl Future<Output = (Uuid, Option<T>)> + Send + 'static {
        let id = self.id;
        let rx = Arc::clone(&self.rx);
        async move {
            let event = rx.lock().await.recv().await;
            (id, event)
        }
    }
}

/// Saves reports wherever the user picks in a native save dialog.
#[derive(Debug, Default)]
pub struct DialogSink;

impl ArtifactSink for DialogSink {
    fn save(&self, artifact: &ReportArtifact) -> Result<Option<PathBuf>, EngineError> {
        let Some(path) = rfd::FileDialog::new()
            .set_title("Save report")
            .set_file_name(artifact.filename.as_str())
            .add_filter("Excel workbook", &["xlsx"])
            .save_file()
        else {
            tracing::info!(filename = %artifact.filename, "Save dialog dismissed");
            return Ok(None);
        };

        std::fs::write(&path, &artifact.bytes).map_err(|source| EngineError::Save {
            path: path.clone(),
            source,
        })?;

        tracing::info!(path = %path.display(), bytes = artifact.len(), "Report saved");
        Ok(Some(path))
    }
}
