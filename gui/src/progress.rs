use engine::{progress_fraction, render_progress, FanOutEvent, JobSession};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What the progress area shows for the report job.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressView {
    pub visible: bool,
    /// Bar value in `0.0..=100.0`.
    pub percent: f32,
    pub text: String,
}

impl ProgressView {
    pub fn of(session: &JobSession) -> Self {
        let status = session.progress();
        ProgressView {
            visible: session.is_processing(),
            percent: progress_fraction(status) * 100.0,
            text: render_progress(status),
        }
    }
}

/// Event log of the "process all stores" run.
#[derive(Debug, Default)]
pub struct FanOutLog {
    run_id: Option<Uuid>,
    cancel: Option<CancellationToken>,
    pub lines: Vec<String>,
    pub succeeded: usize,
    pub failed: usize,
}

impl FanOutLog {
    pub fn start(&mut self, run_id: Uuid, cancel: CancellationToken) {
        self.run_id = Some(run_id);
        self.cancel = Some(cancel);
        self.lines.clear();
        self.succeeded = 0;
        self.failed = 0;
    }

    pub fn is_running(&self) -> bool {
        self.run_id.is_some()
    }

    /// Ask the run to stop before the next store.
    pub fn stop(&mut self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
            self.lines.push("Stopping after the current store...".to_string());
        }
    }

    /// Record an event of run `run_id`. Returns `false` for events of any
    /// other run.
    pub fn apply(&mut self, run_id: Uuid, event: &FanOutEvent) -> bool {
        if self.run_id != Some(run_id) {
            return false;
        }
        match event {
            FanOutEvent::WarehouseComplete { .. } => self.succeeded += 1,
            FanOutEvent::Error { .. } => self.failed += 1,
            _ => {}
        }
        self.lines.push(describe(event));
        true
    }

    /// The run's channel closed.
    pub fn finish(&mut self, run_id: Uuid) {
        if self.run_id == Some(run_id) {
            self.run_id = None;
            self.cancel = None;
        }
    }
}

fn describe(event: &FanOutEvent) -> String {
    match event {
        FanOutEvent::Processing { store_id } => format!("Processing store {}...", store_id),
        FanOutEvent::WarehouseComplete { store_id } => format!("Store {} processed", store_id),
        FanOutEvent::Error { store_id, message } => {
            format!("Error processing store {}: {}", store_id, message)
        }
        FanOutEvent::Complete => "All stores processed".to_string(),
        FanOutEvent::Cancelled { processed } => format!("Stopped after {} stores", processed),
    }
}
