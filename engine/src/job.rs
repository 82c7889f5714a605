//! Report job orchestration.
//!
//! This module drives one long-running backend job through
//! submit -> poll -> complete, with cooperative cancellation:
//! - `submit` occupies the session slot and spawns the lifecycle task
//! - the lifecycle task polls status on a fixed interval while the
//!   submission call runs, and reports everything as `JobEvent`s
//! - `JobController::handle_event` applies events to the session and turns
//!   the resolution into a `JobOutcome` (saving the workbook if there is one)
//!
//! The lifecycle task is the only producer of events for a job and selects
//! over cancellation, the submission, the in-flight status request and the
//! poll ticker in one loop, so no progress event can follow the terminal one
//! and a slow status call never delays the result. Events are tagged with the
//! job id; the session ignores anything from a job it no longer holds.
//!
//! A job submitted right after a cancel waits for the cancelled job's
//! `/cancel` request to complete before it calls the backend.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::artifact::{ArtifactSink, ReportArtifact};
use crate::backend::ReportBackend;
use crate::error::EngineError;
use crate::model::{ProgressStatus, ReportParams, ReportResult};
use crate::session::JobSession;

/// Something the lifecycle task observed about a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobEvent {
    pub job_id: Uuid,
    pub kind: JobEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEventKind {
    /// A status poll returned.
    Progress(ProgressStatus),
    /// A status poll failed. Polling continues.
    PollFailed(String),
    /// The submission call returned a backend response.
    Resolved(ReportResult),
    /// The submission call failed before the backend answered.
    SubmitFailed(String),
    /// The job was cancelled and the backend has been notified.
    Cancelled,
}

impl JobEventKind {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobEventKind::Resolved(_) | JobEventKind::SubmitFailed(_) | JobEventKind::Cancelled
        )
    }
}

/// Handle to a running lifecycle task.
#[derive(Debug)]
pub struct JobRun {
    pub job_id: Uuid,
    pub events: mpsc::UnboundedReceiver<JobEvent>,
    pub handle: JoinHandle<()>,
    /// Fired when the lifecycle task exits, after any cancel request it
    /// sent has been answered.
    pub settled: CancellationToken,
}

/// What the user is told when a job ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The workbook was written to `path`.
    Saved { path: PathBuf, message: String },
    /// The job succeeded without a file, or the user declined to save it.
    Completed { message: String },
    /// The backend reported failure, the call failed, or the file could not
    /// be decoded or written.
    Failed { message: String },
    /// The user cancelled the job.
    Cancelled { message: String },
}

impl JobOutcome {
    pub fn message(&self) -> &str {
        match self {
            JobOutcome::Saved { message, .. }
            | JobOutcome::Completed { message }
            | JobOutcome::Failed { message }
            | JobOutcome::Cancelled { message } => message,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Saved { .. } | JobOutcome::Completed { .. })
    }
}

/// Start a report job if the session slot is free.
///
/// Returns `None` without touching the backend or the session when a job is
/// already processing. When `after` is given, the new job is not sent to the
/// backend until that token fires (see [`JobRun::settled`]).
pub fn submit<B>(
    session: &mut JobSession,
    backend: Arc<B>,
    params: ReportParams,
    poll_interval: Duration,
    after: Option<CancellationToken>,
) -> Option<JobRun>
where
    B: ReportBackend + 'static,
{
    if session.is_processing() {
        tracing::debug!(
            active_job = ?session.job_id(),
            "Submission ignored: a report is already being generated"
        );
        return None;
    }

    let job_id = Uuid::new_v4();
    let cancel = CancellationToken::new();
    if let Err(e) = session.begin(job_id, cancel.clone()) {
        tracing::warn!(error = %e, "Submission rejected by job session");
        return None;
    }

    tracing::info!(
        %job_id,
        store_id = %params.store_id,
        start_date = %params.start_date,
        end_date = %params.end_date,
        groups = params.product_groups.len(),
        "Report job submitted"
    );

    let (tx, events) = mpsc::unbounded_channel();
    let settled = CancellationToken::new();
    let lifecycle = Lifecycle {
        job_id,
        backend,
        poll_interval,
        cancel,
        after,
        settled: settled.clone(),
        tx,
    };
    let handle = tokio::spawn(lifecycle.run(params));

    Some(JobRun {
        job_id,
        events,
        handle,
        settled,
    })
}

/// State of the lifecycle task for one job.
struct Lifecycle<B> {
    job_id: Uuid,
    backend: Arc<B>,
    poll_interval: Duration,
    cancel: CancellationToken,
    after: Option<CancellationToken>,
    settled: CancellationToken,
    tx: mpsc::UnboundedSender<JobEvent>,
}

type PollHandle = JoinHandle<Result<ProgressStatus, EngineError>>;

impl<B> Lifecycle<B>
where
    B: ReportBackend + 'static,
{
    async fn run(self, params: ReportParams) {
        let _settled = self.settled.clone().drop_guard();
        let job_id = self.job_id;

        // The backend's cancel flag is global: a previous job's cancel
        // request must land before this job starts.
        if let Some(after) = &self.after {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!(%job_id, "Report job cancelled before submission");
                    self.send(JobEventKind::Cancelled);
                    return;
                }
                _ = after.cancelled() => {}
            }
        }

        let mut submission = {
            let backend = Arc::clone(&self.backend);
            tokio::spawn(async move { backend.generate_report(&params).await })
        };

        // First poll one interval after submission, then every interval.
        let mut ticker = tokio::time::interval_at(
            Instant::now() + self.poll_interval,
            self.poll_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut poll: Option<PollHandle> = None;

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    submission.abort();
                    abort_poll(&mut poll);
                    tracing::info!(%job_id, "Report job cancelled, notifying backend");
                    if let Err(e) = self.backend.cancel_processing().await {
                        tracing::warn!(%job_id, error = %e, "Cancel request failed");
                    }
                    self.send(JobEventKind::Cancelled);
                    break;
                }

                joined = &mut submission => {
                    abort_poll(&mut poll);
                    let kind = match joined {
                        Ok(Ok(result)) => {
                            tracing::info!(
                                %job_id,
                                success = result.success,
                                "Report job resolved"
                            );
                            JobEventKind::Resolved(result)
                        }
                        Ok(Err(e)) => {
                            tracing::error!(%job_id, error = %e, "Report request failed");
                            JobEventKind::SubmitFailed(e.to_string())
                        }
                        Err(e) => {
                            tracing::error!(%job_id, error = %e, "Report task failed");
                            JobEventKind::SubmitFailed(format!("report task failed: {}", e))
                        }
                    };
                    self.send(kind);
                    break;
                }

                polled = wait_poll(&mut poll), if poll.is_some() => {
                    poll = None;
                    let kind = match polled {
                        Ok(Ok(status)) => {
                            tracing::debug!(
                                %job_id,
                                processed = status.processed,
                                total = status.total,
                                "Status polled"
                            );
                            JobEventKind::Progress(status)
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(%job_id, error = %e, "Status poll failed");
                            JobEventKind::PollFailed(e.to_string())
                        }
                        Err(e) => {
                            tracing::warn!(%job_id, error = %e, "Status poll task failed");
                            JobEventKind::PollFailed(format!("status task failed: {}", e))
                        }
                    };
                    self.send(kind);
                }

                // At most one status request in flight.
                _ = ticker.tick(), if poll.is_none() => {
                    let backend = Arc::clone(&self.backend);
                    poll = Some(tokio::spawn(async move { backend.get_processing_status().await }));
                }
            }
        }
    }

    fn send(&self, kind: JobEventKind) {
        let _ = self.tx.send(JobEvent {
            job_id: self.job_id,
            kind,
        });
    }
}

async fn wait_poll(
    poll: &mut Option<PollHandle>,
) -> Result<Result<ProgressStatus, EngineError>, tokio::task::JoinError> {
    match poll {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn abort_poll(poll: &mut Option<PollHandle>) {
    if let Some(handle) = poll.take() {
        handle.abort();
    }
}

/// Turn a resolved submission into the outcome shown to the user, saving the
/// workbook through `sink` when the response carries one.
pub fn deliver_result(result: Result<ReportResult, String>, sink: &dyn ArtifactSink) -> JobOutcome {
    let result = match result {
        Ok(result) => result,
        Err(cause) => {
            return JobOutcome::Failed {
                message: format!("Error while generating the report: {}", cause),
            }
        }
    };

    if !result.success {
        return JobOutcome::Failed {
            message: non_empty(result.message)
                .unwrap_or_else(|| "Report generation failed".to_string()),
        };
    }

    match (non_empty(result.filename), non_empty(result.filedata)) {
        (Some(filename), Some(filedata)) => match save_payload(&filename, &filedata, sink) {
            Ok(Some(path)) => JobOutcome::Saved {
                path,
                message: non_empty(result.message)
                    .unwrap_or_else(|| format!("File {} is ready", filename)),
            },
            Ok(None) => JobOutcome::Completed {
                message: format!("Report {} was not saved", filename),
            },
            Err(e) => {
                tracing::error!(%filename, error = %e, "Failed to deliver report file");
                JobOutcome::Failed {
                    message: format!("Error while generating the report: {}", e),
                }
            }
        },
        _ => JobOutcome::Completed {
            message: non_empty(result.message).unwrap_or_else(|| "Report generated".to_string()),
        },
    }
}

fn save_payload(
    filename: &str,
    filedata: &str,
    sink: &dyn ArtifactSink,
) -> Result<Option<PathBuf>, EngineError> {
    let artifact = ReportArtifact::from_base64(filename, filedata)?;
    sink.save(&artifact)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Owns the job session of one UI and connects it to a backend and a sink.
pub struct JobController<B, S> {
    backend: Arc<B>,
    sink: S,
    session: JobSession,
    poll_interval: Duration,
    /// `settled` token of the most recent job.
    last_settled: Option<CancellationToken>,
}

impl<B, S> JobController<B, S>
where
    B: ReportBackend + 'static,
    S: ArtifactSink,
{
    pub fn new(backend: Arc<B>, sink: S, poll_interval: Duration) -> Self {
        JobController {
            backend,
            sink,
            session: JobSession::new(),
            poll_interval,
            last_settled: None,
        }
    }

    pub fn backend(&self) -> Arc<B> {
        Arc::clone(&self.backend)
    }

    pub fn session(&self) -> &JobSession {
        &self.session
    }

    pub fn is_processing(&self) -> bool {
        self.session.is_processing()
    }

    /// Submit a job; `None` if one is already processing.
    ///
    /// The slot is free as soon as a job is cancelled, but the new job only
    /// reaches the backend once the previous job's cancel request is done.
    pub fn submit(&mut self, params: ReportParams) -> Option<JobRun> {
        let backend = self.backend();
        let after = self.last_settled.clone();
        let run = submit(&mut self.session, backend, params, self.poll_interval, after)?;
        self.last_settled = Some(run.settled.clone());
        Some(run)
    }

    /// Cancel the active job. The session is free again when this returns;
    /// the backend is notified by the lifecycle task in the background.
    pub fn cancel(&mut self) -> Option<JobOutcome> {
        match self.session.cancel() {
            Ok(job_id) => {
                tracing::info!(%job_id, "Report generation cancelled");
                Some(JobOutcome::Cancelled {
                    message: "Report generation cancelled".to_string(),
                })
            }
            Err(_) => {
                tracing::debug!("Cancel ignored: no report is being generated");
                None
            }
        }
    }

    /// Apply one lifecycle event. Returns the outcome once the job ends.
    pub fn handle_event(&mut self, event: JobEvent) -> Option<JobOutcome> {
        if !self.session.is_current(event.job_id) {
            tracing::debug!(job_id = %event.job_id, "Ignoring event from a finished job");
            return None;
        }

        match event.kind {
            JobEventKind::Progress(status) => {
                if let Err(e) = self.session.record_progress(status) {
                    tracing::warn!(error = %e, "Progress not recorded");
                }
                None
            }
            JobEventKind::PollFailed(_) => {
                // Already logged by the poller; polling goes on.
                let _ = self.session.mark_polling();
                None
            }
            JobEventKind::Resolved(result) => Some(self.complete(Ok(result))),
            JobEventKind::SubmitFailed(cause) => Some(self.complete(Err(cause))),
            // The session was released by `cancel` before this could arrive.
            JobEventKind::Cancelled => None,
        }
    }

    fn complete(&mut self, result: Result<ReportResult, String>) -> JobOutcome {
        if let Err(e) = self.session.begin_completion() {
            tracing::warn!(error = %e, "Completion out of order");
        }
        let outcome = deliver_result(result, &self.sink);
        if let Err(e) = self.session.finish() {
            tracing::warn!(error = %e, "Session not released cleanly");
        }
        outcome
    }

    /// Consume events of `run` until the job ends or the channel closes.
    pub async fn drive(&mut self, run: &mut JobRun) -> Option<JobOutcome> {
        while let Some(event) = run.events.recv().await {
            if let Some(outcome) = self.handle_event(event) {
                return Some(outcome);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    const PAYLOAD: &str = "UEsDBA==";

    /// Sink that records save calls instead of touching the filesystem.
    struct RecordingSink {
        saved: Mutex<Vec<ReportArtifact>>,
        accept: bool,
    }

    impl RecordingSink {
        fn new() -> Self {
            RecordingSink {
                saved: Mutex::new(Vec::new()),
                accept: true,
            }
        }

        fn declining() -> Self {
            RecordingSink {
                saved: Mutex::new(Vec::new()),
                accept: false,
            }
        }

        fn filenames(&self) -> Vec<String> {
            self.saved.lock().unwrap().iter().map(|a| a.filename.clone()).collect()
        }
    }

    impl ArtifactSink for RecordingSink {
        fn save(&self, artifact: &ReportArtifact) -> Result<Option<PathBuf>, EngineError> {
            self.saved.lock().unwrap().push(artifact.clone());
            if self.accept {
                Ok(Some(PathBuf::from("/saved").join(&artifact.filename)))
            } else {
                Ok(None)
            }
        }
    }

    fn params() -> ReportParams {
        ReportParams {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            store_id: "store-1".to_string(),
            planning_days: 30,
            product_groups: vec!["g1".to_string()],
        }
    }

    fn params_for(store_id: &str) -> ReportParams {
        ReportParams {
            store_id: store_id.to_string(),
            ..params()
        }
    }

    fn ok_result(filename: Option<&str>, filedata: Option<&str>) -> ReportResult {
        ReportResult {
            success: true,
            message: None,
            filename: filename.map(str::to_string),
            filedata: filedata.map(str::to_string),
        }
    }

    fn controller(backend: Arc<MockBackend>) -> JobController<MockBackend, RecordingSink> {
        JobController::new(backend, RecordingSink::new(), Duration::from_millis(1000))
    }

    #[test]
    fn test_deliver_saves_file_once() {
        let sink = RecordingSink::new();
        let outcome = deliver_result(Ok(ok_result(Some("r.xlsx"), Some(PAYLOAD))), &sink);

        assert_eq!(
            outcome,
            JobOutcome::Saved {
                path: PathBuf::from("/saved/r.xlsx"),
                message: "File r.xlsx is ready".to_string(),
            }
        );
        assert_eq!(sink.filenames(), vec!["r.xlsx".to_string()]);
    }

    #[test]
    fn test_deliver_without_file_uses_backend_message() {
        let sink = RecordingSink::new();
        let mut result = ok_result(None, None);
        result.message = Some("Nothing to export".to_string());

        let outcome = deliver_result(Ok(result), &sink);

        assert_eq!(
            outcome,
            JobOutcome::Completed {
                message: "Nothing to export".to_string()
            }
        );
        assert!(sink.filenames().is_empty());
    }

    #[test]
    fn test_deliver_failure_never_saves() {
        let sink = RecordingSink::new();
        let result = ReportResult {
            success: false,
            message: None,
            filename: Some("r.xlsx".to_string()),
            filedata: Some(PAYLOAD.to_string()),
        };

        let outcome = deliver_result(Ok(result), &sink);

        assert_eq!(
            outcome,
            JobOutcome::Failed {
                message: "Report generation failed".to_string()
            }
        );
        assert!(sink.filenames().is_empty());
    }

    #[test]
    fn test_deliver_bad_payload_is_a_failure() {
        let sink = RecordingSink::new();
        let outcome = deliver_result(Ok(ok_result(Some("r.xlsx"), Some("%%%"))), &sink);

        assert!(matches!(outcome, JobOutcome::Failed { .. }));
        assert!(outcome.message().contains("decode"));
        assert!(sink.filenames().is_empty());
    }

    #[test]
    fn test_deliver_declined_save_is_not_a_failure() {
        let sink = RecordingSink::declining();
        let outcome = deliver_result(Ok(ok_result(Some("r.xlsx"), Some(PAYLOAD))), &sink);

        assert!(outcome.is_success());
        assert_eq!(outcome.message(), "Report r.xlsx was not saved");
    }

    #[test]
    fn test_deliver_transport_error() {
        let sink = RecordingSink::new();
        let outcome = deliver_result(Err("connection reset".to_string()), &sink);
        assert_eq!(
            outcome,
            JobOutcome::Failed {
                message: "Error while generating the report: connection reset".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_until_submission_resolves() {
        let backend = Arc::new(MockBackend::new());
        backend.push_status(Ok(ProgressStatus::new(0, 10)));
        backend.push_status(Ok(ProgressStatus::new(3, 10)));
        let release = backend.gate_report();

        let mut controller = controller(Arc::clone(&backend));
        let mut run = controller.submit(params()).expect("Submission should start");
        assert!(controller.is_processing());

        let first = run.events.recv().await.expect("Expected first poll");
        assert_eq!(first.kind, JobEventKind::Progress(ProgressStatus::new(0, 10)));
        assert!(controller.handle_event(first).is_none());

        let second = run.events.recv().await.expect("Expected second poll");
        assert_eq!(second.kind, JobEventKind::Progress(ProgressStatus::new(3, 10)));
        assert!(controller.handle_event(second).is_none());
        assert_eq!(controller.session().progress(), Some(ProgressStatus::new(3, 10)));
        assert_eq!(
            controller.session().progress().and_then(|p| p.percent()),
            Some(30)
        );

        release
            .send(Ok(ok_result(Some("r.xlsx"), Some(PAYLOAD))))
            .expect("Failed to release report");

        let outcome = controller.drive(&mut run).await.expect("Expected an outcome");
        assert!(matches!(outcome, JobOutcome::Saved { .. }));
        assert!(!controller.is_processing());
        assert_eq!(controller.sink.filenames(), vec!["r.xlsx".to_string()]);

        // The lifecycle task stops polling once the submission resolved.
        run.handle.await.expect("Lifecycle task panicked");
        let polls = backend.count("get_processing_status");
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(backend.count("get_processing_status"), polls);
        assert!(run.events.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_submission_is_a_no_op() {
        let backend = Arc::new(MockBackend::new());
        let _release = backend.gate_report();
        let mut controller = controller(Arc::clone(&backend));

        let run = controller.submit(params()).expect("Submission should start");
        tokio::task::yield_now().await;
        let phase_before = controller.session().phase();

        assert!(controller.submit(params()).is_none());

        tokio::task::yield_now().await;
        assert_eq!(controller.session().phase(), phase_before);
        assert_eq!(controller.session().job_id(), Some(run.job_id));
        assert_eq!(backend.count("generate_report"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_resets_session_without_saving() {
        let backend = Arc::new(MockBackend::new());
        let release = backend.gate_report();
        let mut controller = controller(Arc::clone(&backend));
        let mut run = controller.submit(params()).expect("Submission should start");

        release
            .send(Ok(ReportResult {
                success: false,
                message: Some("No data for the selected period".to_string()),
                filename: None,
                filedata: None,
            }))
            .expect("Failed to release report");

        let outcome = controller.drive(&mut run).await.expect("Expected an outcome");
        assert_eq!(
            outcome,
            JobOutcome::Failed {
                message: "No data for the selected period".to_string()
            }
        );
        assert!(!controller.is_processing());
        assert!(controller.sink.filenames().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_submission_error_resets_session() {
        let backend = Arc::new(MockBackend::new());
        let release = backend.gate_report();
        let mut controller = controller(Arc::clone(&backend));
        let mut run = controller.submit(params()).expect("Submission should start");

        release.send(Err("backend crashed".to_string())).expect("Failed to release report");

        let outcome = controller.drive(&mut run).await.expect("Expected an outcome");
        assert!(matches!(outcome, JobOutcome::Failed { .. }));
        assert!(outcome.message().contains("backend crashed"));
        assert!(!controller.is_processing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_do_not_stop_polling() {
        let backend = Arc::new(MockBackend::new());
        backend.push_status(Err("status unavailable".to_string()));
        backend.push_status(Ok(ProgressStatus::new(1, 2)));
        let release = backend.gate_report();
        let mut controller = controller(Arc::clone(&backend));
        let mut run = controller.submit(params()).expect("Submission should start");

        let first = run.events.recv().await.expect("Expected first poll");
        assert!(matches!(first.kind, JobEventKind::PollFailed(_)));
        assert!(controller.handle_event(first).is_none());
        assert!(controller.is_processing());

        let second = run.events.recv().await.expect("Expected second poll");
        assert_eq!(second.kind, JobEventKind::Progress(ProgressStatus::new(1, 2)));
        controller.handle_event(second);

        release.send(Ok(ok_result(None, None))).expect("Failed to release report");
        let outcome = controller.drive(&mut run).await.expect("Expected an outcome");
        assert_eq!(
            outcome,
            JobOutcome::Completed {
                message: "Report generated".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_releases_session_immediately() {
        let backend = Arc::new(MockBackend::new());
        let _release = backend.gate_report();
        let mut controller = controller(Arc::clone(&backend));
        let mut run = controller.submit(params()).expect("Submission should start");

        let first = run.events.recv().await.expect("Expected first poll");
        controller.handle_event(first);

        let outcome = controller.cancel().expect("Expected a cancel outcome");
        assert_eq!(outcome.message(), "Report generation cancelled");
        assert!(!controller.is_processing());

        // Remaining events are from the cancelled job and change nothing.
        while let Some(event) = run.events.recv().await {
            assert!(controller.handle_event(event).is_none());
        }
        run.handle.await.expect("Lifecycle task panicked");

        assert_eq!(backend.count("cancel_processing"), 1);
        let polls = backend.count("get_processing_status");
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(backend.count("get_processing_status"), polls);
        assert!(controller.sink.filenames().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_then_resubmit() {
        let backend = Arc::new(MockBackend::new());
        let _first_gate = backend.gate_report();
        let mut controller = controller(Arc::clone(&backend));
        let mut first = controller.submit(params()).expect("Submission should start");

        controller.cancel().expect("Expected a cancel outcome");
        let second = controller.submit(params()).expect("Slot should be free after cancel");
        assert_ne!(first.job_id, second.job_id);

        // The old job's Cancelled event is stale for the new session.
        while let Some(event) = first.events.recv().await {
            assert_eq!(event.job_id, first.job_id);
            assert!(controller.handle_event(event).is_none());
        }
        assert!(controller.is_processing());
        assert!(controller.session().is_current(second.job_id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_waits_one_interval() {
        let backend = Arc::new(MockBackend::new());
        let _release = backend.gate_report();
        let mut controller = controller(Arc::clone(&backend));
        let started = tokio::time::Instant::now();
        let mut run = controller.submit(params()).expect("Submission should start");

        run.events.recv().await.expect("Expected first poll");

        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert_eq!(backend.count("get_processing_status"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_status_does_not_hold_back_resolution() {
        let mut backend = MockBackend::new();
        backend.status_delay = Duration::from_secs(25);
        let backend = Arc::new(backend);
        let release = backend.gate_report();
        let mut controller = controller(Arc::clone(&backend));
        let started = tokio::time::Instant::now();
        let mut run = controller.submit(params()).expect("Submission should start");

        // The first status request is in flight from 1s on.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        release.send(Ok(ok_result(None, None))).expect("Failed to release report");

        let outcome = controller.drive(&mut run).await.expect("Expected an outcome");
        assert_eq!(
            outcome,
            JobOutcome::Completed {
                message: "Report generated".to_string()
            }
        );
        assert!(started.elapsed() < Duration::from_secs(2), "elapsed {:?}", started.elapsed());

        run.handle.await.expect("Lifecycle task panicked");
        assert_eq!(backend.count("get_processing_status"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubmit_waits_for_previous_cancel_request() {
        let mut backend = MockBackend::new();
        backend.cancel_delay = Duration::from_millis(50);
        let backend = Arc::new(backend);
        let _first_gate = backend.gate_report();
        let mut controller = controller(Arc::clone(&backend));

        let _first = controller.submit(params_for("first")).expect("Submission should start");
        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.cancel().expect("Expected a cancel outcome");

        let mut second = controller
            .submit(params_for("second"))
            .expect("Slot should be free after cancel");
        assert!(controller.is_processing());

        let outcome = controller.drive(&mut second).await.expect("Expected an outcome");
        assert!(outcome.is_success());

        let calls: Vec<String> = backend
            .calls()
            .into_iter()
            .filter(|c| c != "get_processing_status")
            .collect();
        assert_eq!(
            calls,
            vec![
                "generate_report(first)",
                "cancel_processing",
                "generate_report(second)",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_waiting_for_previous_job() {
        let mut backend = MockBackend::new();
        backend.cancel_delay = Duration::from_millis(50);
        let backend = Arc::new(backend);
        let _first_gate = backend.gate_report();
        let mut controller = controller(Arc::clone(&backend));

        let _first = controller.submit(params_for("first")).expect("Submission should start");
        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.cancel().expect("Expected a cancel outcome");
        let mut second = controller
            .submit(params_for("second"))
            .expect("Slot should be free after cancel");
        controller.cancel().expect("Expected a cancel outcome");

        while let Some(event) = second.events.recv().await {
            assert_eq!(event.kind, JobEventKind::Cancelled);
        }
        assert_eq!(backend.count("generate_report"), 1);
        assert!(!controller.is_processing());
    }

    #[test]
    fn test_cancel_when_idle_is_ignored() {
        let backend = Arc::new(MockBackend::new());
        let mut controller = controller(backend);
        assert!(controller.cancel().is_none());
    }
}
