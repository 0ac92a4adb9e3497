//! The session: working set + analysis request state machine.
//!
//! ```text
//!            submit                 analyze Ok / Err
//!   idle ───────────▶ running ───────────────────────▶ succeeded | failed
//!    ▲                   │                                   │
//!    └──── reset ────────┴───────────── reset ───────────────┘
//!                        (a new submit from a terminal state re-enters running)
//! ```
//!
//! All state sits behind one `parking_lot::Mutex` that is never held across
//! an `.await` and never held while the observer is called. Every submission
//! gets a fresh generation number; an analyze call that returns after a reset
//! or a newer submission no longer matches and its outcome is dropped.
//!
//! Progress animations run as spawned tasks holding a `Weak` reference to the
//! session. Their handles live next to what they animate, so removing a file
//! or finishing a request cancels the matching timer.

use crate::analyze::Analyzer;
use crate::config::SessionConfig;
use crate::error::{AnalysisError, IntakeError, ScanError, SubmitBlock, ANALYSIS_FAILED_MESSAGE};
use crate::export;
use crate::file::{FileId, FileItem, FileSummary, RawFile};
use crate::intake::FileIntake;
use crate::observer::SessionObserver;
use crate::pipeline::input;
use crate::progress::{ProgressHandle, ProgressSimulator};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Where an analysis request stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnalysisStatus {
    Idle,
    Running,
    Succeeded { result: String },
    Failed { message: String },
}

impl AnalysisStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }
}

/// The current (or last) analysis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Increases with every submission.
    pub generation: u64,
    pub prompt: String,
    /// The first file of the working set at submission time.
    pub target: Option<FileId>,
    pub status: AnalysisStatus,
    /// Simulated progress, 0–100.
    pub progress: u8,
}

impl AnalysisRequest {
    fn idle(generation: u64) -> Self {
        Self {
            generation,
            prompt: String::new(),
            target: None,
            status: AnalysisStatus::Idle,
            progress: 0,
        }
    }

    /// The result text, when the request succeeded.
    pub fn result(&self) -> Option<&str> {
        match &self.status {
            AnalysisStatus::Succeeded { result } => Some(result),
            _ => None,
        }
    }

    /// The user-facing failure message, when the request failed.
    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            AnalysisStatus::Failed { message } => Some(message),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == AnalysisStatus::Running
    }
}

/// What one admission batch did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmitReport {
    /// Ids of the files that joined the working set, in input order.
    pub admitted: Vec<FileId>,
    /// Candidates turned away: media-type rejections first, then intake
    /// rejections, each group in input order.
    pub rejected: Vec<IntakeError>,
}

/// Serialisable view of a whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub files: Vec<FileSummary>,
    pub request: AnalysisRequest,
    pub error: Option<String>,
    pub max_files: usize,
    pub max_size_mb: u64,
}

struct Slot {
    item: FileItem,
    /// Held so that dropping the slot cancels its upload animation.
    _upload: ProgressHandle,
}

struct SessionState {
    files: Vec<Slot>,
    next_id: u64,
    generation: u64,
    request: AnalysisRequest,
    analysis_progress: Option<ProgressHandle>,
    last_error: Option<String>,
}

struct Inner {
    config: SessionConfig,
    intake: FileIntake,
    analyzer: Arc<dyn Analyzer>,
    state: Mutex<SessionState>,
}

impl Inner {
    fn observer(&self) -> Option<&dyn SessionObserver> {
        self.config.observer.as_deref()
    }

    /// Apply the outcome of analysis `generation`, or discard it when the
    /// session was reset or resubmitted meanwhile. Returns the request as it
    /// stands afterwards.
    fn finish_analysis(
        &self,
        generation: u64,
        target: &FileSummary,
        outcome: Result<String, AnalysisError>,
    ) -> AnalysisRequest {
        let (request, detail) = {
            let mut state = self.state.lock();
            if state.request.generation != generation || !state.request.is_running() {
                debug!("Analysis #{} finished after reset; outcome discarded", generation);
                return state.request.clone();
            }

            state.analysis_progress = None;
            state.request.progress = 100;
            let detail = match outcome {
                Ok(result) => {
                    state.request.status = AnalysisStatus::Succeeded { result };
                    None
                }
                Err(e) => {
                    let detail = e.to_string();
                    warn!("Analysis #{} failed: {}", generation, detail);
                    state.request.status = AnalysisStatus::Failed {
                        message: ANALYSIS_FAILED_MESSAGE.to_string(),
                    };
                    state.last_error = Some(ANALYSIS_FAILED_MESSAGE.to_string());
                    if let Some(slot) = state.files.iter_mut().find(|s| s.item.id() == target.id) {
                        slot.item.error = Some(detail.clone());
                    }
                    Some(detail)
                }
            };
            (state.request.clone(), detail)
        };

        if let Some(observer) = self.observer() {
            match (&request.status, &detail) {
                (AnalysisStatus::Succeeded { result }, _) => observer.on_analysis_complete(result),
                (AnalysisStatus::Failed { message }, Some(detail)) => {
                    observer.on_analysis_failed(message, detail)
                }
                _ => {}
            }
        }
        request
    }
}

/// Handle to one upload-and-analyse session. Cheap to clone; clones share
/// state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Session")
            .field("files", &state.files.len())
            .field("request", &state.request)
            .field("last_error", &state.last_error)
            .finish()
    }
}

impl Session {
    pub fn new(config: SessionConfig, analyzer: Arc<dyn Analyzer>) -> Self {
        let intake = FileIntake::new(&config);
        Self {
            inner: Arc::new(Inner {
                config,
                intake,
                analyzer,
                state: Mutex::new(SessionState {
                    files: Vec::new(),
                    next_id: 0,
                    generation: 0,
                    request: AnalysisRequest::idle(0),
                    analysis_progress: None,
                    last_error: None,
                }),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    // ── Working set ──────────────────────────────────────────────────────

    /// Admit a batch of dropped or selected files.
    ///
    /// Clears the current error first. Candidates whose media type is not in
    /// the accept set are rejected here; the rest go through intake. Files
    /// beyond the working-set cap are dropped without an error.
    pub async fn admit(&self, candidates: Vec<RawFile>) -> AdmitReport {
        self.inner.state.lock().last_error = None;

        let mut report = AdmitReport::default();
        let mut accepted = Vec::with_capacity(candidates.len());
        for file in candidates {
            if self.inner.config.accept.accepts(&file) {
                accepted.push(file);
            } else {
                debug!("'{}' rejected: type '{}' not accepted", file.name(), file.media_type());
                report.rejected.push(IntakeError::UnsupportedType {
                    name: file.name().to_string(),
                    media_type: file.media_type().to_string(),
                });
            }
        }

        let current_len = self.inner.state.lock().files.len();
        let outcome = if accepted.is_empty() {
            Default::default()
        } else {
            self.inner.intake.admit(accepted, current_len).await
        };
        report
            .rejected
            .extend(outcome.rejections.into_iter().map(|r| r.error));

        let upload = ProgressSimulator::new(
            self.inner.config.upload_interval(),
            self.inner.config.progress_step,
        );
        let mut admitted = Vec::new();
        {
            let mut state = self.inner.state.lock();
            for admission in outcome.admitted {
                if state.files.len() >= self.inner.config.max_files {
                    debug!("'{}' dropped: working set filled meanwhile", admission.original_name);
                    continue;
                }
                let id = FileId(state.next_id);
                state.next_id += 1;
                let item = FileItem::new(id, admission.original_name, admission.file, admission.preview);
                admitted.push(item.summary());
                let handle = self.start_upload(&upload, id);
                state.files.push(Slot {
                    item,
                    _upload: handle,
                });
            }
            if let Some(last) = report.rejected.last() {
                state.last_error = Some(last.to_string());
            }
        }

        report.admitted = admitted.iter().map(|s| s.id).collect();
        if let Some(observer) = self.inner.observer() {
            for error in &report.rejected {
                observer.on_file_rejected(error);
            }
            for summary in &admitted {
                observer.on_file_admitted(summary);
            }
        }
        info!(
            "Admitted {} file(s), rejected {}",
            report.admitted.len(),
            report.rejected.len()
        );
        report
    }

    /// Load paths or URLs and admit them as one batch.
    pub async fn admit_inputs<S: AsRef<str>>(&self, inputs: &[S]) -> Result<AdmitReport, ScanError> {
        let timeout = self.inner.config.download_timeout_secs;
        let files = futures::future::try_join_all(
            inputs
                .iter()
                .map(|s| input::resolve_input(s.as_ref(), timeout)),
        )
        .await?;
        Ok(self.admit(files).await)
    }

    /// Remove a file and cancel its upload animation. Returns the remaining
    /// working set. Unknown ids are ignored.
    pub fn remove(&self, id: FileId) -> Vec<FileSummary> {
        let (removed, remaining) = {
            let mut state = self.inner.state.lock();
            let removed = state
                .files
                .iter()
                .position(|s| s.item.id() == id)
                .map(|pos| state.files.remove(pos));
            if removed.is_some() {
                state.last_error = None;
            }
            let remaining: Vec<FileSummary> = state.files.iter().map(|s| s.item.summary()).collect();
            (removed, remaining)
        };

        if let Some(slot) = removed {
            let summary = slot.item.summary();
            drop(slot);
            debug!("Removed {} '{}'", id, summary.name);
            if let Some(observer) = self.inner.observer() {
                observer.on_file_removed(&summary);
            }
        }
        remaining
    }

    /// The working set, in admission order.
    pub fn files(&self) -> Vec<FileSummary> {
        self.inner
            .state
            .lock()
            .files
            .iter()
            .map(|s| s.item.summary())
            .collect()
    }

    pub fn file(&self, id: FileId) -> Option<FileItem> {
        self.inner
            .state
            .lock()
            .files
            .iter()
            .find(|s| s.item.id() == id)
            .map(|s| s.item.clone())
    }

    /// The most recent user-visible error.
    pub fn last_error(&self) -> Option<String> {
        self.inner.state.lock().last_error.clone()
    }

    // ── Analysis ─────────────────────────────────────────────────────────

    pub fn request(&self) -> AnalysisRequest {
        self.inner.state.lock().request.clone()
    }

    /// Whether `submit(prompt)` would be accepted right now.
    pub fn can_submit(&self, prompt: &str) -> Result<(), SubmitBlock> {
        submit_block(&self.inner.state.lock(), prompt)
    }

    /// Run the analyzer on the first file of the working set.
    ///
    /// Returns the request as it stands when the call completes: `succeeded`
    /// or `failed` normally, or the current state when the session was reset
    /// or resubmitted in the meantime. An analyzer failure is not an `Err`;
    /// it is a `failed` request.
    ///
    /// Dropping the returned future does not cancel the call: the request
    /// still reaches `succeeded` or `failed` on its own.
    pub async fn submit(&self, prompt: &str) -> Result<AnalysisRequest, ScanError> {
        let (generation, payload, target) = {
            let mut state = self.inner.state.lock();
            submit_block(&state, prompt).map_err(ScanError::SubmitDisabled)?;

            state.generation += 1;
            let generation = state.generation;
            state.last_error = None;
            for slot in state.files.iter_mut() {
                slot.item.error = None;
            }

            let first = &state.files[0].item;
            let payload = first.payload().clone();
            let target = first.summary();

            state.request = AnalysisRequest {
                generation,
                prompt: prompt.to_string(),
                target: Some(target.id),
                status: AnalysisStatus::Running,
                progress: 0,
            };
            state.analysis_progress = Some(self.start_analysis_progress(generation));
            (generation, payload, target)
        };

        info!("Analysis #{} started on '{}'", generation, target.name);
        if let Some(observer) = self.inner.observer() {
            observer.on_analysis_start(&target);
        }

        // The call runs on its own task so that dropping this future does
        // not strand the request in `running`.
        let inner = Arc::clone(&self.inner);
        let task_prompt = prompt.to_string();
        let task_target = target.clone();
        let call = tokio::spawn(async move {
            let outcome = inner.analyzer.analyze(&task_prompt, &payload).await;
            inner.finish_analysis(generation, &task_target, outcome)
        });

        match call.await {
            Ok(request) => Ok(request),
            Err(e) => {
                error!("Analysis #{} task aborted: {}", generation, e);
                let outcome = Err(AnalysisError::Internal(format!("analysis task aborted: {}", e)));
                Ok(self.inner.finish_analysis(generation, &target, outcome))
            }
        }
    }

    /// Dismiss the result: clear the prompt, the result and the working set,
    /// cancel every animation and return to `idle`. Calling it twice has the
    /// same effect as calling it once.
    pub fn reset(&self) {
        let changed = {
            let mut state = self.inner.state.lock();
            let changed = state.request.status != AnalysisStatus::Idle
                || !state.files.is_empty()
                || state.last_error.is_some();
            if state.request.status != AnalysisStatus::Idle {
                state.generation += 1;
            }
            state.files.clear();
            state.analysis_progress = None;
            state.last_error = None;
            state.request = AnalysisRequest::idle(state.generation);
            changed
        };

        if changed {
            info!("Session reset");
            if let Some(observer) = self.inner.observer() {
                observer.on_reset();
            }
        }
    }

    // ── Result ───────────────────────────────────────────────────────────

    /// Text to put on the clipboard: the result, verbatim.
    pub fn clipboard_text(&self) -> Option<String> {
        self.inner.state.lock().request.result().map(str::to_string)
    }

    /// Write the result to `dir/analysis-result.txt`.
    pub async fn export_result(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ScanError> {
        let text = self.clipboard_text().ok_or(ScanError::NoResult)?;
        export::write_result(dir.as_ref(), &text).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.state.lock();
        SessionSnapshot {
            files: state.files.iter().map(|s| s.item.summary()).collect(),
            request: state.request.clone(),
            error: state.last_error.clone(),
            max_files: self.inner.config.max_files,
            max_size_mb: self.inner.config.max_size_mb,
        }
    }

    // ── Animations ───────────────────────────────────────────────────────

    fn start_upload(&self, sim: &ProgressSimulator, id: FileId) -> ProgressHandle {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        sim.start(move |value| {
            let Some(inner) = weak.upgrade() else {
                return false;
            };
            let alive = {
                let mut state = inner.state.lock();
                match state.files.iter_mut().find(|s| s.item.id() == id) {
                    Some(slot) => {
                        slot.item.advance(value);
                        true
                    }
                    None => false,
                }
            };
            if alive {
                if let Some(observer) = inner.observer() {
                    observer.on_upload_progress(id, value);
                }
            }
            alive
        })
    }

    fn start_analysis_progress(&self, generation: u64) -> ProgressHandle {
        let sim = ProgressSimulator::new(
            self.inner.config.analysis_interval(),
            self.inner.config.progress_step,
        );
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        sim.start(move |value| {
            let Some(inner) = weak.upgrade() else {
                return false;
            };
            let alive = {
                let mut state = inner.state.lock();
                let request = &mut state.request;
                if request.generation == generation && request.is_running() {
                    request.progress = request.progress.max(value);
                    true
                } else {
                    false
                }
            };
            if alive {
                if let Some(observer) = inner.observer() {
                    observer.on_analysis_progress(value);
                }
            }
            alive
        })
    }
}

fn submit_block(state: &SessionState, prompt: &str) -> Result<(), SubmitBlock> {
    if prompt.trim().is_empty() {
        return Err(SubmitBlock::EmptyPrompt);
    }
    if state.files.is_empty() {
        return Err(SubmitBlock::NoFile);
    }
    if state.request.is_running() {
        return Err(SubmitBlock::AlreadyRunning);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use async_trait::async_trait;

    struct Fixed(&'static str);

    #[async_trait]
    impl Analyzer for Fixed {
        async fn analyze(&self, _prompt: &str, _file: &RawFile) -> Result<String, AnalysisError> {
            Ok(self.0.to_string())
        }
    }

    fn session() -> Session {
        Session::new(SessionConfig::default(), Arc::new(Fixed("ok")))
    }

    #[test]
    fn idle_request_has_no_result() {
        let r = AnalysisRequest::idle(3);
        assert_eq!(r.generation, 3);
        assert!(r.result().is_none());
        assert!(r.error_message().is_none());
        assert!(!r.status.is_terminal());
    }

    #[test]
    fn status_serialises_with_tag() {
        let s = AnalysisStatus::Succeeded {
            result: "text".into(),
        };
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["state"], "succeeded");
        assert_eq!(json["result"], "text");
    }

    #[tokio::test]
    async fn submit_checks_preconditions_in_order() {
        let s = session();
        assert_eq!(s.can_submit("  "), Err(SubmitBlock::EmptyPrompt));
        assert_eq!(s.can_submit("describe"), Err(SubmitBlock::NoFile));

        s.admit(vec![RawFile::new("a.pdf", "application/pdf", vec![1u8])]).await;
        assert_eq!(s.can_submit("describe"), Ok(()));
    }

    #[tokio::test]
    async fn removing_unknown_id_is_a_no_op() {
        let s = session();
        s.admit(vec![RawFile::new("a.pdf", "application/pdf", vec![1u8])]).await;
        let remaining = s.remove(FileId(99));
        assert_eq!(remaining.len(), 1);
    }
}
