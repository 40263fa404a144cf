//! State machine behind the assign / recurring / copy dialogs.
//!
//! `Idle → Submitting → {Succeeded, Partial, Failed} → Idle`. A dialog
//! sends at most one request at a time, and a response that arrives after the
//! dialog was closed is dropped without touching its state.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    error::{ClientError, Result},
    lifetime::{Lifetime, LifetimeToken},
    models::schedule::BulkOperationResponse,
    scheduling::{
        builder::ScheduleSubmission,
        outcome::{Banner, Classification},
    },
};

/// Backend seam for schedule writes.
#[async_trait]
pub trait ScheduleService: Send + Sync {
    async fn submit(&self, submission: &ScheduleSubmission) -> Result<BulkOperationResponse>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogKind {
    Assign,
    Recurring,
    Copy,
}

impl DialogKind {
    /// How long a success banner stays up before the dialog closes itself.
    pub fn auto_close_delay(self) -> Duration {
        match self {
            DialogKind::Assign | DialogKind::Recurring => Duration::from_millis(1500),
            DialogKind::Copy => Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DialogState {
    Idle,
    Submitting,
    Succeeded(Banner),
    Partial(Banner),
    Failed(Banner),
}

impl DialogState {
    pub fn banner(&self) -> Option<&Banner> {
        match self {
            DialogState::Succeeded(b) | DialogState::Partial(b) | DialogState::Failed(b) => Some(b),
            DialogState::Idle | DialogState::Submitting => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, DialogState::Submitting)
    }
}

type RefreshFn = Box<dyn Fn() + Send + Sync>;

/// Holds a dialog in `Submitting` and puts it back to `Idle` if the submission
/// ends without a result, including when its future is dropped.
struct Pending<'a> {
    state: &'a mut DialogState,
}

impl<'a> Pending<'a> {
    fn enter(state: &'a mut DialogState) -> Self {
        *state = DialogState::Submitting;
        Self { state }
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if self.state.is_loading() {
            *self.state = DialogState::Idle;
        }
    }
}

/// Closes a dialog from outside the task awaiting its submission.
#[derive(Clone)]
pub struct CloseHandle {
    lifetime: Arc<Lifetime>,
}

impl CloseHandle {
    pub fn close(&self) {
        self.lifetime.end();
    }
}

pub struct ScheduleDialog<S> {
    kind: DialogKind,
    service: Arc<S>,
    state: DialogState,
    lifetime: Arc<Lifetime>,
    on_refresh: RefreshFn,
}

impl<S: ScheduleService> ScheduleDialog<S> {
    /// Opens a dialog. `on_refresh` runs once per submission that classifies
    /// as succeeded, so the parent view can reload.
    pub fn open(kind: DialogKind, service: Arc<S>, on_refresh: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            kind,
            service,
            state: DialogState::Idle,
            lifetime: Arc::new(Lifetime::new()),
            on_refresh: Box::new(on_refresh),
        }
    }

    pub fn kind(&self) -> DialogKind {
        self.kind
    }

    pub fn state(&self) -> &DialogState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        !self.lifetime.is_ended()
    }

    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            lifetime: self.lifetime.clone(),
        }
    }

    /// Closing resets the state; any in-flight response is discarded.
    pub fn close(&mut self) {
        self.lifetime.end();
        self.state = DialogState::Idle;
    }

    /// Reopens a closed dialog with a fresh lifetime.
    pub fn reopen(&mut self) {
        self.lifetime = Arc::new(Lifetime::new());
        self.state = DialogState::Idle;
    }

    /// Delay after which a caller should close the dialog, if the last
    /// submission succeeded.
    pub fn auto_close_after(&self) -> Option<Duration> {
        match self.state {
            DialogState::Succeeded(_) => Some(self.kind.auto_close_delay()),
            _ => None,
        }
    }

    /// Local validation failures surface as a failed banner without any
    /// network traffic.
    pub fn reject(&mut self, err: &ClientError) -> &DialogState {
        self.state = DialogState::Failed(Banner::error(err.user_message()));
        &self.state
    }

    /// Sends one submission and moves to the resulting state.
    ///
    /// Errors only when the dialog cannot accept a submission right now
    /// (closed, or already submitting); backend and transport failures land in
    /// [`DialogState::Failed`].
    pub async fn submit(&mut self, submission: ScheduleSubmission) -> Result<&DialogState> {
        if !self.is_open() {
            return Err(ClientError::Cancelled);
        }
        if self.state.is_loading() {
            return Err(ClientError::InvalidInput("A submission is already in progress".into()));
        }

        let mut pending = Pending::enter(&mut self.state);
        tracing::debug!(kind = ?self.kind, endpoint = submission.endpoint(), "Submitting schedule change");

        let mut token: LifetimeToken = self.lifetime.token();
        let service = self.service.clone();
        let response = tokio::select! {
            res = service.submit(&submission) => Some(res),
            _ = token.ended() => None,
        };

        let Some(response) = response else {
            tracing::debug!(kind = ?self.kind, "Dialog closed before the response arrived; discarding it");
            return Err(ClientError::Cancelled);
        };

        let next = match response {
            Ok(resp) => {
                let banner = Banner::from_response(&resp);
                match resp.classify() {
                    Classification::Succeeded => {
                        tracing::info!(
                            success = resp.success_count,
                            skipped = resp.skipped_count,
                            "Schedule change applied"
                        );
                        (self.on_refresh)();
                        DialogState::Succeeded(banner)
                    }
                    Classification::Partial => {
                        tracing::warn!(
                            success = resp.success_count,
                            errors = resp.error_count,
                            "Schedule change partially applied"
                        );
                        DialogState::Partial(banner)
                    }
                    Classification::Failed => {
                        tracing::warn!(errors = resp.error_count, "Schedule change rejected");
                        DialogState::Failed(banner)
                    }
                }
            }
            Err(ClientError::Unauthorized) => return Err(ClientError::Unauthorized),
            Err(e) => {
                tracing::warn!(error = %e, "Schedule change failed");
                DialogState::Failed(Banner::error(e.user_message()))
            }
        };
        *pending.state = next;
        drop(pending);
        Ok(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::schedule::{ConflictAction, ConflictInfo, ShiftType},
        scheduling::{builder::AssignDraft, outcome::Severity},
    };
    use reqwest::StatusCode;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };
    use time::macros::date;

    enum Reply {
        Ok(BulkOperationResponse),
        Err(u16),
        Hang,
        HangOnce(BulkOperationResponse),
    }

    struct FakeService {
        reply: Reply,
        calls: Mutex<Vec<ScheduleSubmission>>,
    }

    impl FakeService {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ScheduleService for FakeService {
        async fn submit(&self, submission: &ScheduleSubmission) -> Result<BulkOperationResponse> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(submission.clone());
                calls.len()
            };
            match &self.reply {
                Reply::Ok(resp) => Ok(resp.clone()),
                Reply::Err(401) => Err(ClientError::Unauthorized),
                Reply::Err(code) => Err(ClientError::Api {
                    status: StatusCode::from_u16(*code).unwrap(),
                    message: "Doctor not found".into(),
                }),
                Reply::Hang => std::future::pending().await,
                Reply::HangOnce(_) if call == 1 => std::future::pending().await,
                Reply::HangOnce(resp) => Ok(resp.clone()),
            }
        }
    }

    fn counts(success: u32, errors: u32) -> BulkOperationResponse {
        BulkOperationResponse {
            success: errors == 0,
            success_count: success,
            error_count: errors,
            conflicts: vec![ConflictInfo {
                date: "2025-07-12".into(),
                staff_id: 1,
                staff_name: Some("A".into()),
                shift_type: Some("MORNING".into()),
                existing_shift_info: "Already assigned".into(),
            }],
            message: "processed".into(),
            ..BulkOperationResponse::default()
        }
    }

    fn bulk_submission() -> ScheduleSubmission {
        let mut draft = AssignDraft {
            staff_id: Some(1),
            shift_type: ShiftType::Morning,
            conflict_action: ConflictAction::Skip,
            ..AssignDraft::default()
        };
        let today = date!(2025 - 07 - 01);
        draft.dates.add(date!(2025 - 07 - 10), today).unwrap();
        draft.dates.add(date!(2025 - 07 - 12), today).unwrap();
        draft.build().unwrap()
    }

    fn counting_refresh() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn success_refreshes_once_and_schedules_auto_close() {
        let service = FakeService::new(Reply::Ok(counts(2, 0)));
        let (refreshes, on_refresh) = counting_refresh();
        let mut dialog = ScheduleDialog::open(DialogKind::Assign, service.clone(), on_refresh);

        let state = dialog.submit(bulk_submission()).await.unwrap();
        assert!(matches!(state, DialogState::Succeeded(b) if b.severity == Severity::Success));
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(service.calls.lock().unwrap().len(), 1);
        assert_eq!(dialog.auto_close_after(), Some(Duration::from_millis(1500)));
    }

    #[tokio::test]
    async fn partial_result_keeps_dialog_open_without_refresh() {
        let service = FakeService::new(Reply::Ok(counts(1, 1)));
        let (refreshes, on_refresh) = counting_refresh();
        let mut dialog = ScheduleDialog::open(DialogKind::Recurring, service, on_refresh);

        let state = dialog.submit(bulk_submission()).await.unwrap();
        assert!(matches!(state, DialogState::Partial(b) if b.conflicts.len() == 1));
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(dialog.auto_close_after(), None);
        assert!(dialog.is_open());
    }

    #[tokio::test]
    async fn transport_failure_allows_retry() {
        let service = FakeService::new(Reply::Err(500));
        let (refreshes, on_refresh) = counting_refresh();
        let mut dialog = ScheduleDialog::open(DialogKind::Copy, service.clone(), on_refresh);

        let state = dialog.submit(bulk_submission()).await.unwrap();
        assert!(matches!(state, DialogState::Failed(b) if b.message == "Doctor not found"));

        dialog.submit(bulk_submission()).await.unwrap();
        assert_eq!(service.calls.lock().unwrap().len(), 2);
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unauthorized_propagates_to_caller() {
        let service = FakeService::new(Reply::Err(401));
        let (_, on_refresh) = counting_refresh();
        let mut dialog = ScheduleDialog::open(DialogKind::Assign, service, on_refresh);

        let err = dialog.submit(bulk_submission()).await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(dialog.state(), &DialogState::Idle);
    }

    #[tokio::test]
    async fn closing_mid_request_discards_response() {
        let service = FakeService::new(Reply::Hang);
        let (refreshes, on_refresh) = counting_refresh();
        let mut dialog = ScheduleDialog::open(DialogKind::Assign, service, on_refresh);

        let handle = dialog.close_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.close();
        });

        let err = dialog.submit(bulk_submission()).await.unwrap_err();
        assert!(matches!(err, ClientError::Cancelled));
        assert_eq!(dialog.state(), &DialogState::Idle);
        assert!(!dialog.is_open());
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);

        // a closed dialog refuses new work until reopened
        assert!(dialog.submit(bulk_submission()).await.is_err());
        dialog.reopen();
        assert!(dialog.is_open());
    }

    #[tokio::test]
    async fn abandoned_submission_can_be_retried() {
        let service = FakeService::new(Reply::HangOnce(counts(2, 0)));
        let (refreshes, on_refresh) = counting_refresh();
        let mut dialog = ScheduleDialog::open(DialogKind::Assign, service.clone(), on_refresh);

        let abandoned = tokio::time::timeout(Duration::from_millis(20), dialog.submit(bulk_submission())).await;
        assert!(abandoned.is_err());
        assert_eq!(dialog.state(), &DialogState::Idle);
        assert!(dialog.is_open());

        let state = dialog.submit(bulk_submission()).await.unwrap();
        assert!(matches!(state, DialogState::Succeeded(_)));
        assert_eq!(service.calls.lock().unwrap().len(), 2);
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn local_rejection_issues_no_request() {
        let service = FakeService::new(Reply::Ok(counts(1, 0)));
        let (_, on_refresh) = counting_refresh();
        let mut dialog = ScheduleDialog::open(DialogKind::Assign, service.clone(), on_refresh);

        let err = AssignDraft::default().build().unwrap_err();
        let state = dialog.reject(&err);
        assert!(matches!(state, DialogState::Failed(b) if b.message.contains("select a doctor")));
        assert!(service.calls.lock().unwrap().is_empty());
    }
}
