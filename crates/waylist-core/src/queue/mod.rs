//! Outbound mutation queue.
//!
//! User mutations (check-ins, photos, posts, profile edits) are persisted
//! before `enqueue` returns and sent one at a time in creation order. The
//! head operation blocks everything behind it until it succeeds or is
//! dropped as already applied; retryable failures keep it at the head.

mod operation;
mod retry;
mod store;
mod worker;

pub use operation::{OperationPayload, OperationState, OutboundOperation};
pub use retry::RetryPolicy;
pub use store::QueueStore;
pub use worker::OutboundWorker;

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Photo, Post, UserProfile};
use crate::notify::{Notifier, ReportEvent};
use crate::sync::{SyncClient, SyncError};
use crate::transport::{TransportResponse, Upload};
use crate::util::now;
use operation::{SUBTITLE_SENDING, SUBTITLE_WAITING};

/// What one processing step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Nothing queued.
    Idle,
    Sent { id: Uuid },
    /// Removed without success: already applied or unrecoverable.
    Dropped { id: Uuid, reason: String },
    /// Failed and stays at the head.
    Retrying { id: Uuid, failure_count: u32 },
    /// The head is waiting out its backoff.
    Deferred { until: DateTime<Utc> },
}

#[derive(Debug, Default)]
struct QueueState {
    operations: VecDeque<OutboundOperation>,
    next_order: u64,
}

impl QueueState {
    fn references_photo(&self, file_name: &str) -> bool {
        self.operations
            .iter()
            .any(|operation| operation.payload.photo_file() == Some(file_name))
    }
}

struct QueueInner {
    client: Arc<SyncClient>,
    notifier: Arc<dyn Notifier>,
    store: QueueStore,
    retry: RetryPolicy,
    state: Mutex<QueueState>,
    /// Held for the whole send of the head operation.
    lane: Mutex<()>,
    wake: Notify,
}

/// Shared handle to the durable outbound queue.
#[derive(Clone)]
pub struct OutboundQueue {
    inner: Arc<QueueInner>,
}

impl OutboundQueue {
    /// Rebuild the queue from `dir`. Every operation starts queued, in its
    /// original order; photo files nothing references are removed.
    pub async fn open(
        dir: impl Into<PathBuf>,
        client: Arc<SyncClient>,
        notifier: Arc<dyn Notifier>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let store = QueueStore::new(dir);
        let stored = store.load().await?;

        let referenced = stored
            .operations
            .iter()
            .filter_map(|operation| operation.payload.photo_file())
            .collect::<HashSet<_>>();
        let pruned = store.prune_photos(&referenced).await?;
        if pruned > 0 {
            tracing::debug!(pruned, "Removed unreferenced photo files");
        }

        tracing::info!(
            pending = stored.operations.len(),
            path = %store.queue_path().display(),
            "Opened outbound queue"
        );

        Ok(Self {
            inner: Arc::new(QueueInner {
                client,
                notifier,
                store,
                retry,
                state: Mutex::new(QueueState {
                    operations: stored.operations.into(),
                    next_order: stored.next_order,
                }),
                lane: Mutex::new(()),
                wake: Notify::new(),
            }),
        })
    }

    /// Append an operation and persist it. `title` defaults to a description
    /// of the payload.
    ///
    /// Photo uploads must reference a file already stored with
    /// [`QueueStore::write_photo`]; prefer [`Self::enqueue_photo`].
    pub async fn enqueue(
        &self,
        title: Option<String>,
        payload: OperationPayload,
    ) -> Result<OutboundOperation> {
        let operation = {
            let mut state = self.inner.state.lock().await;
            if let Some(file_name) = payload.photo_file() {
                let path = self.inner.store.photo_path(file_name);
                if !tokio::fs::try_exists(&path).await? {
                    return Err(Error::NotFound(format!("Photo file {}", path.display())));
                }
            }
            self.push(&mut state, title, payload).await?
        };
        self.after_enqueue(&operation).await;
        Ok(operation)
    }

    /// Store photo bytes content-addressed, then enqueue the upload.
    pub async fn enqueue_photo(
        &self,
        title: Option<String>,
        location_id: i64,
        caption: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<OutboundOperation> {
        if bytes.is_empty() {
            return Err(Error::InvalidInput("Photo is empty".to_string()));
        }

        let operation = {
            let mut state = self.inner.state.lock().await;
            let file_name = self.inner.store.write_photo(bytes, mime_type).await?;
            let payload = OperationPayload::PhotoUpload {
                file_name,
                caption: caption.trim().to_string(),
                location_id,
                mime_type: mime_type.to_string(),
            };
            self.push(&mut state, title, payload).await?
        };
        self.after_enqueue(&operation).await;
        Ok(operation)
    }

    async fn push(
        &self,
        state: &mut QueueState,
        title: Option<String>,
        payload: OperationPayload,
    ) -> Result<OutboundOperation> {
        let operation = OutboundOperation::new(state.next_order, title, payload)
            .owned_by(self.inner.client.current_account());
        state.operations.push_back(operation.clone());
        state.next_order += 1;

        if let Err(error) = self.persist(state).await {
            state.operations.pop_back();
            state.next_order -= 1;
            return Err(error);
        }
        Ok(operation)
    }

    async fn after_enqueue(&self, operation: &OutboundOperation) {
        self.apply_optimistic(&operation.payload).await;
        tracing::info!(
            id = %operation.id,
            kind = operation.payload.kind(),
            title = %operation.title,
            "Queued outbound operation"
        );
        self.inner.wake.notify_one();
    }

    async fn apply_optimistic(&self, payload: &OperationPayload) {
        if let OperationPayload::CheckinToggle {
            list,
            item_id,
            visited,
        } = *payload
        {
            if let Err(error) = self
                .inner
                .client
                .mirror()
                .set_visited(list, item_id, visited)
                .await
            {
                tracing::warn!(%error, ?list, item_id, "Failed to apply check-in locally");
            }
        }
    }

    /// Re-apply the current account's queued check-in toggles to the
    /// mirror, in order.
    ///
    /// Called after the user's checklist state was reconciled from the
    /// server, which does not know about unsent toggles yet.
    pub async fn reapply_pending(&self) {
        let account = self.inner.client.current_account();
        for operation in self.snapshot().await {
            if operation.account == account {
                self.apply_optimistic(&operation.payload).await;
            }
        }
    }

    /// Send the head operation, ignoring its backoff.
    pub async fn process_next(&self) -> Result<ProcessOutcome> {
        self.process(false).await
    }

    /// Send the head operation if its backoff has elapsed.
    pub async fn process_due(&self) -> Result<ProcessOutcome> {
        self.process(true).await
    }

    /// Process until the queue is empty or the head fails retryably.
    pub async fn run_until_blocked(&self) -> Result<Vec<ProcessOutcome>> {
        let mut outcomes = Vec::new();
        loop {
            let outcome = self.process_next().await?;
            match outcome {
                ProcessOutcome::Idle => break,
                ProcessOutcome::Retrying { .. } | ProcessOutcome::Deferred { .. } => {
                    outcomes.push(outcome);
                    break;
                }
                ProcessOutcome::Sent { .. } | ProcessOutcome::Dropped { .. } => {
                    outcomes.push(outcome);
                }
            }
        }
        Ok(outcomes)
    }

    async fn process(&self, respect_backoff: bool) -> Result<ProcessOutcome> {
        let _lane = self.inner.lane.lock().await;

        let operation = {
            let mut state = self.inner.state.lock().await;
            let Some(head) = state.operations.front_mut() else {
                return Ok(ProcessOutcome::Idle);
            };
            if respect_backoff {
                if let Some(until) = head.next_attempt_at.filter(|until| *until > now()) {
                    return Ok(ProcessOutcome::Deferred { until });
                }
            }
            head.state = OperationState::Sending;
            head.subtitle = SUBTITLE_SENDING.to_string();
            head.clone()
        };

        tracing::debug!(
            id = %operation.id,
            kind = operation.payload.kind(),
            failure_count = operation.failure_count,
            "Sending outbound operation"
        );

        match self.send(&operation).await {
            Ok(response) => {
                self.apply_response(&operation.payload, &response).await;
                self.remove_head(&operation).await?;
                tracing::info!(id = %operation.id, kind = operation.payload.kind(), "Sent outbound operation");
                self.inner
                    .notifier
                    .report_event(ReportEvent::success(operation.payload.kind()));
                Ok(ProcessOutcome::Sent { id: operation.id })
            }
            Err(error) => match terminal_reason(&operation.payload, &error) {
                Some(reason) => {
                    self.remove_head(&operation).await?;
                    tracing::info!(
                        id = %operation.id,
                        kind = operation.payload.kind(),
                        %reason,
                        "Dropped outbound operation"
                    );
                    self.inner.notifier.report_event(ReportEvent {
                        kind: operation.payload.kind().to_string(),
                        success: true,
                        code: error.code(),
                        message: Some(reason.clone()),
                    });
                    Ok(ProcessOutcome::Dropped {
                        id: operation.id,
                        reason,
                    })
                }
                None => self.record_failure(&operation, &error).await,
            },
        }
    }

    async fn send(
        &self,
        operation: &OutboundOperation,
    ) -> std::result::Result<TransportResponse, SyncError> {
        let upload = match &operation.payload {
            OperationPayload::PhotoUpload {
                file_name,
                mime_type,
                ..
            } => {
                let bytes = self
                    .inner
                    .store
                    .read_photo(file_name)
                    .await
                    .map_err(|error| match error {
                        Error::NotFound(what) => {
                            SyncError::PreconditionFailed(format!("{what} is missing"))
                        }
                        other => SyncError::Unknown(other.to_string()),
                    })?;
                Some(Upload {
                    mime_type: mime_type.clone(),
                    bytes,
                })
            }
            _ => None,
        };

        self.inner
            .client
            .send(
                &operation.payload.endpoint(),
                upload,
                operation.account.as_deref(),
            )
            .await
    }

    /// Write what the server returned into the mirror. The operation is
    /// already applied remotely, so failures here are logged only.
    async fn apply_response(&self, payload: &OperationPayload, response: &TransportResponse) {
        let mirror = self.inner.client.mirror();
        let result = match payload {
            OperationPayload::CheckinToggle {
                list,
                item_id,
                visited,
            } => mirror.set_visited(*list, *item_id, *visited).await,
            OperationPayload::PhotoUpload { .. } => match decode_body::<Photo>(payload, response) {
                Some(photo) => mirror.upsert(&photo).await,
                None => Ok(()),
            },
            OperationPayload::PostPublish { .. } => match decode_body::<Post>(payload, response) {
                Some(post) => mirror.upsert(&post).await,
                None => Ok(()),
            },
            OperationPayload::ProfileUpdate { .. } => {
                match decode_body::<UserProfile>(payload, response) {
                    Some(profile) => mirror.upsert(&profile).await,
                    None => Ok(()),
                }
            }
        };

        if let Err(error) = result {
            tracing::warn!(kind = payload.kind(), %error, "Failed to apply response to mirror");
        }
    }

    async fn remove_head(&self, operation: &OutboundOperation) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if state.operations.front().map(|head| head.id) != Some(operation.id) {
            return Err(Error::Queue(format!(
                "Operation {} is no longer at the head of the queue",
                operation.id
            )));
        }
        state.operations.pop_front();
        self.persist(&state).await?;

        if let Some(file_name) = operation.payload.photo_file() {
            if !state.references_photo(file_name) {
                if let Err(error) = self.inner.store.remove_photo(file_name).await {
                    tracing::warn!(%error, file_name, "Failed to remove sent photo file");
                }
            }
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        operation: &OutboundOperation,
        error: &SyncError,
    ) -> Result<ProcessOutcome> {
        let (failure_count, persisted) = {
            let mut state = self.inner.state.lock().await;
            let head = state
                .operations
                .front_mut()
                .filter(|head| head.id == operation.id)
                .ok_or_else(|| {
                    Error::Queue(format!(
                        "Operation {} is no longer at the head of the queue",
                        operation.id
                    ))
                })?;

            head.failure_count += 1;
            head.state = OperationState::Queued;
            head.subtitle = format!("{SUBTITLE_WAITING} (last attempt failed: {error})");
            head.next_attempt_at = Some(self.inner.retry.next_attempt_at(head.failure_count, now()));
            let failure_count = head.failure_count;

            (failure_count, self.persist(&state).await)
        };

        tracing::warn!(
            id = %operation.id,
            kind = operation.payload.kind(),
            failure_count,
            %error,
            "Outbound operation failed; keeping it queued"
        );

        if failure_count == 1 {
            self.inner.notifier.warn_once(&format!(
                "\"{}\" could not be sent yet. It will be retried automatically.",
                operation.title
            ));
        }

        persisted?;
        Ok(ProcessOutcome::Retrying {
            id: operation.id,
            failure_count,
        })
    }

    async fn persist(&self, state: &QueueState) -> Result<()> {
        self.inner
            .store
            .save(&state.operations, state.next_order)
            .await
            .inspect_err(|error| tracing::error!(%error, "Failed to persist outbound queue"))
    }

    /// Pending operations in send order.
    pub async fn snapshot(&self) -> Vec<OutboundOperation> {
        self.inner.state.lock().await.operations.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.operations.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.state.lock().await.operations.is_empty()
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry
    }

    /// Resolves after the next enqueue (or immediately if one happened
    /// since the last wait).
    pub(crate) async fn notified(&self) {
        self.inner.wake.notified().await;
    }
}

impl std::fmt::Debug for OutboundQueue {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("OutboundQueue")
            .field("dir", &self.inner.store.dir())
            .field("retry", &self.inner.retry)
            .finish_non_exhaustive()
    }
}

/// Failures that remove the operation as if it had succeeded.
fn terminal_reason(payload: &OperationPayload, error: &SyncError) -> Option<String> {
    match error {
        SyncError::ServerRejected(500) if payload.is_duplicate_status(500) => {
            tracing::warn!(
                kind = payload.kind(),
                "Treating HTTP 500 as an already-applied check-in (unverified server behavior)"
            );
            Some("assumed duplicate (HTTP 500, unverified)".to_string())
        }
        SyncError::ServerRejected(status) if payload.is_duplicate_status(*status) => {
            Some(format!("duplicate (HTTP {status})"))
        }
        error if !error.is_retryable() => Some(error.to_string()),
        _ => None,
    }
}

fn decode_body<T: DeserializeOwned>(
    payload: &OperationPayload,
    response: &TransportResponse,
) -> Option<T> {
    serde_json::from_slice(&response.body)
        .inspect_err(|error| {
            tracing::warn!(
                kind = payload.kind(),
                %error,
                body = %response.body_text(),
                "Failed to decode mutation response"
            );
        })
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{account_key, SessionAuth};
    use crate::config::ClientConfig;
    use crate::endpoint::Method;
    use crate::mirror::LocalMirror;
    use crate::models::Checklist;
    use crate::testing::{FakeTransport, RecordingNotifier};
    use crate::transport::TransportError;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    struct Harness {
        dir: TempDir,
        queue: OutboundQueue,
        client: Arc<SyncClient>,
        transport: Arc<FakeTransport>,
        notifier: Arc<RecordingNotifier>,
        auth: Arc<SessionAuth>,
    }

    async fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FakeTransport::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let auth = Arc::new(SessionAuth::new(Some("token".to_string())));
        let client = Arc::new(SyncClient::new(
            &ClientConfig::default(),
            transport.clone(),
            auth.clone(),
            notifier.clone(),
            LocalMirror::open_in_memory().unwrap(),
        ));
        let queue = OutboundQueue::open(
            dir.path(),
            client.clone(),
            notifier.clone(),
            RetryPolicy::default(),
        )
        .await
        .unwrap();
        Harness {
            dir,
            queue,
            client,
            transport,
            notifier,
            auth,
        }
    }

    impl Harness {
        async fn reopen(&self) -> OutboundQueue {
            OutboundQueue::open(
                self.dir.path(),
                self.client.clone(),
                self.notifier.clone(),
                RetryPolicy::default(),
            )
            .await
            .unwrap()
        }
    }

    fn checkin(item_id: i64, visited: bool) -> OperationPayload {
        OperationPayload::CheckinToggle {
            list: Checklist::Beaches,
            item_id,
            visited,
        }
    }

    fn post(text: &str) -> OperationPayload {
        OperationPayload::PostPublish {
            location_id: 7,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn enqueue_persists_before_returning() {
        let h = harness().await;
        let queued = h.queue.enqueue(None, checkin(5, true)).await.unwrap();

        let raw = std::fs::read_to_string(h.dir.path().join("outbound-queue.json")).unwrap();
        assert!(raw.contains("\"checkin_toggle\""));

        let reopened = h.reopen().await;
        let snapshot = reopened.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, queued.id);
        assert_eq!(snapshot[0].state, OperationState::Queued);
    }

    #[tokio::test]
    async fn checkin_is_applied_optimistically() {
        let h = harness().await;
        h.queue.enqueue(None, checkin(5, true)).await.unwrap();

        assert!(h.client.mirror().is_visited(Checklist::Beaches, 5).unwrap());
        assert_eq!(h.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn checkin_then_checkout_apply_in_order() {
        let h = harness().await;
        h.queue.enqueue(None, checkin(5, true)).await.unwrap();
        h.queue.enqueue(None, checkin(5, false)).await.unwrap();
        h.transport.push_json("", None);
        h.transport.push_json("", None);

        let outcomes = h.queue.run_until_blocked().await.unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|outcome| matches!(outcome, ProcessOutcome::Sent { .. })));
        let methods = h
            .transport
            .requests()
            .iter()
            .map(|request| request.endpoint.method())
            .collect::<Vec<_>>();
        assert_eq!(methods, vec![Method::Put, Method::Delete]);
        assert!(!h.client.mirror().is_visited(Checklist::Beaches, 5).unwrap());
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn repeated_failures_warn_once_and_keep_the_head() {
        let h = harness().await;
        let queued = h.queue.enqueue(None, post("hello")).await.unwrap();
        for _ in 0..3 {
            h.transport.push_err(TransportError::Timeout);
        }

        for expected in 1..=3 {
            assert_eq!(
                h.queue.process_next().await.unwrap(),
                ProcessOutcome::Retrying {
                    id: queued.id,
                    failure_count: expected
                }
            );
        }

        assert_eq!(h.notifier.warnings().len(), 1);
        assert_eq!(h.queue.len().await, 1);
        let head = &h.queue.snapshot().await[0];
        assert_eq!(head.failure_count, 3);
        assert_eq!(head.state, OperationState::Queued);
        assert!(head.next_attempt_at.is_some());
        assert!(h.notifier.events().is_empty());
    }

    #[tokio::test]
    async fn failing_head_blocks_later_operations() {
        let h = harness().await;
        h.queue.enqueue(None, post("first")).await.unwrap();
        h.queue.enqueue(None, post("second")).await.unwrap();
        h.transport.push_err(TransportError::Offline("airplane mode".to_string()));

        let outcomes = h.queue.run_until_blocked().await.unwrap();

        assert!(matches!(
            outcomes.as_slice(),
            [ProcessOutcome::Retrying { failure_count: 1, .. }]
        ));
        assert_eq!(h.transport.call_count(), 1);
        let texts = h
            .queue
            .snapshot()
            .await
            .into_iter()
            .map(|operation| operation.payload)
            .collect::<Vec<_>>();
        assert_eq!(texts, vec![post("first"), post("second")]);
    }

    #[tokio::test]
    async fn missing_token_drops_without_warning() {
        let h = harness().await;
        let queued = h.queue.enqueue(None, post("hello")).await.unwrap();
        h.auth.clear();

        let outcome = h.queue.process_next().await.unwrap();

        assert!(matches!(outcome, ProcessOutcome::Dropped { id, .. } if id == queued.id));
        assert_eq!(h.transport.call_count(), 0);
        assert!(h.notifier.warnings().is_empty());
        assert!(h.queue.is_empty().await);
        let events = h.notifier.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].success);
    }

    #[tokio::test]
    async fn first_failure_warns_even_when_queue_file_is_unwritable() {
        let h = harness().await;
        h.queue.enqueue(None, post("hello")).await.unwrap();
        let path = h.queue.inner.store.queue_path();
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        h.transport.push_err(TransportError::Timeout);
        h.transport.push_err(TransportError::Timeout);

        assert!(matches!(h.queue.process_next().await, Err(Error::Io(_))));
        assert!(matches!(h.queue.process_next().await, Err(Error::Io(_))));

        assert_eq!(h.transport.call_count(), 2);
        assert_eq!(h.notifier.warnings().len(), 1);
        assert_eq!(h.queue.snapshot().await[0].failure_count, 2);
    }

    #[tokio::test]
    async fn operations_are_only_sent_for_the_account_that_queued_them() {
        let h = harness().await;
        h.auth.set_token(Some("token-alice".to_string()));
        let queued = h.queue.enqueue(None, post("hello")).await.unwrap();
        assert_eq!(queued.account, Some(account_key("token-alice")));
        h.auth.set_token(Some("token-bob".to_string()));

        let outcome = h.queue.process_next().await.unwrap();

        assert!(matches!(outcome, ProcessOutcome::Dropped { id, .. } if id == queued.id));
        assert_eq!(h.transport.call_count(), 0);
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn reapply_pending_skips_other_accounts() {
        let h = harness().await;
        h.queue.enqueue(None, checkin(4, true)).await.unwrap();
        h.client.mirror().clear_user_state().await.unwrap();
        h.auth.set_token(Some("token-bob".to_string()));

        h.queue.reapply_pending().await;
        assert!(!h.client.mirror().is_visited(Checklist::Beaches, 4).unwrap());

        h.auth.set_token(Some("token".to_string()));
        h.queue.reapply_pending().await;
        assert!(h.client.mirror().is_visited(Checklist::Beaches, 4).unwrap());
    }

    #[tokio::test]
    async fn photo_upload_retries_then_lands_in_mirror() {
        let h = harness().await;
        let queued = h
            .queue
            .enqueue_photo(None, 42, "sunset", "image/jpeg", b"jpeg-bytes")
            .await
            .unwrap();
        let file_name = queued.payload.photo_file().unwrap().to_string();
        assert!(h.queue.inner.store.photo_path(&file_name).exists());

        h.transport.push_err(TransportError::Timeout);
        assert_eq!(
            h.queue.process_next().await.unwrap(),
            ProcessOutcome::Retrying {
                id: queued.id,
                failure_count: 1
            }
        );
        assert_eq!(h.notifier.warnings().len(), 1);

        h.transport.push_json(
            r#"{"id": 900, "location_id": 42, "url": "https://cdn.waylist.app/p/900.jpg",
                "caption": "sunset", "created_at": 1700000000000}"#,
            None,
        );
        assert_eq!(
            h.queue.process_next().await.unwrap(),
            ProcessOutcome::Sent { id: queued.id }
        );

        let photos = h.client.mirror().photos_for_location(42).unwrap();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].caption, "sunset");
        assert!(h.queue.is_empty().await);
        assert!(!h.queue.inner.store.photo_path(&file_name).exists());

        let upload = h.transport.requests()[1].upload.clone().unwrap();
        assert_eq!(upload.bytes, b"jpeg-bytes");
        assert_eq!(upload.mime_type, "image/jpeg");
        assert_eq!(h.notifier.warnings().len(), 1);
    }

    #[tokio::test]
    async fn shared_photo_file_survives_until_last_reference() {
        let h = harness().await;
        let first = h
            .queue
            .enqueue_photo(None, 1, "a", "image/png", b"same")
            .await
            .unwrap();
        h.queue
            .enqueue_photo(None, 2, "b", "image/png", b"same")
            .await
            .unwrap();
        let file_name = first.payload.photo_file().unwrap().to_string();
        h.transport.push_json("{}", None);

        h.queue.process_next().await.unwrap();

        assert!(h.queue.inner.store.photo_path(&file_name).exists());
    }

    #[tokio::test]
    async fn known_duplicates_count_as_success() {
        let h = harness().await;
        h.queue.enqueue(None, checkin(3, true)).await.unwrap();
        h.queue.enqueue(None, post("dup")).await.unwrap();
        h.transport.push_status(500);
        h.transport.push_status(409);

        let outcomes = h.queue.run_until_blocked().await.unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|outcome| matches!(outcome, ProcessOutcome::Dropped { .. })));
        assert!(h.notifier.warnings().is_empty());
    }

    #[tokio::test]
    async fn server_error_on_post_is_retried() {
        let h = harness().await;
        h.queue.enqueue(None, post("hello")).await.unwrap();
        h.transport.push_status(500);

        assert!(matches!(
            h.queue.process_next().await.unwrap(),
            ProcessOutcome::Retrying { .. }
        ));
    }

    #[tokio::test]
    async fn background_processing_waits_out_backoff() {
        let h = harness().await;
        h.queue.enqueue(None, post("hello")).await.unwrap();
        h.transport.push_err(TransportError::Timeout);
        h.queue.process_due().await.unwrap();

        assert!(matches!(
            h.queue.process_due().await.unwrap(),
            ProcessOutcome::Deferred { .. }
        ));
        assert_eq!(h.transport.call_count(), 1);

        h.transport.push_json(r#"{"id": 1, "location_id": 7, "text": "hello"}"#, None);
        assert!(matches!(
            h.queue.process_next().await.unwrap(),
            ProcessOutcome::Sent { .. }
        ));
        assert_eq!(h.client.mirror().posts_for_location(7).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reopened_queue_resumes_in_order() {
        let h = harness().await;
        h.queue.enqueue(None, post("one")).await.unwrap();
        h.queue.enqueue(None, checkin(9, true)).await.unwrap();
        h.queue
            .enqueue(
                Some("Rename".to_string()),
                OperationPayload::ProfileUpdate {
                    fields: BTreeMap::from([("full_name".to_string(), "Ada".to_string())]),
                },
            )
            .await
            .unwrap();
        h.transport.push_err(TransportError::Timeout);
        h.queue.process_next().await.unwrap();
        let before = h.queue.snapshot().await;

        let reopened = h.reopen().await;
        let after = reopened.snapshot().await;

        assert_eq!(after, before);
        assert_eq!(after[0].failure_count, 1);
        assert_eq!(after[2].title, "Rename");

        let appended = reopened.enqueue(None, post("four")).await.unwrap();
        assert!(appended.creation_order > after[2].creation_order);
    }

    #[tokio::test]
    async fn pending_toggles_survive_checklist_reconciliation() {
        let h = harness().await;
        h.queue.enqueue(None, checkin(5, true)).await.unwrap();
        h.client
            .mirror()
            .reconcile_visits(Checklist::Beaches, &[])
            .await
            .unwrap();
        assert!(!h.client.mirror().is_visited(Checklist::Beaches, 5).unwrap());

        h.queue.reapply_pending().await;

        assert!(h.client.mirror().is_visited(Checklist::Beaches, 5).unwrap());
    }

    #[tokio::test]
    async fn photo_enqueue_requires_stored_file() {
        let h = harness().await;
        let result = h
            .queue
            .enqueue(
                None,
                OperationPayload::PhotoUpload {
                    file_name: "missing.jpg".to_string(),
                    caption: String::new(),
                    location_id: 1,
                    mime_type: "image/jpeg".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(h.queue.is_empty().await);
    }
}
