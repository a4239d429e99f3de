//! Background drain loop for the outbound queue

use tokio::task::JoinHandle;

use super::{OutboundQueue, ProcessOutcome};
use crate::util::now;

/// Drains the queue in the background, waiting out retry backoff and
/// sleeping while the queue is empty. Aborted on drop.
#[derive(Debug)]
pub struct OutboundWorker {
    handle: JoinHandle<()>,
}

impl OutboundWorker {
    pub fn spawn(queue: OutboundQueue) -> Self {
        let handle = tokio::spawn(async move {
            tracing::debug!("Outbound worker started");
            loop {
                let wait_until = match queue.process_due().await {
                    Ok(ProcessOutcome::Idle) => None,
                    Ok(ProcessOutcome::Deferred { until }) => Some(until),
                    Ok(
                        ProcessOutcome::Sent { .. }
                        | ProcessOutcome::Dropped { .. }
                        | ProcessOutcome::Retrying { .. },
                    ) => continue,
                    Err(error) => {
                        tracing::error!(%error, "Outbound worker step failed");
                        let pause = chrono::Duration::from_std(queue.retry_policy().base_delay)
                            .unwrap_or_else(|_| chrono::Duration::seconds(1));
                        Some(now() + pause)
                    }
                };

                match wait_until {
                    None => queue.notified().await,
                    Some(until) => {
                        let delay = (until - now()).to_std().unwrap_or_default();
                        tokio::select! {
                            () = tokio::time::sleep(delay) => {}
                            () = queue.notified() => {}
                        }
                    }
                }
            }
        });
        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for OutboundWorker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::auth::SessionAuth;
    use crate::config::ClientConfig;
    use crate::mirror::LocalMirror;
    use crate::models::Checklist;
    use crate::queue::{OperationPayload, RetryPolicy};
    use crate::sync::SyncClient;
    use crate::testing::{FakeTransport, RecordingNotifier};
    use tempfile::TempDir;

    async fn wait_until_empty(queue: &OutboundQueue) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !queue.is_empty().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn worker_drains_new_operations() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FakeTransport::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let client = Arc::new(SyncClient::new(
            &ClientConfig::default(),
            transport.clone(),
            Arc::new(SessionAuth::new(Some("token".to_string()))),
            notifier.clone(),
            LocalMirror::open_in_memory().unwrap(),
        ));
        let queue = OutboundQueue::open(dir.path(), client, notifier, RetryPolicy::default())
            .await
            .unwrap();

        let worker = OutboundWorker::spawn(queue.clone());
        assert!(worker.is_running());

        transport.push_json("", None);
        transport.push_json("", None);
        for item_id in [1, 2] {
            queue
                .enqueue(
                    None,
                    OperationPayload::CheckinToggle {
                        list: Checklist::Whss,
                        item_id,
                        visited: true,
                    },
                )
                .await
                .unwrap();
        }

        wait_until_empty(&queue).await;
        assert_eq!(transport.call_count(), 2);
        worker.shutdown();
    }
}
