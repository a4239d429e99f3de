//! Session wiring shared by every front end.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::{account_key, AuthProvider, SessionAuth};
use crate::config::ClientConfig;
use crate::mirror::{LocalMirror, ReconcileReport};
use crate::models::Checklist;
use crate::notify::Notifier;
use crate::queue::{OperationPayload, OutboundOperation, OutboundQueue, OutboundWorker, RetryPolicy};
use crate::sync::{LoadOutcome, SyncClient, SyncError};
use crate::transport::{HttpTransport, Transport};
use crate::{Error, Result};

const MIRROR_FILE: &str = "mirror.db";

/// Mirror, sync client and outbound queue for one data directory.
#[derive(Clone)]
pub struct Session {
    auth: Arc<SessionAuth>,
    client: Arc<SyncClient>,
    queue: OutboundQueue,
    data_dir: PathBuf,
}

impl Session {
    /// Open a session that talks HTTP to `config.api_base_url`.
    pub async fn open(
        data_dir: impl Into<PathBuf>,
        config: &ClientConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let transport = HttpTransport::new(config).map_err(Error::Config)?;
        Self::open_with_transport(data_dir, config, Arc::new(transport), notifier).await
    }

    pub async fn open_with_transport(
        data_dir: impl Into<PathBuf>,
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;

        let mirror = LocalMirror::open(data_dir.join(MIRROR_FILE))?;
        for list in Checklist::ALL {
            mirror.ensure_all_row(list).await?;
        }

        let auth = Arc::new(SessionAuth::new(config.auth_token.clone()));
        let client = Arc::new(SyncClient::new(
            config,
            transport,
            auth.clone(),
            notifier.clone(),
            mirror,
        ));
        let queue = OutboundQueue::open(
            &data_dir,
            client.clone(),
            notifier,
            RetryPolicy::from_config(config),
        )
        .await?;

        tracing::info!(
            data_dir = %data_dir.display(),
            authenticated = auth.is_authenticated(),
            "Opened session"
        );

        Ok(Self {
            auth,
            client,
            queue,
            data_dir,
        })
    }

    pub fn auth(&self) -> &SessionAuth {
        &self.auth
    }

    pub fn client(&self) -> &SyncClient {
        &self.client
    }

    pub fn mirror(&self) -> &LocalMirror {
        self.client.mirror()
    }

    pub const fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Switch to `token`. Freshness is reset so user data is refetched;
    /// user-scoped mirror data is dropped when the account changes.
    pub async fn sign_in(&self, token: &str) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::InvalidInput("Token must not be empty".to_string()));
        }

        let previous = self.client.current_account();
        self.auth.set_token(Some(token.to_string()));
        self.client.unthrottle();

        let switched = previous.as_deref() != Some(account_key(token).as_str());
        if switched {
            self.mirror().clear_user_state().await?;
        }
        tracing::info!(switched, "Signed in");
        Ok(())
    }

    /// Refresh checklist state, then re-apply toggles the server has not
    /// seen yet.
    pub async fn refresh_checklists(
        &self,
        force_reload: bool,
    ) -> std::result::Result<LoadOutcome<ReconcileReport>, SyncError> {
        let outcome = self.client.refresh_checklists(force_reload).await?;
        if outcome.is_fresh() {
            self.queue.reapply_pending().await;
        }
        Ok(outcome)
    }

    /// Queue a check-in (`visited`) or check-out; the mirror reflects it
    /// immediately.
    pub async fn set_visited(
        &self,
        list: Checklist,
        item_id: i64,
        visited: bool,
    ) -> Result<OutboundOperation> {
        let title = self
            .mirror()
            .place(list, item_id)?
            .map(|place| {
                if visited {
                    format!("Check in to {}", place.title)
                } else {
                    format!("Check out of {}", place.title)
                }
            });
        self.queue
            .enqueue(
                title,
                OperationPayload::CheckinToggle {
                    list,
                    item_id,
                    visited,
                },
            )
            .await
    }

    /// Start draining the queue in the background.
    pub fn spawn_worker(&self) -> OutboundWorker {
        OutboundWorker::spawn(self.queue.clone())
    }

    /// Drop the token, freshness state and user-scoped mirror data.
    ///
    /// Queued operations stay on disk. They are only sent once the same
    /// account signs in again; otherwise they are dropped when processed.
    pub async fn logout(&self) -> Result<()> {
        self.auth.clear();
        self.client.unthrottle();
        self.mirror().clear_user_state().await?;
        tracing::info!(pending = self.queue.len().await, "Logged out");
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Session")
            .field("data_dir", &self.data_dir)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;
    use crate::models::ALL_PLACES_ID;
    use crate::testing::{FakeTransport, RecordingNotifier};
    use tempfile::TempDir;

    async fn open(dir: &TempDir, transport: Arc<FakeTransport>) -> Session {
        let config = ClientConfig {
            auth_token: Some("token".to_string()),
            ..ClientConfig::default()
        };
        Session::open_with_transport(
            dir.path(),
            &config,
            transport,
            Arc::new(RecordingNotifier::default()),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn open_creates_mirror_with_all_rows() {
        let dir = TempDir::new().unwrap();
        let session = open(&dir, Arc::new(FakeTransport::new())).await;

        assert!(dir.path().join(MIRROR_FILE).exists());
        for list in Checklist::ALL {
            let all = session.mirror().place(list, ALL_PLACES_ID).unwrap().unwrap();
            assert!(all.synthetic);
        }
    }

    #[tokio::test]
    async fn logout_clears_user_state_but_keeps_queue() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FakeTransport::new());
        let session = open(&dir, transport.clone()).await;
        transport.push_json(r#"{"beaches": [4]}"#, Some("v1"));
        session.refresh_checklists(false).await.unwrap();
        session
            .set_visited(Checklist::Whss, 8, true)
            .await
            .unwrap();

        session.logout().await.unwrap();

        assert!(!session.auth().is_authenticated());
        assert!(session
            .mirror()
            .visited_ids(Checklist::Beaches)
            .unwrap()
            .is_empty());
        assert!(session
            .client()
            .freshness()
            .record(&Endpoint::user_checklists())
            .is_none());
        assert_eq!(session.queue().len().await, 1);
    }

    #[tokio::test]
    async fn queued_operations_do_not_follow_a_different_account() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FakeTransport::new());
        let session = open(&dir, transport.clone()).await;
        session.sign_in("token-alice").await.unwrap();
        session
            .set_visited(Checklist::Beaches, 4, true)
            .await
            .unwrap();

        session.logout().await.unwrap();
        session.sign_in("token-bob").await.unwrap();
        let outcomes = session.queue().run_until_blocked().await.unwrap();

        assert!(matches!(
            outcomes.as_slice(),
            [crate::queue::ProcessOutcome::Dropped { .. }]
        ));
        assert_eq!(transport.call_count(), 0);
        assert!(session.queue().is_empty().await);
    }

    #[tokio::test]
    async fn sign_in_as_same_account_keeps_user_state() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FakeTransport::new());
        let session = open(&dir, transport.clone()).await;
        session
            .set_visited(Checklist::Beaches, 4, true)
            .await
            .unwrap();

        session.sign_in(" token ").await.unwrap();
        assert!(session.mirror().is_visited(Checklist::Beaches, 4).unwrap());

        session.sign_in("token-bob").await.unwrap();
        assert!(!session.mirror().is_visited(Checklist::Beaches, 4).unwrap());
        assert!(session.sign_in("  ").await.is_err());
    }

    #[tokio::test]
    async fn refresh_keeps_unsent_toggles_visible() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(FakeTransport::new());
        let session = open(&dir, transport.clone()).await;
        session
            .set_visited(Checklist::Beaches, 11, true)
            .await
            .unwrap();
        transport.push_json(r#"{"beaches": [4]}"#, None);

        session.refresh_checklists(false).await.unwrap();

        assert_eq!(
            session.mirror().visited_ids(Checklist::Beaches).unwrap(),
            vec![4, 11]
        );
    }

    #[tokio::test]
    async fn reopen_keeps_mirror_and_queue() {
        let dir = TempDir::new().unwrap();
        {
            let session = open(&dir, Arc::new(FakeTransport::new())).await;
            session
                .set_visited(Checklist::Beaches, 2, true)
                .await
                .unwrap();
        }

        let session = open(&dir, Arc::new(FakeTransport::new())).await;
        assert!(session.mirror().is_visited(Checklist::Beaches, 2).unwrap());
        assert_eq!(session.queue().len().await, 1);
    }
}
