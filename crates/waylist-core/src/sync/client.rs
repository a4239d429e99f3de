use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use super::freshness::{Admission, FreshnessCache, InFlightGuard};
use super::payload::{ChecklistsPayload, PlacePayload, RankingPayload};
use super::{LoadOutcome, SyncError};
use crate::auth::{account_key, AuthProvider};
use crate::config::ClientConfig;
use crate::endpoint::Endpoint;
use crate::mirror::{EntityKind, LocalMirror, ReconcileReport};
use crate::models::{Checklist, Photo, Post, UserProfile};
use crate::notify::{Notifier, ReportEvent};
use crate::transport::{Transport, TransportRequest, TransportResponse, Upload};
use crate::util::{compact_text, now};

/// Orchestrates reads against the remote API.
///
/// Every public call returns a discriminated result and emits exactly one
/// report event.
pub struct SyncClient {
    transport: Arc<dyn Transport>,
    auth: Arc<dyn AuthProvider>,
    notifier: Arc<dyn Notifier>,
    mirror: LocalMirror,
    freshness: FreshnessCache,
    catalog_window: Duration,
    user_window: Duration,
}

/// A 2xx response that has not been committed to the freshness cache yet.
struct Fetched<'a> {
    cache: &'a FreshnessCache,
    endpoint: &'a Endpoint,
    response: TransportResponse,
    _guard: InFlightGuard<'a>,
}

impl Fetched<'_> {
    fn decode<T: DeserializeOwned>(&self) -> Result<T, SyncError> {
        serde_json::from_slice(&self.response.body).map_err(|error| {
            let label = self.endpoint.label();
            tracing::warn!(
                endpoint = %label,
                %error,
                body = %self.response.body_text(),
                "Failed to decode response"
            );
            SyncError::Decoding {
                endpoint: label,
                message: error.to_string(),
            }
        })
    }

    /// Store the response validator once its payload has been applied.
    fn commit(self) -> Vec<u8> {
        self.cache
            .record_response(self.endpoint, self.response.validator, now());
        self.response.body
    }
}

impl SyncClient {
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        auth: Arc<dyn AuthProvider>,
        notifier: Arc<dyn Notifier>,
        mirror: LocalMirror,
    ) -> Self {
        Self {
            transport,
            auth,
            notifier,
            mirror,
            freshness: FreshnessCache::new(),
            catalog_window: config.catalog_throttle(),
            user_window: config.user_throttle(),
        }
    }

    pub const fn mirror(&self) -> &LocalMirror {
        &self.mirror
    }

    pub const fn freshness(&self) -> &FreshnessCache {
        &self.freshness
    }

    /// Freshness window for `endpoint`: user-scoped data goes stale sooner.
    pub const fn throttle_window(&self, endpoint: &Endpoint) -> Duration {
        if endpoint.auth_required() {
            self.user_window
        } else {
            self.catalog_window
        }
    }

    /// Key of the signed-in account, if any.
    pub fn current_account(&self) -> Option<String> {
        self.auth.current_token().as_deref().map(account_key)
    }

    /// Forget all freshness records and in-flight marks.
    pub fn unthrottle(&self) {
        self.freshness.reset();
        tracing::debug!("Cleared freshness cache");
    }

    /// Fetch the raw body of `endpoint`.
    pub async fn load(
        &self,
        endpoint: &Endpoint,
        force_reload: bool,
    ) -> Result<LoadOutcome<Vec<u8>>, SyncError> {
        self.reported(endpoint, async {
            Ok(self
                .fetch(endpoint, force_reload)
                .await?
                .map_or(LoadOutcome::NotModified, |fetched| {
                    LoadOutcome::Fresh(fetched.commit())
                }))
        })
        .await
    }

    pub async fn refresh_places(
        &self,
        list: Checklist,
        force_reload: bool,
    ) -> Result<LoadOutcome<ReconcileReport>, SyncError> {
        let endpoint = Endpoint::places(list);
        self.reported(&endpoint, async {
            let Some(fetched) = self.fetch(&endpoint, force_reload).await? else {
                return Ok(LoadOutcome::NotModified);
            };
            let places = fetched
                .decode::<Vec<PlacePayload>>()?
                .into_iter()
                .map(|payload| payload.into_place(list))
                .collect::<Vec<_>>();
            let report = self
                .mirror
                .reconcile(EntityKind::Places(list), &places)
                .await?;
            fetched.commit();
            Ok(LoadOutcome::Fresh(report))
        })
        .await
    }

    /// Refresh the signed-in user's visited items across every checklist.
    ///
    /// A checklist absent from the payload has no visited items.
    pub async fn refresh_checklists(
        &self,
        force_reload: bool,
    ) -> Result<LoadOutcome<ReconcileReport>, SyncError> {
        let endpoint = Endpoint::user_checklists();
        self.reported(&endpoint, async {
            let Some(fetched) = self.fetch(&endpoint, force_reload).await? else {
                return Ok(LoadOutcome::NotModified);
            };
            let mut payload = fetched.decode::<ChecklistsPayload>()?;

            let mut total = ReconcileReport::default();
            for list in Checklist::ALL {
                let ids = payload.remove(list.key()).unwrap_or_default();
                let report = self.mirror.reconcile_visits(list, &ids).await?;
                total.inserted += report.inserted;
                total.updated += report.updated;
                total.deleted += report.deleted;
            }
            if !payload.is_empty() {
                tracing::debug!(
                    unknown = ?payload.keys().collect::<Vec<_>>(),
                    "Ignoring unknown checklists"
                );
            }

            fetched.commit();
            Ok(LoadOutcome::Fresh(total))
        })
        .await
    }

    pub async fn refresh_rankings(
        &self,
        list: Checklist,
        page: u32,
        force_reload: bool,
    ) -> Result<LoadOutcome<ReconcileReport>, SyncError> {
        let endpoint = Endpoint::rankings(list, page);
        self.reported(&endpoint, async {
            let Some(fetched) = self.fetch(&endpoint, force_reload).await? else {
                return Ok(LoadOutcome::NotModified);
            };
            let entries = fetched
                .decode::<Vec<RankingPayload>>()?
                .into_iter()
                .map(|payload| payload.into_entry(list, page))
                .collect::<Vec<_>>();
            let report = self
                .mirror
                .reconcile(EntityKind::Rankings { list, page }, &entries)
                .await?;
            fetched.commit();
            Ok(LoadOutcome::Fresh(report))
        })
        .await
    }

    pub async fn refresh_location_photos(
        &self,
        location_id: i64,
        force_reload: bool,
    ) -> Result<LoadOutcome<ReconcileReport>, SyncError> {
        let endpoint = Endpoint::location_photos(location_id);
        self.reported(&endpoint, async {
            let Some(fetched) = self.fetch(&endpoint, force_reload).await? else {
                return Ok(LoadOutcome::NotModified);
            };
            let photos = fetched.decode::<Vec<Photo>>()?;
            let report = self
                .mirror
                .reconcile(EntityKind::LocationPhotos(location_id), &photos)
                .await?;
            fetched.commit();
            Ok(LoadOutcome::Fresh(report))
        })
        .await
    }

    pub async fn refresh_location_posts(
        &self,
        location_id: i64,
        force_reload: bool,
    ) -> Result<LoadOutcome<ReconcileReport>, SyncError> {
        let endpoint = Endpoint::location_posts(location_id);
        self.reported(&endpoint, async {
            let Some(fetched) = self.fetch(&endpoint, force_reload).await? else {
                return Ok(LoadOutcome::NotModified);
            };
            let posts = fetched.decode::<Vec<Post>>()?;
            let report = self
                .mirror
                .reconcile(EntityKind::LocationPosts(location_id), &posts)
                .await?;
            fetched.commit();
            Ok(LoadOutcome::Fresh(report))
        })
        .await
    }

    /// Refresh the signed-in user's own profile into the users cache.
    pub async fn refresh_profile(
        &self,
        force_reload: bool,
    ) -> Result<LoadOutcome<UserProfile>, SyncError> {
        let endpoint = Endpoint::profile();
        self.reported(&endpoint, async {
            let Some(fetched) = self.fetch(&endpoint, force_reload).await? else {
                return Ok(LoadOutcome::NotModified);
            };
            let profile = fetched.decode::<UserProfile>()?;
            self.mirror.upsert(&profile).await?;
            fetched.commit();
            Ok(LoadOutcome::Fresh(profile))
        })
        .await
    }

    /// Send a mutation without freshness bookkeeping or reporting.
    ///
    /// The outbound queue owns reporting for its operations. The request
    /// is only sent when the current token belongs to `owner`.
    pub(crate) async fn send(
        &self,
        endpoint: &Endpoint,
        upload: Option<Upload>,
        owner: Option<&str>,
    ) -> Result<TransportResponse, SyncError> {
        let mut request = self.prepare(endpoint)?;
        if request.bearer_token.as_deref().map(account_key).as_deref() != owner {
            return Err(SyncError::PreconditionFailed(format!(
                "{} was queued by a different account",
                endpoint.label()
            )));
        }
        request.upload = upload;

        let response = self.transport.execute(request).await.map_err(|error| {
            tracing::debug!(endpoint = %endpoint.label(), %error, "Mutation failed");
            SyncError::from(error)
        })?;
        ensure_success(&response)?;
        Ok(response)
    }

    /// Build a request, failing before any I/O when a parameter or the
    /// token is missing.
    fn prepare(&self, endpoint: &Endpoint) -> Result<TransportRequest, SyncError> {
        endpoint
            .render()
            .map_err(|error| SyncError::PreconditionFailed(error.to_string()))?;

        let mut request = TransportRequest::new(endpoint.clone());
        if endpoint.auth_required() {
            let token = self.auth.current_token().ok_or_else(|| {
                SyncError::PreconditionFailed(format!(
                    "{} requires a signed-in user",
                    endpoint.label()
                ))
            })?;
            request.bearer_token = Some(token);
        }
        Ok(request)
    }

    /// Run the gates and the request. `None` means not modified.
    async fn fetch<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        force_reload: bool,
    ) -> Result<Option<Fetched<'a>>, SyncError> {
        let mut request = self.prepare(endpoint)?;

        let window = self.throttle_window(endpoint);
        let (guard, validator) =
            match self
                .freshness
                .try_begin(endpoint, window, force_reload, now())
            {
                Admission::Admitted { guard, validator } => (guard, validator),
                Admission::Throttled(reason) => {
                    tracing::debug!(endpoint = %endpoint.label(), ?reason, "Request throttled");
                    return Err(SyncError::Throttled);
                }
            };
        request.validator = validator;

        let response = self.transport.execute(request).await.map_err(|error| {
            tracing::warn!(endpoint = %endpoint.label(), %error, "Request failed");
            SyncError::from(error)
        })?;

        if response.is_not_modified() {
            self.freshness.touch(endpoint, now());
            return Ok(None);
        }
        ensure_success(&response)?;

        Ok(Some(Fetched {
            cache: &self.freshness,
            endpoint,
            response,
            _guard: guard,
        }))
    }

    async fn reported<T>(
        &self,
        endpoint: &Endpoint,
        call: impl Future<Output = Result<T, SyncError>>,
    ) -> Result<T, SyncError> {
        let result = call.await;
        let kind = endpoint.label();
        let event = match &result {
            Ok(_) => ReportEvent::success(kind),
            Err(error) => ReportEvent::failure(kind, error.code(), error.to_string()),
        };
        self.notifier.report_event(event);
        result
    }
}

fn ensure_success(response: &TransportResponse) -> Result<(), SyncError> {
    if (200..300).contains(&response.status) {
        Ok(())
    } else {
        tracing::warn!(
            status = response.status,
            body = %compact_text(&response.body_text()),
            "Unexpected response status"
        );
        Err(SyncError::ServerRejected(response.status))
    }
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SyncClient")
            .field("mirror", &self.mirror)
            .field("catalog_window", &self.catalog_window)
            .field("user_window", &self.user_window)
            .finish_non_exhaustive()
    }
}
