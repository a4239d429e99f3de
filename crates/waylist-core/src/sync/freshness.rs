//! Per-endpoint freshness metadata and in-flight duplicate suppression.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::endpoint::Endpoint;

/// Metadata of the last successful response for one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreshnessRecord {
    /// Opaque validator (`ETag`) returned by the server.
    pub validator: Option<String>,
    pub last_received_at: Option<DateTime<Utc>>,
}

impl FreshnessRecord {
    fn is_fresh(&self, window: Duration, now: DateTime<Utc>) -> bool {
        let Some(received) = self.last_received_at else {
            return false;
        };
        let Ok(window) = chrono::Duration::from_std(window) else {
            return true;
        };
        now.signed_duration_since(received) < window
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleReason {
    InFlight,
    Fresh,
}

/// Result of asking to start a request.
#[derive(Debug)]
pub enum Admission<'a> {
    /// The request may proceed; the guard clears the in-flight entry on drop.
    Admitted {
        guard: InFlightGuard<'a>,
        validator: Option<String>,
    },
    Throttled(ThrottleReason),
}

#[derive(Debug, Default)]
struct FreshnessState {
    records: HashMap<Endpoint, FreshnessRecord>,
    in_flight: HashSet<Endpoint>,
}

/// Freshness records plus the in-flight set, keyed by endpoint identity.
///
/// All bookkeeping is synchronous; the lock is never held across an await.
#[derive(Debug, Default)]
pub struct FreshnessCache {
    state: Mutex<FreshnessState>,
}

impl FreshnessCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FreshnessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check the throttle gates and mark the endpoint in flight, atomically.
    ///
    /// `force` skips both gates (the in-flight mark is still taken).
    pub fn try_begin(
        &self,
        endpoint: &Endpoint,
        window: Duration,
        force: bool,
        now: DateTime<Utc>,
    ) -> Admission<'_> {
        let mut state = self.state();

        if !force {
            if state.in_flight.contains(endpoint) {
                return Admission::Throttled(ThrottleReason::InFlight);
            }
            if state
                .records
                .get(endpoint)
                .is_some_and(|record| record.is_fresh(window, now))
            {
                return Admission::Throttled(ThrottleReason::Fresh);
            }
        }

        state.in_flight.insert(endpoint.clone());
        let validator = state
            .records
            .get(endpoint)
            .and_then(|record| record.validator.clone());

        Admission::Admitted {
            guard: InFlightGuard {
                cache: self,
                endpoint: endpoint.clone(),
            },
            validator,
        }
    }

    /// Store the validator and timestamp of a response carrying new data.
    pub fn record_response(
        &self,
        endpoint: &Endpoint,
        validator: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.state().records.insert(
            endpoint.clone(),
            FreshnessRecord {
                validator,
                last_received_at: Some(now),
            },
        );
    }

    /// Refresh the timestamp after a not-modified response.
    pub fn touch(&self, endpoint: &Endpoint, now: DateTime<Utc>) {
        self.state()
            .records
            .entry(endpoint.clone())
            .or_default()
            .last_received_at = Some(now);
    }

    pub fn record(&self, endpoint: &Endpoint) -> Option<FreshnessRecord> {
        self.state().records.get(endpoint).cloned()
    }

    pub fn is_in_flight(&self, endpoint: &Endpoint) -> bool {
        self.state().in_flight.contains(endpoint)
    }

    /// Forget every freshness record and in-flight mark.
    pub fn reset(&self) {
        let mut state = self.state();
        state.records.clear();
        state.in_flight.clear();
    }

    fn finish(&self, endpoint: &Endpoint) {
        self.state().in_flight.remove(endpoint);
    }
}

/// Clears an endpoint's in-flight mark when the request completes or the
/// caller abandons it.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    cache: &'a FreshnessCache,
    endpoint: Endpoint,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.cache.finish(&self.endpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Checklist;

    const WINDOW: Duration = Duration::from_secs(60);

    fn admitted(admission: &Admission<'_>) -> bool {
        matches!(admission, Admission::Admitted { .. })
    }

    #[test]
    fn second_begin_is_throttled_while_in_flight() {
        let cache = FreshnessCache::new();
        let endpoint = Endpoint::places(Checklist::Whss);
        let now = Utc::now();

        let first = cache.try_begin(&endpoint, WINDOW, false, now);
        assert!(admitted(&first));
        assert!(matches!(
            cache.try_begin(&endpoint, WINDOW, false, now),
            Admission::Throttled(ThrottleReason::InFlight)
        ));

        drop(first);
        assert!(!cache.is_in_flight(&endpoint));
        assert!(admitted(&cache.try_begin(&endpoint, WINDOW, false, now)));
    }

    #[test]
    fn fresh_record_throttles_until_window_passes() {
        let cache = FreshnessCache::new();
        let endpoint = Endpoint::places(Checklist::Beaches);
        let received = Utc::now();
        cache.record_response(&endpoint, Some("v1".to_string()), received);

        assert!(matches!(
            cache.try_begin(&endpoint, WINDOW, false, received + chrono::Duration::seconds(30)),
            Admission::Throttled(ThrottleReason::Fresh)
        ));

        let admission =
            cache.try_begin(&endpoint, WINDOW, false, received + chrono::Duration::seconds(61));
        match admission {
            Admission::Admitted { validator, .. } => assert_eq!(validator.as_deref(), Some("v1")),
            Admission::Throttled(reason) => panic!("unexpected throttle: {reason:?}"),
        }
    }

    #[test]
    fn force_bypasses_both_gates() {
        let cache = FreshnessCache::new();
        let endpoint = Endpoint::profile();
        let now = Utc::now();
        cache.record_response(&endpoint, None, now);

        let _held = cache.try_begin(&endpoint, WINDOW, true, now);
        assert!(admitted(&cache.try_begin(&endpoint, WINDOW, true, now)));
    }

    #[test]
    fn different_endpoints_do_not_interfere() {
        let cache = FreshnessCache::new();
        let now = Utc::now();
        let _whss = cache.try_begin(&Endpoint::places(Checklist::Whss), WINDOW, false, now);
        assert!(admitted(&cache.try_begin(
            &Endpoint::places(Checklist::Beaches),
            WINDOW,
            false,
            now
        )));
    }

    #[test]
    fn touch_keeps_validator() {
        let cache = FreshnessCache::new();
        let endpoint = Endpoint::user_checklists();
        let now = Utc::now();
        cache.record_response(&endpoint, Some("etag".to_string()), now);
        cache.touch(&endpoint, now + chrono::Duration::seconds(5));

        let record = cache.record(&endpoint).unwrap();
        assert_eq!(record.validator.as_deref(), Some("etag"));
        assert_eq!(
            record.last_received_at,
            Some(now + chrono::Duration::seconds(5))
        );
    }

    #[test]
    fn reset_clears_records_and_in_flight() {
        let cache = FreshnessCache::new();
        let endpoint = Endpoint::places(Checklist::Locations);
        let now = Utc::now();
        cache.record_response(&endpoint, Some("v".to_string()), now);
        let guard = cache.try_begin(&Endpoint::profile(), WINDOW, false, now);

        cache.reset();

        assert!(cache.record(&endpoint).is_none());
        assert!(!cache.is_in_flight(&Endpoint::profile()));
        drop(guard);
    }
}
