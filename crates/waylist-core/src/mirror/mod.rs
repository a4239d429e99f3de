//! Local mirror of the remote catalog.
//!
//! Each entity kind is one scoped collection inside the `SQLite` database.
//! Writers go through a single transaction per change; readers always see
//! the last committed state. Committed changes are broadcast to subscribers
//! with the entity kind as topic.

mod queries;
mod reconcile;
mod records;

pub use reconcile::ReconcileReport;
pub use records::{MirrorRecord, Visit};

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::types::Value;
use rusqlite::{Connection, Transaction};
use tokio::sync::{broadcast, OwnedMutexGuard};

use crate::db::Database;
use crate::error::Result;
use crate::models::Checklist;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// One scoped collection in the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Catalog places of one checklist.
    Places(Checklist),
    /// The signed-in user's visited items in one checklist.
    Visits(Checklist),
    /// One leaderboard page of a checklist.
    Rankings { list: Checklist, page: u32 },
    LocationPhotos(i64),
    LocationPosts(i64),
    /// Profile cache; never pruned by reconciliation.
    Users,
}

impl EntityKind {
    pub const fn table(self) -> &'static str {
        match self {
            Self::Places(_) => "places",
            Self::Visits(_) => "visits",
            Self::Rankings { .. } => "rankings",
            Self::LocationPhotos(_) => "photos",
            Self::LocationPosts(_) => "posts",
            Self::Users => "users",
        }
    }

    /// Column/value pairs that select this kind's rows in its table.
    fn scope(self) -> Vec<(&'static str, Value)> {
        match self {
            Self::Places(list) | Self::Visits(list) => {
                vec![("list", Value::Text(list.key().to_string()))]
            }
            Self::Rankings { list, page } => vec![
                ("list", Value::Text(list.key().to_string())),
                ("page", Value::Integer(i64::from(page))),
            ],
            Self::LocationPhotos(location_id) | Self::LocationPosts(location_id) => {
                vec![("location_id", Value::Integer(location_id))]
            }
            Self::Users => Vec::new(),
        }
    }

    /// Tables keyed by the same identifiers and scope that must lose rows
    /// together with this kind.
    const fn derived_tables(self) -> &'static [&'static str] {
        match self {
            Self::Places(_) => &["map_pins"],
            _ => &[],
        }
    }

    const fn has_synthetic_rows(self) -> bool {
        matches!(self, Self::Places(_))
    }

    const fn deletes_missing(self) -> bool {
        !matches!(self, Self::Users)
    }

    pub const fn is_hierarchical(self) -> bool {
        match self {
            Self::Places(list) => list.is_hierarchical(),
            _ => false,
        }
    }
}

/// Broadcast after a mirror write commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorChange {
    pub kind: EntityKind,
    pub report: ReconcileReport,
}

/// Shared handle to the local mirror.
#[derive(Clone)]
pub struct LocalMirror {
    inner: Arc<MirrorInner>,
}

struct MirrorInner {
    db: Mutex<Database>,
    events: broadcast::Sender<MirrorChange>,
    kind_locks: Mutex<HashMap<EntityKind, Arc<tokio::sync::Mutex<()>>>>,
}

impl LocalMirror {
    pub fn new(db: Database) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(MirrorInner {
                db: Mutex::new(db),
                events,
                kind_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Open (or create) the mirror database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Open an in-memory mirror (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Subscribe to committed changes. Filter on `MirrorChange::kind` for a
    /// single topic.
    pub fn subscribe(&self) -> broadcast::Receiver<MirrorChange> {
        self.inner.events.subscribe()
    }

    fn publish(&self, kind: EntityKind, report: ReconcileReport) {
        // No receivers is fine.
        let _ = self.inner.events.send(MirrorChange { kind, report });
    }

    fn database(&self) -> MutexGuard<'_, Database> {
        self.inner.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a read against the committed state.
    fn read<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let db = self.database();
        Ok(f(db.connection())?)
    }

    /// Run `f` inside one transaction; nothing is visible unless it commits.
    fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut db = self.database();
        let tx = db.connection_mut().transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Serializes writers of one entity kind; other kinds proceed independently.
    async fn kind_lock(&self, kind: EntityKind) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .inner
                .kind_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                locks
                    .entry(kind)
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

impl std::fmt::Debug for LocalMirror {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = self.database().path().map(Path::to_path_buf);
        formatter
            .debug_struct("LocalMirror")
            .field("path", &path)
            .finish_non_exhaustive()
    }
}
