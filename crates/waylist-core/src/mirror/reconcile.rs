//! Reconciliation of authoritative collections against the mirror.

use std::collections::HashSet;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Transaction};

use super::{EntityKind, LocalMirror, MirrorRecord, Visit};
use crate::error::{Error, Result};
use crate::models::{Checklist, Place};

/// What a reconciliation (or single write) changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Parents hidden because at least one child exists.
    pub hidden_parents: usize,
}

impl ReconcileReport {
    pub const fn is_empty(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.deleted == 0
    }
}

impl LocalMirror {
    /// Bring `kind` into exact agreement with `authoritative`.
    ///
    /// Deletes rows (and derived rows) whose ids vanished, upserts every
    /// incoming record and, for hierarchical kinds, hides parents that have
    /// children. Synthetic rows are kept. Everything happens in one
    /// transaction; on error nothing is applied.
    pub async fn reconcile<R: MirrorRecord>(
        &self,
        kind: EntityKind,
        authoritative: &[R],
    ) -> Result<ReconcileReport> {
        if let Some(stray) = authoritative.iter().find(|record| record.kind() != kind) {
            return Err(Error::InvalidInput(format!(
                "Record {} belongs to {:?}, not {kind:?}",
                stray.id(),
                stray.kind()
            )));
        }

        let _guard = self.kind_lock(kind).await;
        let report = self
            .write(|tx| reconcile_in(tx, kind, authoritative))
            .inspect_err(|error| {
                tracing::error!(?kind, %error, "Reconciliation failed; mirror left unchanged");
            })?;

        tracing::debug!(
            ?kind,
            inserted = report.inserted,
            updated = report.updated,
            deleted = report.deleted,
            hidden_parents = report.hidden_parents,
            "Reconciled mirror"
        );
        self.publish(kind, report);
        Ok(report)
    }

    /// Insert-or-replace one record without touching its siblings.
    pub async fn upsert<R: MirrorRecord>(&self, record: &R) -> Result<()> {
        let kind = record.kind();
        let _guard = self.kind_lock(kind).await;
        let report = self.write(|tx| {
            let existed = existing_ids(tx, kind)?.contains(&record.id());
            record.upsert(tx)?;
            Ok(ReconcileReport {
                inserted: usize::from(!existed),
                updated: usize::from(existed),
                ..ReconcileReport::default()
            })
        })?;
        self.publish(kind, report);
        Ok(())
    }

    /// Insert the synthetic "All" aggregate row for `list`.
    pub async fn ensure_all_row(&self, list: Checklist) -> Result<()> {
        self.upsert(&Place::all_row(list)).await
    }

    /// Apply a local check-in/check-out ahead of the server round trip.
    pub async fn set_visited(&self, list: Checklist, id: i64, visited: bool) -> Result<()> {
        let kind = EntityKind::Visits(list);
        let _guard = self.kind_lock(kind).await;
        let report = self.write(|tx| {
            if visited {
                let inserted = tx.execute(
                    "INSERT OR IGNORE INTO visits (list, id) VALUES (?1, ?2)",
                    params![list, id],
                )?;
                Ok(ReconcileReport {
                    inserted,
                    ..ReconcileReport::default()
                })
            } else {
                let deleted = tx.execute(
                    "DELETE FROM visits WHERE list = ?1 AND id = ?2",
                    params![list, id],
                )?;
                Ok(ReconcileReport {
                    deleted,
                    ..ReconcileReport::default()
                })
            }
        })?;
        self.publish(kind, report);
        Ok(())
    }

    /// Drop everything tied to the signed-in user (logout / account switch).
    pub async fn clear_user_state(&self) -> Result<()> {
        let (visits, users) = self.write(|tx| {
            let visits = tx.execute("DELETE FROM visits", [])?;
            let users = tx.execute("DELETE FROM users", [])?;
            Ok((visits, users))
        })?;
        tracing::info!(visits, users, "Cleared user-scoped mirror state");

        for list in Checklist::ALL {
            self.publish(
                EntityKind::Visits(list),
                ReconcileReport {
                    deleted: visits,
                    ..ReconcileReport::default()
                },
            );
        }
        self.publish(
            EntityKind::Users,
            ReconcileReport {
                deleted: users,
                ..ReconcileReport::default()
            },
        );
        Ok(())
    }

    /// Reconcile the user's checklist state for one list.
    pub async fn reconcile_visits(&self, list: Checklist, ids: &[i64]) -> Result<ReconcileReport> {
        let visits = ids.iter().map(|&id| Visit { list, id }).collect::<Vec<_>>();
        self.reconcile(EntityKind::Visits(list), &visits).await
    }
}

fn scope_clause(kind: EntityKind, first_param: usize) -> (String, Vec<Value>) {
    let scope = kind.scope();
    if scope.is_empty() {
        return ("1 = 1".to_string(), Vec::new());
    }
    let clause = scope
        .iter()
        .enumerate()
        .map(|(offset, (column, _))| format!("{column} = ?{}", first_param + offset))
        .collect::<Vec<_>>()
        .join(" AND ");
    (clause, scope.into_iter().map(|(_, value)| value).collect())
}

fn existing_ids(tx: &Transaction<'_>, kind: EntityKind) -> Result<HashSet<i64>> {
    let (clause, values) = scope_clause(kind, 1);
    let synthetic = if kind.has_synthetic_rows() {
        " AND synthetic = 0"
    } else {
        ""
    };
    let sql = format!("SELECT id FROM {} WHERE {clause}{synthetic}", kind.table());
    let mut stmt = tx.prepare(&sql)?;
    let ids = stmt
        .query_map(params_from_iter(values), |row| row.get::<_, i64>(0))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(ids)
}

fn delete_ids(tx: &Transaction<'_>, table: &str, kind: EntityKind, ids: &[i64]) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let (clause, values) = scope_clause(kind, 2);
    let mut stmt = tx.prepare(&format!("DELETE FROM {table} WHERE id = ?1 AND {clause}"))?;
    let mut deleted = 0;
    for id in ids {
        let params = std::iter::once(Value::Integer(*id)).chain(values.iter().cloned());
        deleted += stmt.execute(params_from_iter(params))?;
    }
    Ok(deleted)
}

fn reconcile_in<R: MirrorRecord>(
    tx: &Transaction<'_>,
    kind: EntityKind,
    authoritative: &[R],
) -> Result<ReconcileReport> {
    let existing = existing_ids(tx, kind)?;
    let incoming = authoritative
        .iter()
        .map(MirrorRecord::id)
        .collect::<HashSet<_>>();

    let mut report = ReconcileReport::default();

    if kind.deletes_missing() {
        let mut missing = existing.difference(&incoming).copied().collect::<Vec<_>>();
        missing.sort_unstable();
        report.deleted = delete_ids(tx, kind.table(), kind, &missing)?;
        for table in kind.derived_tables() {
            delete_ids(tx, table, kind, &missing)?;
        }
    }

    for record in authoritative {
        record.upsert(tx)?;
        if existing.contains(&record.id()) {
            report.updated += 1;
        } else {
            report.inserted += 1;
        }
    }

    if let EntityKind::Places(list) = kind {
        if list.is_hierarchical() {
            report.hidden_parents = recompute_parent_visibility(tx, list)?;
        }
    }

    Ok(report)
}

/// Hide every parent that has at least one child; show the rest.
fn recompute_parent_visibility(tx: &Transaction<'_>, list: Checklist) -> Result<usize> {
    tx.execute(
        "UPDATE places
         SET visible = CASE WHEN EXISTS (
             SELECT 1 FROM places AS child
             WHERE child.list = places.list AND child.parent_id = places.id
         ) THEN 0 ELSE 1 END
         WHERE list = ?1 AND synthetic = 0",
        params![list],
    )?;
    let hidden = tx.query_row(
        "SELECT COUNT(*) FROM places WHERE list = ?1 AND visible = 0",
        params![list],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(usize::try_from(hidden).unwrap_or_default())
}
