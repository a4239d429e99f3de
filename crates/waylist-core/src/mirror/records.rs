//! Row mapping between models and mirror tables.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Row, Transaction};
use serde::{Deserialize, Serialize};

use super::EntityKind;
use crate::models::{Checklist, MapPin, Photo, Place, Post, RankingEntry, UserProfile};

/// A record that can be upserted into the mirror by primary identifier.
pub trait MirrorRecord {
    /// Primary identifier inside the record's scope.
    fn id(&self) -> i64;

    /// The scoped collection this record belongs to.
    fn kind(&self) -> EntityKind;

    /// Insert-or-replace this record (and anything derived from it).
    fn upsert(&self, tx: &Transaction<'_>) -> rusqlite::Result<()>;
}

/// One checked-off item in the user's checklist state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Visit {
    pub list: Checklist,
    pub id: i64,
}

impl ToSql for Checklist {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.key()))
    }
}

impl FromSql for Checklist {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

impl MirrorRecord for Place {
    fn id(&self) -> i64 {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Places(self.list)
    }

    fn upsert(&self, tx: &Transaction<'_>) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT OR REPLACE INTO places (
                list, id, title, subtitle, region, country_id, parent_id,
                latitude, longitude, visitors, visible, synthetic
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                self.list,
                self.id,
                self.title,
                self.subtitle,
                self.region,
                self.country_id,
                self.parent_id,
                self.latitude,
                self.longitude,
                self.visitors,
                self.visible,
                self.synthetic,
            ],
        )?;

        match self.coordinates() {
            Some((latitude, longitude)) => tx.execute(
                "INSERT OR REPLACE INTO map_pins (list, id, title, latitude, longitude)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![self.list, self.id, self.title, latitude, longitude],
            )?,
            None => tx.execute(
                "DELETE FROM map_pins WHERE list = ?1 AND id = ?2",
                params![self.list, self.id],
            )?,
        };
        Ok(())
    }
}

impl MirrorRecord for Visit {
    fn id(&self) -> i64 {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Visits(self.list)
    }

    fn upsert(&self, tx: &Transaction<'_>) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT OR IGNORE INTO visits (list, id) VALUES (?1, ?2)",
            params![self.list, self.id],
        )?;
        Ok(())
    }
}

impl MirrorRecord for RankingEntry {
    fn id(&self) -> i64 {
        self.user_id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Rankings {
            list: self.list,
            page: self.page,
        }
    }

    fn upsert(&self, tx: &Transaction<'_>) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT OR REPLACE INTO rankings (list, page, id, rank, full_name, visited)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.list,
                self.page,
                self.user_id,
                self.rank,
                self.full_name,
                self.visited
            ],
        )?;
        Ok(())
    }
}

impl MirrorRecord for Photo {
    fn id(&self) -> i64 {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::LocationPhotos(self.location_id)
    }

    fn upsert(&self, tx: &Transaction<'_>) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT OR REPLACE INTO photos (id, location_id, user_id, url, caption, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.id,
                self.location_id,
                self.user_id,
                self.url,
                self.caption,
                self.created_at
            ],
        )?;
        Ok(())
    }
}

impl MirrorRecord for Post {
    fn id(&self) -> i64 {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::LocationPosts(self.location_id)
    }

    fn upsert(&self, tx: &Transaction<'_>) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT OR REPLACE INTO posts (id, location_id, user_id, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.id,
                self.location_id,
                self.user_id,
                self.text,
                self.created_at
            ],
        )?;
        Ok(())
    }
}

impl MirrorRecord for UserProfile {
    fn id(&self) -> i64 {
        self.id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Users
    }

    fn upsert(&self, tx: &Transaction<'_>) -> rusqlite::Result<()> {
        tx.execute(
            "INSERT OR REPLACE INTO users (id, full_name, country, picture_url)
             VALUES (?1, ?2, ?3, ?4)",
            params![self.id, self.full_name, self.country, self.picture_url],
        )?;
        Ok(())
    }
}

pub(super) const PLACE_COLUMNS: &str = "list, id, title, subtitle, region, country_id, parent_id, \
     latitude, longitude, visitors, visible, synthetic";

pub(super) fn parse_place(row: &Row<'_>) -> rusqlite::Result<Place> {
    Ok(Place {
        list: row.get(0)?,
        id: row.get(1)?,
        title: row.get(2)?,
        subtitle: row.get(3)?,
        region: row.get(4)?,
        country_id: row.get(5)?,
        parent_id: row.get(6)?,
        latitude: row.get(7)?,
        longitude: row.get(8)?,
        visitors: row.get(9)?,
        visible: row.get(10)?,
        synthetic: row.get(11)?,
    })
}

pub(super) fn parse_pin(row: &Row<'_>) -> rusqlite::Result<MapPin> {
    Ok(MapPin {
        list: row.get(0)?,
        id: row.get(1)?,
        title: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
    })
}

pub(super) fn parse_photo(row: &Row<'_>) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        location_id: row.get(1)?,
        user_id: row.get(2)?,
        url: row.get(3)?,
        caption: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub(super) fn parse_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        location_id: row.get(1)?,
        user_id: row.get(2)?,
        text: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(super) fn parse_ranking(row: &Row<'_>) -> rusqlite::Result<RankingEntry> {
    Ok(RankingEntry {
        list: row.get(0)?,
        page: row.get(1)?,
        user_id: row.get(2)?,
        rank: row.get(3)?,
        full_name: row.get(4)?,
        visited: row.get(5)?,
    })
}

pub(super) fn parse_user(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        id: row.get(0)?,
        full_name: row.get(1)?,
        country: row.get(2)?,
        picture_url: row.get(3)?,
    })
}
