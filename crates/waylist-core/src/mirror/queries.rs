//! Read-only query surface over the committed mirror state.

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use rusqlite::{params, OptionalExtension};

use super::records::{
    parse_photo, parse_pin, parse_place, parse_post, parse_ranking, parse_user, PLACE_COLUMNS,
};
use super::LocalMirror;
use crate::error::Result;
use crate::models::{Checklist, MapPin, Photo, Place, Post, RankingEntry, UserProfile};

impl LocalMirror {
    /// Get a place by primary identifier.
    pub fn place(&self, list: Checklist, id: i64) -> Result<Option<Place>> {
        self.read(|conn| {
            conn.query_row(
                &format!("SELECT {PLACE_COLUMNS} FROM places WHERE list = ?1 AND id = ?2"),
                params![list, id],
                parse_place,
            )
            .optional()
        })
    }

    /// Every place in a checklist, hidden parents included.
    pub fn places(&self, list: Checklist) -> Result<Vec<Place>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PLACE_COLUMNS} FROM places WHERE list = ?1
                 ORDER BY synthetic DESC, title COLLATE NOCASE"
            ))?;
            let rows = stmt.query_map(params![list], parse_place)?;
            rows.collect()
        })
    }

    /// Places shown in listings: hidden parents are left out.
    pub fn visible_places(&self, list: Checklist) -> Result<Vec<Place>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PLACE_COLUMNS} FROM places WHERE list = ?1 AND visible = 1
                 ORDER BY synthetic DESC, title COLLATE NOCASE"
            ))?;
            let rows = stmt.query_map(params![list], parse_place)?;
            rows.collect()
        })
    }

    /// Children of a parent place, ordered by id.
    pub fn children_of(&self, list: Checklist, parent_id: i64) -> Result<Vec<Place>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PLACE_COLUMNS} FROM places WHERE list = ?1 AND parent_id = ?2 ORDER BY id"
            ))?;
            let rows = stmt.query_map(params![list, parent_id], parse_place)?;
            rows.collect()
        })
    }

    /// Case-insensitive substring filter over visible place titles.
    pub fn search_places(&self, list: Checklist, filter: &str, limit: usize) -> Result<Vec<Place>> {
        let filter = filter.trim();
        if filter.is_empty() {
            let mut places = self.visible_places(list)?;
            places.truncate(limit);
            return Ok(places);
        }

        let pattern = format!("%{}%", escape_like(filter));
        self.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PLACE_COLUMNS} FROM places
                 WHERE list = ?1 AND visible = 1 AND synthetic = 0
                   AND title LIKE ?2 ESCAPE '\\'
                 ORDER BY title COLLATE NOCASE
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(params![list, pattern, limit as i64], parse_place)?;
            rows.collect()
        })
    }

    pub fn pins(&self, list: Checklist) -> Result<Vec<MapPin>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT list, id, title, latitude, longitude FROM map_pins
                 WHERE list = ?1 ORDER BY id",
            )?;
            let rows = stmt.query_map(params![list], parse_pin)?;
            rows.collect()
        })
    }

    pub fn visited_ids(&self, list: Checklist) -> Result<Vec<i64>> {
        self.read(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM visits WHERE list = ?1 ORDER BY id")?;
            let rows = stmt.query_map(params![list], |row| row.get(0))?;
            rows.collect()
        })
    }

    pub fn is_visited(&self, list: Checklist, id: i64) -> Result<bool> {
        self.read(|conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM visits WHERE list = ?1 AND id = ?2)",
                params![list, id],
                |row| row.get(0),
            )
        })
    }

    /// Photos of a location, newest first.
    pub fn photos_for_location(&self, location_id: i64) -> Result<Vec<Photo>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, location_id, user_id, url, caption, created_at FROM photos
                 WHERE location_id = ?1 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt.query_map(params![location_id], parse_photo)?;
            rows.collect()
        })
    }

    /// Posts of a location, newest first.
    pub fn posts_for_location(&self, location_id: i64) -> Result<Vec<Post>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, location_id, user_id, text, created_at FROM posts
                 WHERE location_id = ?1 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt.query_map(params![location_id], parse_post)?;
            rows.collect()
        })
    }

    /// Leaderboard rows for a checklist across all fetched pages.
    pub fn rankings(&self, list: Checklist) -> Result<Vec<RankingEntry>> {
        self.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT list, page, id, rank, full_name, visited FROM rankings
                 WHERE list = ?1 ORDER BY rank, id",
            )?;
            let rows = stmt.query_map(params![list], parse_ranking)?;
            rows.collect()
        })
    }

    pub fn user(&self, id: i64) -> Result<Option<UserProfile>> {
        self.read(|conn| {
            conn.query_row(
                "SELECT id, full_name, country, picture_url FROM users WHERE id = ?1",
                params![id],
                parse_user,
            )
            .optional()
        })
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::EntityKind;

    fn place(id: i64, title: &str) -> Place {
        Place {
            list: Checklist::Beaches,
            id,
            title: title.to_string(),
            subtitle: String::new(),
            region: Some("Caribbean".to_string()),
            country_id: None,
            parent_id: None,
            latitude: None,
            longitude: None,
            visitors: 3,
            visible: true,
            synthetic: false,
        }
    }

    async fn seeded() -> LocalMirror {
        let mirror = LocalMirror::open_in_memory().unwrap();
        mirror
            .reconcile(
                EntityKind::Places(Checklist::Beaches),
                &[
                    place(1, "Grace Bay"),
                    place(2, "Eagle Beach"),
                    place(3, "Seven Mile Beach"),
                    place(4, "100% Beach"),
                ],
            )
            .await
            .unwrap();
        mirror
    }

    #[tokio::test]
    async fn search_is_case_insensitive_substring() {
        let mirror = seeded().await;
        let titles = mirror
            .search_places(Checklist::Beaches, "beach", 10)
            .unwrap()
            .into_iter()
            .map(|place| place.title)
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["100% Beach", "Eagle Beach", "Seven Mile Beach"]);
    }

    #[tokio::test]
    async fn search_escapes_like_wildcards() {
        let mirror = seeded().await;
        let results = mirror.search_places(Checklist::Beaches, "%", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, 4);
    }

    #[tokio::test]
    async fn empty_filter_lists_visible_places() {
        let mirror = seeded().await;
        assert_eq!(
            mirror.search_places(Checklist::Beaches, "  ", 2).unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn unknown_ids_return_none() {
        let mirror = seeded().await;
        assert!(mirror.place(Checklist::Beaches, 99).unwrap().is_none());
        assert!(mirror.place(Checklist::Whss, 1).unwrap().is_none());
        assert!(mirror.user(1).unwrap().is_none());
    }

    #[test]
    fn escape_like_escapes_specials() {
        assert_eq!(escape_like("a_b%c\\"), "a\\_b\\%c\\\\");
    }
}
