//! Wire shapes of catalog responses.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::models::{Checklist, Place, RankingEntry};

#[derive(Debug, Deserialize)]
pub(super) struct PlacePayload {
    id: i64,
    title: String,
    #[serde(default)]
    subtitle: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    country_id: Option<i64>,
    #[serde(default)]
    parent_id: Option<i64>,
    #[serde(default, alias = "lat")]
    latitude: Option<f64>,
    #[serde(default, alias = "lng", alias = "lon")]
    longitude: Option<f64>,
    #[serde(default)]
    visitors: i64,
}

impl PlacePayload {
    pub(super) fn into_place(self, list: Checklist) -> Place {
        Place {
            list,
            id: self.id,
            title: self.title,
            subtitle: self.subtitle,
            region: self.region,
            country_id: self.country_id,
            parent_id: self.parent_id,
            latitude: self.latitude,
            longitude: self.longitude,
            visitors: self.visitors,
            visible: true,
            synthetic: false,
        }
    }
}

/// Visited item ids keyed by checklist key. Unknown keys are ignored.
pub(super) type ChecklistsPayload = BTreeMap<String, Vec<i64>>;

#[derive(Debug, Deserialize)]
pub(super) struct RankingPayload {
    #[serde(alias = "id")]
    user_id: i64,
    rank: i64,
    full_name: String,
    #[serde(default)]
    visited: i64,
}

impl RankingPayload {
    pub(super) fn into_entry(self, list: Checklist, page: u32) -> RankingEntry {
        RankingEntry {
            list,
            page,
            user_id: self.user_id,
            rank: self.rank,
            full_name: self.full_name,
            visited: self.visited,
        }
    }
}
