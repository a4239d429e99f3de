//! Users and rankings

use serde::{Deserialize, Serialize};

use super::place::Checklist;

/// Public profile of a traveller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub full_name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub picture_url: Option<String>,
}

/// One row of a checklist leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub list: Checklist,
    /// Leaderboard page this row was fetched with.
    #[serde(default)]
    pub page: u32,
    pub user_id: i64,
    pub rank: i64,
    pub full_name: String,
    pub visited: i64,
}
