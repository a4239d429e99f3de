//! User-generated media: photos and posts

use serde::{Deserialize, Serialize};

/// A photo attached to a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: i64,
    pub location_id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub url: String,
    #[serde(default)]
    pub caption: String,
    /// Upload timestamp (Unix ms).
    #[serde(default)]
    pub created_at: i64,
}

/// A text post published on a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub location_id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub text: String,
    /// Publication timestamp (Unix ms).
    #[serde(default)]
    pub created_at: i64,
}
