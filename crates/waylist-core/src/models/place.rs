//! Checklist catalog places

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The remote catalog checklists a user can tick places off on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checklist {
    Locations,
    UnCountries,
    Whss,
    Beaches,
    GolfCourses,
    DiveSites,
    Restaurants,
}

impl Checklist {
    pub const ALL: [Self; 7] = [
        Self::Locations,
        Self::UnCountries,
        Self::Whss,
        Self::Beaches,
        Self::GolfCourses,
        Self::DiveSites,
        Self::Restaurants,
    ];

    /// Stable key used in URLs, table scopes and persisted queue records.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Locations => "locations",
            Self::UnCountries => "uncountries",
            Self::Whss => "whss",
            Self::Beaches => "beaches",
            Self::GolfCourses => "golfcourses",
            Self::DiveSites => "divesites",
            Self::Restaurants => "restaurants",
        }
    }

    /// Whether places in this checklist form a parent/child hierarchy.
    ///
    /// World heritage sites group transnational components under a parent
    /// site; the parent is hidden once any of its components exist.
    pub const fn is_hierarchical(self) -> bool {
        matches!(self, Self::Whss)
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::Locations => "Locations",
            Self::UnCountries => "UN Countries",
            Self::Whss => "World Heritage Sites",
            Self::Beaches => "Beaches",
            Self::GolfCourses => "Golf Courses",
            Self::DiveSites => "Dive Sites",
            Self::Restaurants => "Restaurants",
        }
    }
}

impl fmt::Display for Checklist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Checklist {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace(['-', '_'], "");
        Self::ALL
            .into_iter()
            .find(|list| list.key() == needle)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown checklist: {s}")))
    }
}

/// Identifier used by the synthetic "All" row of a checklist.
pub const ALL_PLACES_ID: i64 = 0;

/// A place in one checklist, mirrored from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub list: Checklist,
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub country_id: Option<i64>,
    /// Parent site for hierarchical checklists.
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub visitors: i64,
    /// Hidden parents only exist to group their children.
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Locally synthesized rows survive reconciliation.
    #[serde(default)]
    pub synthetic: bool,
}

const fn default_visible() -> bool {
    true
}

impl Place {
    /// The locally synthesized "All" aggregate row for a checklist.
    #[must_use]
    pub fn all_row(list: Checklist) -> Self {
        Self {
            list,
            id: ALL_PLACES_ID,
            title: format!("All {}", list.title()),
            subtitle: String::new(),
            region: None,
            country_id: None,
            parent_id: None,
            latitude: None,
            longitude: None,
            visitors: 0,
            visible: true,
            synthetic: true,
        }
    }

    /// Coordinates, when the catalog supplied both.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// Map annotation derived from a place with coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPin {
    pub list: Checklist,
    pub id: i64,
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
}
