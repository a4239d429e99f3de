//! Data models for Waylist

mod media;
mod place;
mod user;

pub use media::{Photo, Post};
pub use place::{Checklist, MapPin, Place, ALL_PLACES_ID};
pub use user::{RankingEntry, UserProfile};
