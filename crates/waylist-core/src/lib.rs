//! waylist-core - Core library for Waylist
//!
//! This crate contains the endpoint descriptors, the local mirror, the sync
//! client and the outbound mutation queue used by every Waylist front end.

pub mod auth;
pub mod config;
pub mod db;
pub mod endpoint;
pub mod error;
pub mod mirror;
pub mod models;
pub mod notify;
pub mod queue;
pub mod services;
pub mod sync;
pub mod transport;
pub mod util;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use services::Session;
