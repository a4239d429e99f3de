//! Database layer backing the local mirror

mod connection;
mod migrations;

pub use connection::Database;
