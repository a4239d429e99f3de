pub mod checkin;
pub mod common;
pub mod completions;
pub mod list;
pub mod login;
pub mod logout;
pub mod photo;
pub mod post;
pub mod profile;
pub mod queue;
pub mod refresh;
pub mod search;
