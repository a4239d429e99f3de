//! Service wiring shared by front ends.

mod session;

pub use session::Session;
