//! Route handlers, grouped by concern.

pub mod auth;
pub mod proxy;
pub mod schools;
pub mod stats;
pub mod users;
