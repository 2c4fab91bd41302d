//! Data models for Showroom

mod user;

pub use user::*;
