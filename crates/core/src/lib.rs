//! Showroom Core Library
//!
//! Models and durable session storage for the Showroom admin console.

pub mod error;
pub mod models;
pub mod storage;

pub use error::{Error, Result};
pub use models::*;
pub use storage::{Database, SessionStore};
