//! Database layer
//!
//! SQLite pool creation, embedded migrations and the repository
//! implementations used by the services.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, ping, DbPool};
