//! fleetdocs database layer
//!
//! File metadata persistence and database bootstrap.

pub mod db;
pub mod setup;

pub use db::*;
pub use setup::{run_migrations, setup_database};
