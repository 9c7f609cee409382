//! # puzfeed-store
//!
//! SQLite storage for puzzle sources and imported puzzle records.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model.

pub mod database;
pub mod migrations;
pub mod models;
pub mod puzzles;
pub mod sources;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
