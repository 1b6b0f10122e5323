//! SQLite persistence layer.
//!
//! Owns the database handle, the migration runner, and the repositories the
//! rest of the workspace goes through. Nothing above this crate writes SQL.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::{
    DocumentRepository, MessageRepository, SessionRepository, SessionSummary, UserRepository,
};
