//! # invoica-store
//!
//! SQLite persistence for Invoica, backed by rusqlite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model. All rows are scoped to their owning user; the server layer never
//! writes SQL of its own.

pub mod clover;
pub mod customers;
pub mod database;
pub mod invoices;
pub mod migrations;
pub mod models;
pub mod password_resets;
pub mod profiles;
pub mod users;

mod error;
mod rows;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
