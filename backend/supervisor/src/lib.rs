//! Durable storage for agent runs.

pub mod store;

pub use store::SqliteStore;
