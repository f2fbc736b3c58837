//! SQLite-backed sheet store.
//!
//! - `model`: row shapes and the locale label mapping.
//! - `repo`: SQL-only functions over those rows.
//! - `store`: the `SheetStore` implementation the engine talks to.

pub mod model;
pub mod repo;
pub mod store;

pub use repo::*;

pub use model::{StatusLabels, StoredReflection};
pub use store::SqliteSheetStore;
