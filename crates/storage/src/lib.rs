#![forbid(unsafe_code)]

pub mod catalog;
pub mod repository;
pub mod sqlite;

pub use catalog::{Catalog, CatalogError};
pub use repository::{
    InMemoryRepository, OutcomeRow, QuestionBank, RoadmapRepository, Storage, StorageError,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
