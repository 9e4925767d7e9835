pub mod collections;
pub mod manager;
pub mod models;
pub mod populate;
pub mod query_builder;
pub mod repository;
pub mod service;

pub use collections::{CollectionSpec, FieldSpec, FieldType};
pub use manager::{DatabaseError, DatabaseManager};
pub use populate::Populate;
pub use repository::Repository;
