mod repository;
mod schema;

pub use repository::{DuplicateKey, InsertOutcome, Repository};
