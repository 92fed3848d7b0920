//! Storage backends implementing the Keyhole repository contract.

mod error;
mod row;

pub mod memory;
pub mod mysql;
pub mod sqlite;

pub use keyhole_core::{
    CreateOrFind, ReadRepository, Repository, RepositoryTransaction, StorageError,
};
pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;
pub use sqlite::SqliteRepository;
