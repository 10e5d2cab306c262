pub mod memory;
pub mod mysql;

pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;
pub use snaplink_core::{NewUrlRecord, ReadRepository, Repository, StorageError, UrlRecord};
