pub mod error;
pub mod memory;
pub mod mysql;

pub use error::{Result, StorageError};
pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;
pub use phnix_core::{AuthorityRepository, Ledger};
