//! Storage and persistence layer
//!
//! - File system operations
//! - Encounter date store
//! - Data models

mod encounter;
mod file_system;
mod models;

pub use encounter::{EncounterDateStore, MemoryEncounterStore};
pub use file_system::Storage;
pub use models::WalletToEncounterDateLink;
