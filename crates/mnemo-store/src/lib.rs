//! Durable graph of tool results and their typed relationships

mod memory;
mod shadow;
mod sqlite;
mod store;

pub use memory::MemStore;
pub use shadow::ShadowStore;
pub use sqlite::SqliteStore;
pub use store::ResultStore;
