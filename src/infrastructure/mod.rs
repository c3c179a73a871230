// Storage backends and HTTP middleware

pub mod database;
pub mod memory_database;
pub mod middleware;
pub mod sqlite_database;

pub use database::{
    initialize_storage, FriendStorage, LikeStorage, ReferenceStorage, Storage, StorageBackend,
    StorageHandles,
};
pub use memory_database::MemoryDatabase;
pub use sqlite_database::SqliteDatabase;
