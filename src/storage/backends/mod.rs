//! Storage backend implementations

pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongodb;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryBackend;
#[cfg(feature = "mongodb")]
pub use mongodb::MongoBackend;
#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;
