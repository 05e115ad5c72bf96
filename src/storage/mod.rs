//! Storage layer for pipeline stats
//!
//! [`AggregateStore`] is the only entry point the service uses. It runs every
//! operation through a [`TransactionExecutor`] against a [`StatsBackend`]
//! chosen at startup by [`StorageFactory`].

pub mod aggregate_store;
pub mod backends;
pub mod clock;
pub mod config;
pub mod error;
pub mod executor;
pub mod factory;
pub mod traits;

pub use aggregate_store::AggregateStore;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BackendType, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use executor::TransactionExecutor;
pub use factory::StorageFactory;
pub use traits::{HealthStatus, StatsBackend, StoreSession};
