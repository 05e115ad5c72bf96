//! Runs units of work inside a session-scoped transaction

use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::error::{StorageError, StorageResult};
use super::traits::{StatsBackend, StoreSession};

/// Wraps each unit of work in its own session and transaction
///
/// On `Ok` the transaction is committed and the value returned. On `Err`, or
/// if the unit panics, the transaction is aborted and the caller gets a
/// single [`StorageError::Transaction`]. The session is released on every
/// path. There is no retry.
#[derive(Clone)]
pub struct TransactionExecutor {
    backend: Arc<dyn StatsBackend>,
}

impl TransactionExecutor {
    pub fn new(backend: Arc<dyn StatsBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn StatsBackend> {
        &self.backend
    }

    /// Run `unit` in a fresh transaction
    ///
    /// A failure to start the session is returned as-is (nothing was begun,
    /// so there is nothing to abort).
    pub async fn run<T, F>(&self, operation: &'static str, unit: F) -> StorageResult<T>
    where
        T: Send,
        F: for<'s> FnOnce(&'s mut dyn StoreSession) -> BoxFuture<'s, StorageResult<T>> + Send,
    {
        let mut session = self.backend.start_session().await.map_err(|e| {
            error!(operation, error = %e, "failed to start storage session");
            e
        })?;

        let outcome = AssertUnwindSafe(unit(session.as_mut()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(StorageError::Panicked(panic_message(panic))));

        match outcome {
            Ok(value) => match session.commit().await {
                Ok(()) => {
                    debug!(operation, "transaction committed");
                    Ok(value)
                }
                Err(e) => {
                    error!(operation, error = %e, "transaction commit failed");
                    Err(StorageError::transaction(operation, e))
                }
            },
            Err(e) => {
                error!(operation, error = %e, "unit of work failed, aborting transaction");
                if let Err(abort_err) = session.abort().await {
                    warn!(operation, error = %abort_err, "transaction abort failed");
                }
                Err(StorageError::transaction(operation, e))
            }
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fleet_aggregate_query;
    use crate::storage::backends::MemoryBackend;
    use crate::stats::NewStat;

    fn stat(id: &str, records: i64) -> crate::stats::StatRecord {
        NewStat {
            pipeline_id: id.to_string(),
            records_handled: records,
            ..Default::default()
        }
        .at(1)
    }

    async fn fleet_records(executor: &TransactionExecutor) -> i64 {
        let query = fleet_aggregate_query();
        let rows = executor
            .run("inspect", move |session| {
                Box::pin(async move { session.aggregate(&query).await })
            })
            .await
            .unwrap();
        rows.iter().map(|r| r.total_records_handled).sum()
    }

    #[tokio::test]
    async fn test_commit_on_success() {
        let executor = TransactionExecutor::new(Arc::new(MemoryBackend::new()));
        let record = stat("a", 5);

        let id = executor
            .run("insert", move |session| {
                Box::pin(async move { session.insert(&record).await })
            })
            .await
            .unwrap();

        assert!(!id.0.is_empty());
        assert_eq!(fleet_records(&executor).await, 5);
    }

    #[tokio::test]
    async fn test_abort_on_error_leaves_store_untouched() {
        let executor = TransactionExecutor::new(Arc::new(MemoryBackend::new()));
        let record = stat("a", 5);

        let result: StorageResult<()> = executor
            .run("insert", move |session| {
                Box::pin(async move {
                    session.insert(&record).await?;
                    Err(StorageError::validation("rejected after write"))
                })
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_aborted());
        assert!(matches!(err.root(), StorageError::Validation(_)));
        assert_eq!(fleet_records(&executor).await, 0);
    }

    #[tokio::test]
    async fn test_panic_is_converted_and_aborted() {
        let executor = TransactionExecutor::new(Arc::new(MemoryBackend::new()));
        let record = stat("a", 5);

        let result: StorageResult<()> = executor
            .run("insert", move |session| {
                Box::pin(async move {
                    session.insert(&record).await?;
                    panic!("serializer exploded");
                })
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err.root(), StorageError::Panicked(msg) if msg == "serializer exploded"));
        assert_eq!(fleet_records(&executor).await, 0);
    }
}
