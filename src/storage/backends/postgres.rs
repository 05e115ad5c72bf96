//! PostgreSQL storage backend implementation
//!
//! Records live in one table per tenant schema. Query trees are rendered to
//! SQL through [`sqlx::QueryBuilder`] with every value bound, never inlined.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row, Transaction};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::query::{
    Accumulator, AggregationQuery, DeleteFilter, Field, GroupKey, GroupStage, Predicate,
    TotalField,
};
use crate::stats::{AggregateResult, RecordId, StatRecord};
use crate::storage::config::StorageConfig;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::traits::{HealthStatus, StatsBackend, StoreSession};

const RECORD_COLUMNS: &str =
    r#"pipeline_id, "timestamp", records_handled, bytes_handled, num_errors, num_retries"#;

/// PostgreSQL storage backend
pub struct PostgresBackend {
    pool: PgPool,
    schema: String,
    table: String,
}

impl PostgresBackend {
    /// Connect, then create the tenant schema and table if missing
    pub async fn new(config: &StorageConfig) -> StorageResult<Self> {
        info!("Initializing PostgreSQL backend");

        let schema = schema_name(&config.tenant()?.to_string());

        let connect_options = PgConnectOptions::from_str(&config.postgres.connection_string)
            .map_err(|e| StorageError::connection(format!("Invalid connection string: {}", e)))?
            .application_name("pipeline-stats");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(Duration::from_secs(600)))
            .test_before_acquire(true)
            .connect_with(connect_options)
            .await
            .map_err(|e| StorageError::connection(format!("Failed to connect to database: {}", e)))?;

        let backend = Self {
            pool,
            table: format!(r#""{}"."{}""#, schema, config.collection),
            schema,
        };
        backend.initialize_schema(&config.collection).await?;

        Ok(backend)
    }

    async fn initialize_schema(&self, collection: &str) -> StorageResult<()> {
        info!("Initializing PostgreSQL schema: {}", self.schema);

        let statements = [
            format!(r#"CREATE SCHEMA IF NOT EXISTS "{}""#, self.schema),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id BIGSERIAL PRIMARY KEY,
                    pipeline_id TEXT NOT NULL,
                    "timestamp" BIGINT NOT NULL,
                    records_handled BIGINT NOT NULL DEFAULT 0,
                    bytes_handled BIGINT NOT NULL DEFAULT 0,
                    num_errors BIGINT NOT NULL DEFAULT 0,
                    num_retries BIGINT NOT NULL DEFAULT 0
                )
                "#,
                self.table
            ),
            format!(
                r#"CREATE INDEX IF NOT EXISTS "idx_{}_pipeline_time" ON {} (pipeline_id, "timestamp")"#,
                collection, self.table
            ),
        ];

        for statement in &statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::database(format!("Failed to initialize schema: {}", e)))?;
        }
        Ok(())
    }
}

/// Schema holding one tenant's tables
pub fn schema_name(tenant: &str) -> String {
    format!("stats_{}", tenant.replace('-', "_"))
}

#[async_trait]
impl StatsBackend for PostgresBackend {
    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn start_session(&self) -> StorageResult<Box<dyn StoreSession>> {
        // An exhausted or closed pool surfaces here as `Unavailable`.
        let tx = self.pool.begin().await?;

        Ok(Box::new(PostgresSession {
            tx,
            table: self.table.clone(),
        }))
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        debug!("Performing PostgreSQL health check");
        let start = Instant::now();

        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => Ok(HealthStatus {
                healthy: true,
                backend_type: "postgres".to_string(),
                latency: start.elapsed(),
                details: HashMap::from([
                    ("schema".to_string(), self.schema.clone()),
                    ("pool_size".to_string(), self.pool.size().to_string()),
                    ("idle_connections".to_string(), self.pool.num_idle().to_string()),
                ]),
            }),
            Err(e) => {
                error!("PostgreSQL health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    backend_type: "postgres".to_string(),
                    latency: start.elapsed(),
                    details: HashMap::from([("error".to_string(), e.to_string())]),
                })
            }
        }
    }
}

struct PostgresSession {
    tx: Transaction<'static, Postgres>,
    table: String,
}

#[async_trait]
impl StoreSession for PostgresSession {
    async fn insert(&mut self, record: &StatRecord) -> StorageResult<RecordId> {
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
            self.table, RECORD_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&record.pipeline_id)
            .bind(record.timestamp)
            .bind(record.records_handled)
            .bind(record.bytes_handled)
            .bind(record.num_errors)
            .bind(record.num_retries)
            .fetch_one(&mut *self.tx)
            .await?;

        let id: i64 = row.try_get("id")?;
        Ok(RecordId(id.to_string()))
    }

    async fn aggregate(&mut self, query: &AggregationQuery) -> StorageResult<Vec<AggregateResult>> {
        let (predicates, group) = query.split()?;

        let rows = render_group_query(&self.table, &predicates, group)
            .build()
            .fetch_all(&mut *self.tx)
            .await?;
        let mut groups = Vec::with_capacity(rows.len());
        for row in &rows {
            groups.push(decode_group(row, group)?);
        }

        if group.collects_constituents() {
            let rows = render_constituent_query(&self.table, &predicates, group)
                .build()
                .fetch_all(&mut *self.tx)
                .await?;

            let mut by_key: BTreeMap<Option<String>, Vec<StatRecord>> = BTreeMap::new();
            for row in &rows {
                let key: Option<String> = row.try_get("group_key")?;
                by_key.entry(key).or_default().push(decode_record(row)?);
            }
            for result in &mut groups {
                result.constituents =
                    Some(by_key.remove(&result.pipeline_id).unwrap_or_default());
            }
        }

        Ok(groups)
    }

    async fn delete_many(&mut self, filter: &DeleteFilter) -> StorageResult<u64> {
        let predicates: Vec<&Predicate> = filter.predicates.iter().collect();

        let mut builder = QueryBuilder::new(format!("DELETE FROM {}", self.table));
        push_conjunction(&mut builder, &predicates);

        let result = builder.build().execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn column(field: Field) -> String {
    format!(r#""{}""#, field.storage_name())
}

fn group_key_expr(key: GroupKey) -> String {
    match key {
        GroupKey::Field(field) => format!("{}::TEXT", column(field)),
        GroupKey::All => "NULL::TEXT".to_string(),
    }
}

fn push_conjunction(builder: &mut QueryBuilder<'static, Postgres>, predicates: &[&Predicate]) {
    for (i, predicate) in predicates.iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        match predicate {
            Predicate::Between { field, from, to } => {
                builder
                    .push(column(*field))
                    .push(" BETWEEN ")
                    .push_bind(*from)
                    .push(" AND ")
                    .push_bind(*to);
            }
            Predicate::In { field, values } => {
                builder
                    .push(column(*field))
                    .push(" = ANY(")
                    .push_bind(values.clone())
                    .push(")");
            }
        }
    }
}

/// `SELECT` producing one row per group
///
/// Grouping by a constant carries `HAVING COUNT(*) > 0` so that an empty
/// table yields no row, matching the other backends.
pub fn render_group_query(
    table: &str,
    predicates: &[&Predicate],
    group: &GroupStage,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {} AS group_key",
        group_key_expr(group.key)
    ));
    for accumulator in &group.accumulators {
        if let Accumulator::Sum(total) = accumulator {
            builder.push(format!(
                ", COALESCE(SUM({}), 0)::BIGINT AS {}",
                column(total.source()),
                total.storage_name()
            ));
        }
    }
    builder.push(format!(" FROM {}", table));
    push_conjunction(&mut builder, predicates);

    match group.key {
        GroupKey::Field(field) => {
            builder.push(format!(" GROUP BY {}", column(field)));
        }
        GroupKey::All => {
            builder.push(" HAVING COUNT(*) > 0");
        }
    }
    builder
}

/// `SELECT` of the raw records behind each group, in insertion order
pub fn render_constituent_query(
    table: &str,
    predicates: &[&Predicate],
    group: &GroupStage,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {} AS group_key, {} FROM {}",
        group_key_expr(group.key),
        RECORD_COLUMNS,
        table
    ));
    push_conjunction(&mut builder, predicates);
    builder.push(" ORDER BY id");
    builder
}

fn decode_group(row: &PgRow, group: &GroupStage) -> StorageResult<AggregateResult> {
    let mut result = AggregateResult {
        pipeline_id: row.try_get("group_key")?,
        ..Default::default()
    };
    for accumulator in &group.accumulators {
        if let Accumulator::Sum(total) = accumulator {
            let value: i64 = row.try_get(total.storage_name())?;
            match total {
                TotalField::RecordsHandled => result.total_records_handled = value,
                TotalField::BytesHandled => result.total_bytes_handled = value,
                TotalField::NumErrors => result.total_num_errors = value,
                TotalField::NumRetries => result.total_num_retries = value,
            }
        }
    }
    Ok(result)
}

fn decode_record(row: &PgRow) -> StorageResult<StatRecord> {
    Ok(StatRecord {
        pipeline_id: row.try_get("pipeline_id")?,
        timestamp: row.try_get("timestamp")?,
        records_handled: row.try_get("records_handled")?,
        bytes_handled: row.try_get("bytes_handled")?,
        num_errors: row.try_get("num_errors")?,
        num_retries: row.try_get("num_retries")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{clear_filter, fleet_aggregate_query, stats_query};
    use crate::stats::{ClearFilter, Filter};

    const TABLE: &str = r#""stats_t"."pipeline_stats""#;

    fn filter(ids: &[&str], include_constituents: bool) -> Filter {
        Filter {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            from_timestamp: 0,
            to_timestamp: 100,
            include_constituents,
        }
    }

    #[test]
    fn test_schema_name_from_tenant() {
        assert_eq!(
            schema_name("6f1c2d9e-3b7a-4c55-9a0e-2f8d4b1c7e90"),
            "stats_6f1c2d9e_3b7a_4c55_9a0e_2f8d4b1c7e90"
        );
    }

    #[test]
    fn test_render_grouped_query_with_ids() {
        let query = stats_query(&filter(&["a", "b"], false));
        let (predicates, group) = query.split().unwrap();
        let builder = render_group_query(TABLE, &predicates, group);

        assert_eq!(
            builder.sql(),
            concat!(
                r#"SELECT "pipeline_id"::TEXT AS group_key"#,
                r#", COALESCE(SUM("records_handled"), 0)::BIGINT AS total_records_handled"#,
                r#", COALESCE(SUM("bytes_handled"), 0)::BIGINT AS total_bytes_handled"#,
                r#", COALESCE(SUM("num_errors"), 0)::BIGINT AS total_num_errors"#,
                r#", COALESCE(SUM("num_retries"), 0)::BIGINT AS total_num_retries"#,
                r#" FROM "stats_t"."pipeline_stats""#,
                r#" WHERE "timestamp" BETWEEN $1 AND $2"#,
                r#" AND "pipeline_id" = ANY($3)"#,
                r#" GROUP BY "pipeline_id""#,
            )
        );
    }

    #[test]
    fn test_render_grouped_query_without_ids_has_single_predicate() {
        let query = stats_query(&filter(&[], false));
        let (predicates, group) = query.split().unwrap();
        let builder = render_group_query(TABLE, &predicates, group);

        assert!(builder.sql().contains(r#" WHERE "timestamp" BETWEEN $1 AND $2 GROUP BY"#));
        assert!(!builder.sql().contains("ANY"));
    }

    #[test]
    fn test_render_fleet_query_requires_rows() {
        let query = fleet_aggregate_query();
        let (predicates, group) = query.split().unwrap();
        let builder = render_group_query(TABLE, &predicates, group);

        assert!(builder.sql().starts_with("SELECT NULL::TEXT AS group_key"));
        assert!(builder.sql().ends_with(" HAVING COUNT(*) > 0"));
        assert!(!builder.sql().contains("WHERE"));
    }

    #[test]
    fn test_render_constituent_query_orders_by_insertion() {
        let query = stats_query(&filter(&["a"], true));
        let (predicates, group) = query.split().unwrap();
        let builder = render_constituent_query(TABLE, &predicates, group);

        assert!(builder.sql().starts_with(r#"SELECT "pipeline_id"::TEXT AS group_key, pipeline_id"#));
        assert!(builder.sql().ends_with(" ORDER BY id"));
    }

    #[test]
    fn test_render_delete_filter() {
        let delete = clear_filter(&ClearFilter {
            ids: ["a".to_string()].into_iter().collect(),
            from_timestamp: 1,
            to_timestamp: 2,
        });
        let predicates: Vec<&Predicate> = delete.predicates.iter().collect();

        let mut builder = QueryBuilder::new(format!("DELETE FROM {}", TABLE));
        push_conjunction(&mut builder, &predicates);

        assert_eq!(
            builder.sql(),
            r#"DELETE FROM "stats_t"."pipeline_stats" WHERE "pipeline_id" = ANY($1) AND "timestamp" BETWEEN $2 AND $3"#
        );
    }
}
