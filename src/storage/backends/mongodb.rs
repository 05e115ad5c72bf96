//! MongoDB storage backend implementation
//!
//! Query trees are rendered into aggregation-pipeline documents. Each
//! session is a MongoDB client session with an open multi-document
//! transaction, so the deployment must be a replica set or sharded cluster.

use async_trait::async_trait;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, ClientSession, Collection};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::query::{
    Accumulator, AggregationQuery, DeleteFilter, GroupKey, GroupStage, Predicate, Stage,
    CONSTITUENTS_FIELD,
};
use crate::stats::{AggregateResult, RecordId, StatRecord};
use crate::storage::config::StorageConfig;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::traits::{HealthStatus, StatsBackend, StoreSession};

/// MongoDB storage backend
pub struct MongoBackend {
    client: Client,
    database: String,
    collection: Collection<Document>,
}

impl MongoBackend {
    /// Connect using the configured URI; the tenant id names the database
    pub async fn new(config: &StorageConfig) -> StorageResult<Self> {
        info!("Initializing MongoDB backend");

        let database = config.tenant()?.to_string();

        let mut options = ClientOptions::parse(&config.mongodb.uri)
            .await
            .map_err(|e| StorageError::connection(format!("Invalid MongoDB URI: {}", e)))?;
        options.app_name = Some("pipeline-stats".to_string());
        options.connect_timeout = Some(config.connect_timeout);
        options.server_selection_timeout = Some(config.connect_timeout);
        options.max_pool_size = Some(config.max_connections);

        let client = Client::with_options(options)
            .map_err(|e| StorageError::connection(format!("Failed to build MongoDB client: {}", e)))?;
        let collection = client
            .database(&database)
            .collection::<Document>(&config.collection);

        info!(database = %database, collection = %config.collection, "MongoDB backend ready");
        Ok(Self {
            client,
            database,
            collection,
        })
    }
}

#[async_trait]
impl StatsBackend for MongoBackend {
    fn backend_type(&self) -> &'static str {
        "mongodb"
    }

    async fn start_session(&self) -> StorageResult<Box<dyn StoreSession>> {
        // Server selection timeouts surface here as `Unavailable`.
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;

        Ok(Box::new(MongoSession {
            session,
            collection: self.collection.clone(),
        }))
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        debug!("Performing MongoDB health check");
        let start = Instant::now();

        match self
            .client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
        {
            Ok(_) => Ok(HealthStatus {
                healthy: true,
                backend_type: "mongodb".to_string(),
                latency: start.elapsed(),
                details: HashMap::from([
                    ("database".to_string(), self.database.clone()),
                    ("collection".to_string(), self.collection.name().to_string()),
                ]),
            }),
            Err(e) => {
                error!("MongoDB health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    backend_type: "mongodb".to_string(),
                    latency: start.elapsed(),
                    details: HashMap::from([("error".to_string(), e.to_string())]),
                })
            }
        }
    }
}

struct MongoSession {
    session: ClientSession,
    collection: Collection<Document>,
}

#[async_trait]
impl StoreSession for MongoSession {
    async fn insert(&mut self, record: &StatRecord) -> StorageResult<RecordId> {
        let document = bson::to_document(record).map_err(StorageError::serialization)?;
        let result = self
            .collection
            .insert_one(document)
            .session(&mut self.session)
            .await?;

        let id = match result.inserted_id {
            Bson::ObjectId(oid) => oid.to_hex(),
            other => other.to_string(),
        };
        Ok(RecordId(id))
    }

    async fn aggregate(&mut self, query: &AggregationQuery) -> StorageResult<Vec<AggregateResult>> {
        let pipeline = render_pipeline(query);
        let mut cursor = self
            .collection
            .aggregate(pipeline)
            .session(&mut self.session)
            .await?;

        let mut groups = Vec::new();
        while let Some(document) = cursor.next(&mut self.session).await {
            let row: GroupRow =
                bson::from_document(document?).map_err(StorageError::serialization)?;
            groups.push(row.into());
        }
        Ok(groups)
    }

    async fn delete_many(&mut self, filter: &DeleteFilter) -> StorageResult<u64> {
        let result = self
            .collection
            .delete_many(render_conjunction(&filter.predicates))
            .session(&mut self.session)
            .await?;
        Ok(result.deleted_count)
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let mut this = self;
        this.session.commit_transaction().await?;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        let mut this = self;
        this.session.abort_transaction().await?;
        Ok(())
    }
}

/// One `$group` output document
#[derive(Debug, Deserialize)]
struct GroupRow {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    total_records_handled: i64,
    #[serde(default)]
    total_bytes_handled: i64,
    #[serde(default)]
    total_num_errors: i64,
    #[serde(default)]
    total_num_retries: i64,
    #[serde(default)]
    stats: Option<Vec<StatRecord>>,
}

impl From<GroupRow> for AggregateResult {
    fn from(row: GroupRow) -> Self {
        AggregateResult {
            pipeline_id: row.id,
            total_records_handled: row.total_records_handled,
            total_bytes_handled: row.total_bytes_handled,
            total_num_errors: row.total_num_errors,
            total_num_retries: row.total_num_retries,
            constituents: row.stats,
        }
    }
}

/// Render a query tree as aggregation-pipeline stages
pub fn render_pipeline(query: &AggregationQuery) -> Vec<Document> {
    query
        .stages
        .iter()
        .map(|stage| match stage {
            Stage::Match(m) => doc! { "$match": render_conjunction(&m.predicates) },
            Stage::Group(g) => doc! { "$group": render_group(g) },
        })
        .collect()
}

/// Render predicates as one `$and` filter document
///
/// MongoDB rejects an empty `$and`, so no predicates renders as `{}`.
pub fn render_conjunction(predicates: &[Predicate]) -> Document {
    if predicates.is_empty() {
        return Document::new();
    }
    let clauses: Vec<Bson> = predicates
        .iter()
        .map(|p| Bson::Document(render_predicate(p)))
        .collect();
    doc! { "$and": clauses }
}

fn render_predicate(predicate: &Predicate) -> Document {
    match predicate {
        Predicate::Between { field, from, to } => {
            doc! { field.storage_name(): { "$gte": *from, "$lte": *to } }
        }
        Predicate::In { field, values } => {
            doc! { field.storage_name(): { "$in": values.clone() } }
        }
    }
}

fn render_group(group: &GroupStage) -> Document {
    let key = match group.key {
        GroupKey::Field(field) => Bson::String(format!("${}", field.storage_name())),
        GroupKey::All => Bson::Null,
    };

    let mut document = doc! { "_id": key };
    for accumulator in &group.accumulators {
        match accumulator {
            Accumulator::Sum(total) => {
                document.insert(
                    total.storage_name(),
                    doc! { "$sum": format!("${}", total.source().storage_name()) },
                );
            }
            Accumulator::PushRecord => {
                document.insert(CONSTITUENTS_FIELD, doc! { "$push": "$$ROOT" });
            }
        }
    }
    document
}
