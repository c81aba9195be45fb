//! PostgreSQL implementation of the storage boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hubsync_types::{PolicyEvent, StatusObject};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Row};
use std::collections::HashMap;
use std::time::Duration;

use super::{StatusStore, StatusTable, StoreError, StoreResult};

const LOCAL_POLICY_EVENTS_TABLE: &str = "event.local_policies";
const HEARTBEATS_TABLE: &str = "status.leaf_hub_heartbeats";

fn map_sqlx_err(err: sqlx::Error) -> StoreError {
    StoreError::Database(err.to_string())
}

/// PostgreSQL-backed status store.
pub struct PostgresStore {
    /// Database connection pool.
    pool: PgPool,
}

impl PostgresStore {
    /// Create store with existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Connect to database and create store.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(300))
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| StoreError::Database(err.to_string()))
    }
}

#[async_trait]
impl StatusStore for PostgresStore {
    async fn resource_versions(
        &self,
        table: StatusTable,
        source: &str,
    ) -> StoreResult<HashMap<String, String>> {
        let sql = format!(
            "SELECT id, resource_version FROM {} WHERE leaf_hub_name = $1",
            table.table_name()
        );
        let rows = sqlx::query(&sql)
            .bind(source)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        Ok(rows
            .iter()
            .map(|row| (row.get::<String, _>("id"), row.get::<String, _>("resource_version")))
            .collect())
    }

    async fn upsert_objects(
        &self,
        table: StatusTable,
        source: &str,
        objects: &[StatusObject],
    ) -> StoreResult<()> {
        if objects.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} (leaf_hub_name, id, name, namespace, resource_version, payload) ",
            table.table_name()
        ));
        builder.push_values(objects, |mut row, object| {
            row.push_bind(source.to_string())
                .push_bind(object.id.clone())
                .push_bind(object.name.clone())
                .push_bind(object.namespace.clone())
                .push_bind(object.resource_version.clone())
                .push_bind(object.payload.clone());
        });
        builder.push(
            r#" ON CONFLICT (leaf_hub_name, id) DO UPDATE SET
                   name = EXCLUDED.name,
                   namespace = EXCLUDED.namespace,
                   resource_version = EXCLUDED.resource_version,
                   payload = EXCLUDED.payload,
                   updated_at = NOW()"#,
        );

        builder.build().execute(&self.pool).await.map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn delete_objects(
        &self,
        table: StatusTable,
        source: &str,
        ids: &[String],
    ) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "DELETE FROM {} WHERE leaf_hub_name = $1 AND id = ANY($2)",
            table.table_name()
        );
        sqlx::query(&sql)
            .bind(source)
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn insert_policy_events(
        &self,
        source: &str,
        events: &[PolicyEvent],
    ) -> StoreResult<u64> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {LOCAL_POLICY_EVENTS_TABLE} (event_name, policy_id, cluster_id, \
             leaf_hub_name, message, reason, count, compliance, created_at) "
        ));
        builder.push_values(events, |mut row, event| {
            row.push_bind(event.event_name.clone())
                .push_bind(event.policy_id.clone())
                .push_bind(event.cluster_id.clone())
                .push_bind(source.to_string())
                .push_bind(event.message.clone())
                .push_bind(event.reason.clone())
                .push_bind(event.count)
                .push_bind(event.compliance.as_db_str())
                .push_bind(event.created_at);
        });
        builder.push(" ON CONFLICT (event_name, count, created_at) DO NOTHING");

        let result = builder.build().execute(&self.pool).await.map_err(map_sqlx_err)?;
        Ok(result.rows_affected())
    }

    async fn upsert_heartbeat(&self, source: &str, reported_at: DateTime<Utc>) -> StoreResult<()> {
        let sql = format!(
            r#"INSERT INTO {HEARTBEATS_TABLE} (leaf_hub_name, last_timestamp)
               VALUES ($1, $2)
               ON CONFLICT (leaf_hub_name) DO UPDATE SET
                   last_timestamp = GREATEST({HEARTBEATS_TABLE}.last_timestamp, EXCLUDED.last_timestamp)"#
        );
        sqlx::query(&sql)
            .bind(source)
            .bind(reported_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_err)?;
        Ok(())
    }
}
