//! # Queue Configuration Repository
//!
//! Read-mostly store of per-queue settings. The engine reads a fresh
//! snapshot at join time, at call time and on every sweep tick; nothing in
//! the lifecycle writes here.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use waitline_core::validation::validate_configuration;
use waitline_core::QueueConfiguration;

/// Repository for queue configuration rows.
#[derive(Debug, Clone)]
pub struct QueueConfigRepository {
    pool: SqlitePool,
}

impl QueueConfigRepository {
    /// Creates a new QueueConfigRepository.
    pub fn new(pool: SqlitePool) -> Self {
        QueueConfigRepository { pool }
    }

    /// Gets the configuration of one queue.
    pub async fn get(&self, company_id: &str, queue_id: &str) -> DbResult<Option<QueueConfiguration>> {
        let config = sqlx::query_as::<_, QueueConfiguration>(
            r#"
            SELECT
                company_id,
                queue_id,
                name,
                tolerance_minutes,
                min_party_size,
                max_party_size,
                active_from,
                active_until,
                is_active,
                default_channel,
                average_service_minutes,
                updated_at
            FROM queue_configurations
            WHERE company_id = ?1 AND queue_id = ?2
            "#,
        )
        .bind(company_id)
        .bind(queue_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }

    /// Inserts or replaces a queue configuration.
    ///
    /// Entries already called keep their `call_tolerance_minutes` snapshot;
    /// only the sweep sees the new tolerance.
    ///
    /// ## Errors
    /// * `DbError::Validation` - the configuration fails `validate_configuration`
    pub async fn upsert(&self, config: &QueueConfiguration) -> DbResult<()> {
        validate_configuration(config)?;

        debug!(
            company_id = %config.company_id,
            queue_id = %config.queue_id,
            tolerance_minutes = config.tolerance_minutes,
            "Upserting queue configuration"
        );

        sqlx::query(
            r#"
            INSERT INTO queue_configurations (
                company_id, queue_id, name, tolerance_minutes,
                min_party_size, max_party_size, active_from, active_until,
                is_active, default_channel, average_service_minutes, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12
            )
            ON CONFLICT (company_id, queue_id) DO UPDATE SET
                name = excluded.name,
                tolerance_minutes = excluded.tolerance_minutes,
                min_party_size = excluded.min_party_size,
                max_party_size = excluded.max_party_size,
                active_from = excluded.active_from,
                active_until = excluded.active_until,
                is_active = excluded.is_active,
                default_channel = excluded.default_channel,
                average_service_minutes = excluded.average_service_minutes,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&config.company_id)
        .bind(&config.queue_id)
        .bind(&config.name)
        .bind(config.tolerance_minutes)
        .bind(config.min_party_size)
        .bind(config.max_party_size)
        .bind(config.active_from)
        .bind(config.active_until)
        .bind(config.is_active)
        .bind(config.default_channel)
        .bind(config.average_service_minutes)
        .bind(config.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
