//! Equipment repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::EquipmentRepository;
use crate::{
    error::{AppError, AppResult, PG_FOREIGN_KEY_VIOLATION},
    models::equipment::{Equipment, EquipmentQuery},
};

#[derive(Clone)]
pub struct PgEquipmentRepository {
    pool: Pool<Postgres>,
}

impl PgEquipmentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EquipmentRepository for PgEquipmentRepository {
    async fn get(&self, id: Uuid) -> AppResult<Option<Equipment>> {
        let equipment = sqlx::query_as::<_, Equipment>("SELECT * FROM equipments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(equipment)
    }

    async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>> {
        let rows = sqlx::query_as::<_, Equipment>(
            r#"
            SELECT * FROM equipments
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR classification = $2)
              AND ($3::text IS NULL OR category = $3)
            ORDER BY name
            "#,
        )
        .bind(query.status)
        .bind(query.classification)
        .bind(&query.category)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create(&self, equipment: &Equipment) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>(
            r#"
            INSERT INTO equipments (
                id, name, category, classification, serial_number, purchase_value,
                purchase_date, status, image_url, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(equipment.id)
        .bind(&equipment.name)
        .bind(&equipment.category)
        .bind(equipment.classification)
        .bind(&equipment.serial_number)
        .bind(equipment.purchase_value)
        .bind(equipment.purchase_date)
        .bind(equipment.status)
        .bind(&equipment.image_url)
        .bind(equipment.created_at)
        .bind(equipment.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_store(e, "Serial number already registered"))
    }

    async fn update(&self, equipment: &Equipment) -> AppResult<Option<Equipment>> {
        // The status guard keeps `allocated` owned by the allocation engine.
        sqlx::query_as::<_, Equipment>(
            r#"
            UPDATE equipments
            SET name = $2, category = $3, classification = $4, serial_number = $5,
                purchase_value = $6, purchase_date = $7, status = $8, image_url = $9,
                updated_at = $10
            WHERE id = $1
              AND (status = $8 OR (status <> 'allocated' AND $8 <> 'allocated'))
            RETURNING *
            "#,
        )
        .bind(equipment.id)
        .bind(&equipment.name)
        .bind(&equipment.category)
        .bind(equipment.classification)
        .bind(&equipment.serial_number)
        .bind(equipment.purchase_value)
        .bind(equipment.purchase_date)
        .bind(equipment.status)
        .bind(&equipment.image_url)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_store(e, "Serial number already registered"))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM equipments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(sqlx::Error::Database(db)) if db.code().as_deref() == Some(PG_FOREIGN_KEY_VIOLATION) => {
                Err(AppError::Conflict(format!(
                    "Equipment {} has allocation history and cannot be deleted",
                    id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }
}
