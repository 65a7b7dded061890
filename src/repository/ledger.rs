//! PostgreSQL ledger transactions
//!
//! Row locks are taken in id order so two transactions touching overlapping
//! equipment sets queue up instead of deadlocking. The partial unique index
//! `allocations_one_active_per_equipment` backs the locks up.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};
use uuid::Uuid;

use super::{LedgerStore, LedgerTx};
use crate::{
    error::{AppError, AppResult},
    models::{
        allocation::{Allocation, AllocationReturn},
        employee::Employee,
        equipment::{Equipment, EquipmentStatus},
    },
};

#[derive(Clone)]
pub struct PgLedgerStore {
    pool: Pool<Postgres>,
}

impl PgLedgerStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_employee(&mut self, id: Uuid) -> AppResult<Option<Employee>> {
        let employee = sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = $1 FOR SHARE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(employee)
    }

    async fn lock_equipment(&mut self, ids: &[Uuid]) -> AppResult<Vec<Equipment>> {
        let rows = sqlx::query_as::<_, Equipment>(
            "SELECT * FROM equipments WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn lock_allocations(&mut self, ids: &[Uuid]) -> AppResult<Vec<Allocation>> {
        let rows = sqlx::query_as::<_, Allocation>(
            "SELECT * FROM allocations WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows)
    }

    async fn insert_allocation(&mut self, allocation: &Allocation) -> AppResult<Allocation> {
        sqlx::query_as::<_, Allocation>(
            r#"
            INSERT INTO allocations (
                id, employee_id, equipment_id, allocated_at, returned_at, notes,
                movement_type, return_deadline, performed_by, performed_by_name,
                returned_by, returned_by_name, term_signed, term_signed_at, created_at
            )
            VALUES ($1, $2, $3, $4, NULL, $5, $6, $7, $8, $9, NULL, NULL, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(allocation.id)
        .bind(allocation.employee_id)
        .bind(allocation.equipment_id)
        .bind(allocation.allocated_at)
        .bind(&allocation.notes)
        .bind(allocation.movement_type)
        .bind(allocation.return_deadline)
        .bind(allocation.performed_by)
        .bind(&allocation.performed_by_name)
        .bind(allocation.term_signed)
        .bind(allocation.term_signed_at)
        .bind(allocation.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            AppError::from_store(
                e,
                &format!("Equipment {} already has an active allocation", allocation.equipment_id),
            )
        })
    }

    async fn close_allocation(&mut self, closing: &AllocationReturn) -> AppResult<Option<Allocation>> {
        sqlx::query_as::<_, Allocation>(
            r#"
            UPDATE allocations
            SET returned_at = $2, notes = $3, returned_by = $4, returned_by_name = $5
            WHERE id = $1 AND returned_at IS NULL
            RETURNING *
            "#,
        )
        .bind(closing.id)
        .bind(closing.returned_at)
        .bind(&closing.notes)
        .bind(closing.returned_by)
        .bind(&closing.returned_by_name)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| AppError::from_store(e, &format!("Allocation {} cannot be returned", closing.id)))
    }

    async fn set_equipment_status(
        &mut self,
        id: Uuid,
        status: EquipmentStatus,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query("UPDATE equipments SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status)
            .bind(at)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Equipment {} not found", id)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
