//! Allocation ledger read side

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::AllocationsRepository;
use crate::{
    error::{AppError, AppResult},
    models::{
        allocation::{Allocation, AllocationDetails, AllocationFilter, AllocationScope},
        employee::Employee,
        equipment::Equipment,
    },
};

#[derive(Clone)]
pub struct PgAllocationsRepository {
    pool: Pool<Postgres>,
}

impl PgAllocationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AllocationsRepository for PgAllocationsRepository {
    async fn get(&self, id: Uuid) -> AppResult<Option<Allocation>> {
        let allocation = sqlx::query_as::<_, Allocation>("SELECT * FROM allocations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(allocation)
    }

    async fn list(&self, filter: &AllocationFilter) -> AppResult<Vec<AllocationDetails>> {
        let allocations = sqlx::query_as::<_, Allocation>(
            r#"
            SELECT a.* FROM allocations a
            JOIN employees e ON e.id = a.employee_id
            WHERE (NOT $1 OR a.returned_at IS NULL)
              AND ($2::uuid IS NULL OR a.employee_id = $2)
              AND ($3::text IS NULL OR e.department_key = $3)
            ORDER BY a.allocated_at DESC, a.id
            "#,
        )
        .bind(filter.active_only)
        .bind(filter.employee_id)
        .bind(&filter.department_key)
        .fetch_all(&self.pool)
        .await?;

        let employee_ids: Vec<Uuid> = allocations.iter().map(|a| a.employee_id).collect();
        let equipment_ids: Vec<Uuid> = allocations.iter().map(|a| a.equipment_id).collect();

        let employees: HashMap<Uuid, Employee> =
            sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = ANY($1)")
                .bind(&employee_ids)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|e| (e.id, e))
                .collect();

        let equipments: HashMap<Uuid, Equipment> =
            sqlx::query_as::<_, Equipment>("SELECT * FROM equipments WHERE id = ANY($1)")
                .bind(&equipment_ids)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|e| (e.id, e))
                .collect();

        allocations
            .into_iter()
            .map(|allocation| {
                let employee = employees.get(&allocation.employee_id).cloned();
                let equipment = equipments.get(&allocation.equipment_id).cloned();
                match (employee, equipment) {
                    (Some(employee), Some(equipment)) => Ok(AllocationDetails {
                        allocation,
                        employee,
                        equipment,
                    }),
                    _ => Err(AppError::Internal(format!(
                        "Allocation {} references a missing employee or equipment",
                        allocation.id
                    ))),
                }
            })
            .collect()
    }

    async fn scopes(&self, ids: &[Uuid]) -> AppResult<Vec<AllocationScope>> {
        let scopes = sqlx::query_as::<_, AllocationScope>(
            r#"
            SELECT a.id, a.employee_id, e.department_key
            FROM allocations a
            JOIN employees e ON e.id = a.employee_id
            WHERE a.id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(scopes)
    }

    async fn count_active_for_employee(&self, employee_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM allocations WHERE employee_id = $1 AND returned_at IS NULL",
        )
        .bind(employee_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn sign_term(&self, id: Uuid, signed_at: DateTime<Utc>) -> AppResult<Option<Allocation>> {
        let allocation = sqlx::query_as::<_, Allocation>(
            r#"
            UPDATE allocations SET term_signed = TRUE, term_signed_at = $2
            WHERE id = $1 AND NOT term_signed
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(signed_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(allocation)
    }
}
