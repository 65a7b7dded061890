//! Employees repository for database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use super::EmployeesRepository;
use crate::{
    error::{AppError, AppResult},
    models::employee::{Deactivation, Employee, EmployeeFilter, EmployeeStatus},
};

#[derive(Clone)]
pub struct PgEmployeesRepository {
    pool: Pool<Postgres>,
}

impl PgEmployeesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmployeesRepository for PgEmployeesRepository {
    async fn get(&self, id: Uuid) -> AppResult<Option<Employee>> {
        let employee = sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(employee)
    }

    async fn list(&self, filter: &EmployeeFilter) -> AppResult<Vec<Employee>> {
        let employees = sqlx::query_as::<_, Employee>(
            r#"
            SELECT * FROM employees
            WHERE ($1 OR status = 'Ativo')
              AND ($2::text IS NULL OR department_key = $2)
            ORDER BY name
            "#,
        )
        .bind(filter.include_inactive)
        .bind(&filter.department_key)
        .fetch_all(&self.pool)
        .await?;
        Ok(employees)
    }

    async fn departments(&self) -> AppResult<Vec<String>> {
        let departments = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT department FROM employees ORDER BY department",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(departments)
    }

    async fn create(&self, employee: &Employee) -> AppResult<Employee> {
        sqlx::query_as::<_, Employee>(
            r#"
            INSERT INTO employees (id, name, role, email, department, department_key, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(employee.id)
        .bind(&employee.name)
        .bind(&employee.role)
        .bind(&employee.email)
        .bind(&employee.department)
        .bind(&employee.department_key)
        .bind(employee.status)
        .bind(employee.created_at)
        .bind(employee.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_store(e, "Employee e-mail already registered"))
    }

    async fn update(&self, employee: &Employee) -> AppResult<Option<Employee>> {
        sqlx::query_as::<_, Employee>(
            r#"
            UPDATE employees
            SET name = $2, role = $3, email = $4, department = $5, department_key = $6, updated_at = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(employee.id)
        .bind(&employee.name)
        .bind(&employee.role)
        .bind(&employee.email)
        .bind(&employee.department)
        .bind(&employee.department_key)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_store(e, "Employee e-mail already registered"))
    }

    async fn reactivate(&self, id: Uuid) -> AppResult<Option<Employee>> {
        let employee = sqlx::query_as::<_, Employee>(
            "UPDATE employees SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(EmployeeStatus::Active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(employee)
    }

    async fn deactivate(&self, id: Uuid) -> AppResult<Deactivation> {
        let mut tx = self.pool.begin().await?;

        // Issues hold a shared lock on the employee, so this waits for any
        // in-flight issue to finish before counting.
        let locked = sqlx::query_scalar::<_, Uuid>("SELECT id FROM employees WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(Deactivation::NotFound);
        }

        let active: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM allocations WHERE employee_id = $1 AND returned_at IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if active > 0 {
            return Ok(Deactivation::Blocked(active));
        }

        let employee = sqlx::query_as::<_, Employee>(
            "UPDATE employees SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(EmployeeStatus::Terminated)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Deactivation::Deactivated(employee))
    }
}
