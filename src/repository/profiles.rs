//! Caller role and profile lookup

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use super::ProfilesRepository;
use crate::{
    error::AppResult,
    models::caller::{CallerProfile, Role},
};

#[derive(Clone)]
pub struct PgProfilesRepository {
    pool: Pool<Postgres>,
}

impl PgProfilesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfilesRepository for PgProfilesRepository {
    async fn find(&self, user_id: Uuid) -> AppResult<CallerProfile> {
        let row = sqlx::query(
            r#"
            SELECT r.role, p.name, p.department
            FROM (SELECT $1::uuid AS user_id) u
            LEFT JOIN user_roles r ON r.user_id = u.user_id
            LEFT JOIN profiles p ON p.user_id = u.user_id
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(CallerProfile {
            role: row.try_get::<Option<Role>, _>("role")?,
            name: row.try_get("name")?,
            department: row.try_get("department")?,
        })
    }
}
