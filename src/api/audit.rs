//! Audit endpoints (admin only)

use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::extract::WithRejection;

use crate::{
    error::{AppError, AppResult},
    models::audit::{AuditEvent, AuditQuery},
    AppState,
};

use super::AuthenticatedUser;

/// Equipment lifecycle events, newest first
#[utoipa::path(
    get,
    path = "/audit",
    tag = "audit",
    security(("bearer_auth" = [])),
    params(AuditQuery),
    responses(
        (status = 200, description = "Issue and return events", body = Vec<AuditEvent>),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_events(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    WithRejection(Query(query), _): WithRejection<Query<AuditQuery>, AppError>,
) -> AppResult<Json<Vec<AuditEvent>>> {
    caller.require_admin()?;

    let events = state.services.audit.events(query.department.as_deref()).await?;
    Ok(Json(events))
}

/// Names of everyone recorded as issuing or receiving equipment
#[utoipa::path(
    get,
    path = "/audit/coordinators",
    tag = "audit",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Distinct actor names, sorted", body = Vec<String>),
        (status = 403, description = "Administrator privileges required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_coordinators(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<Vec<String>>> {
    caller.require_admin()?;

    let names = state.services.audit.coordinators().await?;
    Ok(Json(names))
}
