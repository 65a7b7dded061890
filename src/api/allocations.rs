//! Allocation endpoints: issue, return, listing and term signature

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::allocation::{
        Allocation, AllocationDetails, AllocationQuery, BatchReturnRequest,
        CreateAllocation, ReturnAllocation, SignTerm,
    },
    AppState,
};

use super::{AuthenticatedUser, OptionalJson};

/// Issue equipment to an employee
#[utoipa::path(
    post,
    path = "/allocations",
    tag = "allocations",
    security(("bearer_auth" = [])),
    request_body = CreateAllocation,
    responses(
        (status = 201, description = "Allocations created", body = Vec<Allocation>),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
        (status = 403, description = "Employee outside the caller's department", body = crate::error::ErrorResponse),
        (status = 404, description = "Employee or equipment not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Equipment already allocated or employee terminated", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_allocations(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    WithRejection(Json(request), _): WithRejection<Json<CreateAllocation>, AppError>,
) -> AppResult<(StatusCode, Json<Vec<Allocation>>)> {
    let rows = state.services.allocations.issue(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(rows)))
}

/// List allocations with their employee and equipment, newest first
#[utoipa::path(
    get,
    path = "/allocations",
    tag = "allocations",
    security(("bearer_auth" = [])),
    params(AllocationQuery),
    responses(
        (status = 200, description = "Allocations visible to the caller", body = Vec<AllocationDetails>)
    )
)]
pub async fn list_allocations(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    WithRejection(Query(query), _): WithRejection<Query<AllocationQuery>, AppError>,
) -> AppResult<Json<Vec<AllocationDetails>>> {
    let rows = state.services.allocations.list(&caller, query).await?;
    Ok(Json(rows))
}

/// Get one allocation
#[utoipa::path(
    get,
    path = "/allocations/{id}",
    tag = "allocations",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Allocation ID")),
    responses(
        (status = 200, description = "Allocation", body = Allocation),
        (status = 404, description = "Allocation not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_allocation(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<Allocation>> {
    let allocation = state.services.allocations.get(&caller, id).await?;
    Ok(Json(allocation))
}

/// Return one allocation
#[utoipa::path(
    patch,
    path = "/allocations/{id}/return",
    tag = "allocations",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Allocation ID")),
    request_body = ReturnAllocation,
    responses(
        (status = 200, description = "Allocation returned", body = Allocation),
        (status = 404, description = "Allocation not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Allocation already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_allocation(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    OptionalJson(request): OptionalJson<ReturnAllocation>,
) -> AppResult<Json<Allocation>> {
    let allocation = state.services.allocations.return_one(&caller, id, request).await?;
    Ok(Json(allocation))
}

/// Return several allocations atomically
#[utoipa::path(
    post,
    path = "/allocations/return-batch",
    tag = "allocations",
    security(("bearer_auth" = [])),
    request_body = BatchReturnRequest,
    responses(
        (status = 200, description = "Allocations returned, in request order", body = Vec<Allocation>),
        (status = 400, description = "Empty or duplicated ids", body = crate::error::ErrorResponse),
        (status = 404, description = "Some allocation not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Some allocation already returned", body = crate::error::ErrorResponse)
    )
)]
pub async fn return_batch(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    WithRejection(Json(request), _): WithRejection<Json<BatchReturnRequest>, AppError>,
) -> AppResult<Json<Vec<Allocation>>> {
    let outcome = state.services.allocations.return_batch(&caller, request).await?;
    Ok(Json(outcome.allocations))
}

/// Record the responsibility term signature
#[utoipa::path(
    post,
    path = "/allocations/{id}/term",
    tag = "allocations",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Allocation ID")),
    request_body = SignTerm,
    responses(
        (status = 200, description = "Term signed", body = Allocation),
        (status = 404, description = "Allocation not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Term already signed", body = crate::error::ErrorResponse)
    )
)]
pub async fn sign_term(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    OptionalJson(request): OptionalJson<SignTerm>,
) -> AppResult<Json<Allocation>> {
    let allocation = state.services.allocations.sign_term(&caller, id, request).await?;
    Ok(Json(allocation))
}
