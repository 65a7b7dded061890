//! API handlers for the equipment ledger REST endpoints

pub mod allocations;
pub mod audit;
pub mod employees;
pub mod equipments;
pub mod health;
pub mod openapi;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, patch, post},
    Router,
};
use serde::de::DeserializeOwned;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::caller::Caller, AppState};

/// Extractor for the caller behind the bearer token
pub struct AuthenticatedUser(pub Caller);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid authorization header format".to_string()))?;

        let caller = state.services.identity.authenticate(token.trim()).await?;
        Ok(AuthenticatedUser(caller))
    }
}

/// JSON body that may be omitted; an empty body yields `T::default()`
pub struct OptionalJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::InvalidArgument(e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(OptionalJson)
            .map_err(|e| AppError::InvalidArgument(format!("Invalid JSON body: {}", e)))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Allocations
        .route(
            "/allocations",
            get(allocations::list_allocations).post(allocations::create_allocations),
        )
        .route("/allocations/return-batch", post(allocations::return_batch))
        .route("/allocations/:id", get(allocations::get_allocation))
        .route("/allocations/:id/return", patch(allocations::return_allocation))
        .route("/allocations/:id/term", post(allocations::sign_term))
        // Employees
        .route(
            "/employees",
            get(employees::list_employees).post(employees::create_employee),
        )
        .route("/employees/departments", get(employees::list_departments))
        .route(
            "/employees/:id",
            get(employees::get_employee)
                .patch(employees::update_employee)
                .delete(employees::deactivate_employee),
        )
        // Equipment
        .route(
            "/equipments",
            get(equipments::list_equipments).post(equipments::create_equipment),
        )
        .route(
            "/equipments/:id",
            get(equipments::get_equipment)
                .patch(equipments::update_equipment)
                .delete(equipments::delete_equipment),
        )
        // Audit
        .route("/audit", get(audit::list_events))
        .route("/audit/coordinators", get(audit::list_coordinators))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
