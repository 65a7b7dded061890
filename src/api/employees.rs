//! Employee registry endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::employee::{CreateEmployee, Employee, EmployeeQuery, UpdateEmployee},
    AppState,
};

use super::AuthenticatedUser;

/// List employees visible to the caller
#[utoipa::path(
    get,
    path = "/employees",
    tag = "employees",
    security(("bearer_auth" = [])),
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Employees ordered by name", body = Vec<Employee>)
    )
)]
pub async fn list_employees(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    WithRejection(Query(query), _): WithRejection<Query<EmployeeQuery>, AppError>,
) -> AppResult<Json<Vec<Employee>>> {
    let employees = state.services.employees.list(&caller, query).await?;
    Ok(Json(employees))
}

/// List distinct departments
#[utoipa::path(
    get,
    path = "/employees/departments",
    tag = "employees",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Department names", body = Vec<String>)
    )
)]
pub async fn list_departments(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<Vec<String>>> {
    let departments = state.services.employees.departments(&caller).await?;
    Ok(Json(departments))
}

/// Get employee by ID
#[utoipa::path(
    get,
    path = "/employees/{id}",
    tag = "employees",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee", body = Employee),
        (status = 403, description = "Employee outside the caller's department", body = crate::error::ErrorResponse),
        (status = 404, description = "Employee not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_employee(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<Employee>> {
    let employee = state.services.employees.get(&caller, id).await?;
    Ok(Json(employee))
}

/// Create an employee
#[utoipa::path(
    post,
    path = "/employees",
    tag = "employees",
    security(("bearer_auth" = [])),
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Department outside the caller's scope", body = crate::error::ErrorResponse),
        (status = 409, description = "E-mail already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_employee(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    WithRejection(Json(data), _): WithRejection<Json<CreateEmployee>, AppError>,
) -> AppResult<(StatusCode, Json<Employee>)> {
    let employee = state.services.employees.create(&caller, data).await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

/// Update an employee
#[utoipa::path(
    patch,
    path = "/employees/{id}",
    tag = "employees",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Employee ID")),
    request_body = UpdateEmployee,
    responses(
        (status = 200, description = "Employee updated", body = Employee),
        (status = 404, description = "Employee not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Employee still holds equipment", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_employee(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(data), _): WithRejection<Json<UpdateEmployee>, AppError>,
) -> AppResult<Json<Employee>> {
    let employee = state.services.employees.update(&caller, id, data).await?;
    Ok(Json(employee))
}

/// Deactivate an employee (soft delete)
#[utoipa::path(
    delete,
    path = "/employees/{id}",
    tag = "employees",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee deactivated", body = Employee),
        (status = 404, description = "Employee not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Employee still holds equipment", body = crate::error::ErrorResponse)
    )
)]
pub async fn deactivate_employee(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
) -> AppResult<Json<Employee>> {
    let employee = state.services.employees.deactivate(&caller, id).await?;
    Ok(Json(employee))
}
