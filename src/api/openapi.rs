//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{allocations, audit, employees, equipments, health};

/// Registers the bearer scheme referenced by every protected path
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Equipment Ledger API",
        version = "0.1.0",
        description = "Equipment issue and return ledger with department-scoped access",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&BearerAuth),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Allocations
        allocations::create_allocations,
        allocations::list_allocations,
        allocations::get_allocation,
        allocations::return_allocation,
        allocations::return_batch,
        allocations::sign_term,
        // Employees
        employees::list_employees,
        employees::list_departments,
        employees::get_employee,
        employees::create_employee,
        employees::update_employee,
        employees::deactivate_employee,
        // Equipment
        equipments::list_equipments,
        equipments::get_equipment,
        equipments::create_equipment,
        equipments::update_equipment,
        equipments::delete_equipment,
        // Audit
        audit::list_events,
        audit::list_coordinators,
    ),
    components(
        schemas(
            // Allocations
            crate::models::allocation::Allocation,
            crate::models::allocation::AllocationDetails,
            crate::models::allocation::AllocationQuery,
            crate::models::allocation::CreateAllocation,
            crate::models::allocation::ReturnAllocation,
            crate::models::allocation::BatchReturnRequest,
            crate::models::allocation::SignTerm,
            crate::models::allocation::MovementType,
            // Employees
            crate::models::employee::Employee,
            crate::models::employee::EmployeeStatus,
            crate::models::employee::CreateEmployee,
            crate::models::employee::UpdateEmployee,
            crate::models::employee::EmployeeQuery,
            // Equipment
            crate::models::equipment::Equipment,
            crate::models::equipment::EquipmentStatus,
            crate::models::equipment::Classification,
            crate::models::equipment::ReturnDestination,
            crate::models::equipment::CreateEquipment,
            crate::models::equipment::UpdateEquipment,
            crate::models::equipment::EquipmentQuery,
            // Audit
            crate::models::audit::AuditEvent,
            crate::models::audit::AuditKind,
            crate::models::audit::AuditQuery,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "allocations", description = "Equipment issue and return"),
        (name = "employees", description = "Employee registry"),
        (name = "equipments", description = "Equipment registry"),
        (name = "audit", description = "Lifecycle audit trail")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
