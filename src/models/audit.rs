//! Audit projection types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{allocation::MovementType, employee::EmployeeStatus};

/// Display name used when a ledger write carries no actor (rows written
/// before actors were tracked)
pub const LEGACY_ACTOR: &str = "system/legacy";

/// Lifecycle event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuditKind {
    Issue,
    Return,
}

/// One lifecycle event derived from an allocation row
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AuditEvent {
    /// `{allocation_id}-issue` or `{allocation_id}-return`
    pub id: String,
    pub allocation_id: Uuid,
    pub kind: AuditKind,
    pub movement_type: MovementType,
    pub date: DateTime<Utc>,
    pub performed_by: Option<Uuid>,
    /// Actor display name, or [`LEGACY_ACTOR`]
    pub performed_by_name: String,
    pub legacy_actor: bool,
    pub equipment_id: Uuid,
    pub equipment_name: String,
    pub serial_number: String,
    pub employee_id: Uuid,
    pub employee_name: String,
    pub employee_department: String,
    pub employee_status: EmployeeStatus,
}

/// Audit query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    /// Restrict to one department (accent, case and space insensitive)
    pub department: Option<String>,
}
