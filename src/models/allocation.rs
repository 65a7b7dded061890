//! Allocation ledger model and related types

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{employee::Employee, equipment::Equipment, equipment::ReturnDestination};

text_enum! {
    /// How the equipment left the stock
    pub enum MovementType {
        /// Initial onboarding bundle
        Kit => "kit",
        /// One-off loan, usually with a return deadline
        Avulsa => "avulsa",
    }
}

impl Default for MovementType {
    fn default() -> Self {
        MovementType::Kit
    }
}

/// User recorded as having performed a ledger write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Actor {
    pub id: Uuid,
    pub name: Option<String>,
}

/// Allocation row from the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Allocation {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub equipment_id: Uuid,
    pub allocated_at: DateTime<Utc>,
    /// `None` while the allocation is active
    pub returned_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub movement_type: MovementType,
    pub return_deadline: Option<NaiveDate>,
    pub performed_by: Option<Uuid>,
    pub performed_by_name: Option<String>,
    pub returned_by: Option<Uuid>,
    pub returned_by_name: Option<String>,
    pub term_signed: bool,
    pub term_signed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Allocation {
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }
}

/// Allocation with its employee and equipment, for listings and audit
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AllocationDetails {
    #[serde(flatten)]
    pub allocation: Allocation,
    pub employee: Employee,
    pub equipment: Equipment,
}

/// Issue request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAllocation {
    pub employee_id: Uuid,
    /// Units to issue; duplicates are ignored
    #[serde(default)]
    pub equipment_ids: Vec<Uuid>,
    /// Single-unit shorthand, used when `equipment_ids` is empty
    pub equipment_id: Option<Uuid>,
    pub allocated_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// Only kept for `avulsa` movements
    pub return_deadline: Option<NaiveDate>,
    #[serde(alias = "type")]
    pub movement_type: Option<MovementType>,
}

impl CreateAllocation {
    pub fn into_issue(self, actor: Actor) -> IssueAllocation {
        let equipment_ids = if self.equipment_ids.is_empty() {
            self.equipment_id.into_iter().collect()
        } else {
            self.equipment_ids
        };
        IssueAllocation {
            employee_id: self.employee_id,
            equipment_ids,
            allocated_at: self.allocated_at,
            notes: self.notes,
            return_deadline: self.return_deadline,
            movement_type: self.movement_type,
            actor: Some(actor),
        }
    }
}

/// Single return request body
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReturnAllocation {
    pub returned_at: Option<DateTime<Utc>>,
    /// Replaces the issue notes when present
    pub notes: Option<String>,
    #[serde(default)]
    pub destination: ReturnDestination,
}

/// Batch return request body
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct BatchReturnRequest {
    pub allocation_ids: Vec<Uuid>,
    pub returned_at: Option<DateTime<Utc>>,
    /// Notes replacing the issue notes, per allocation
    #[serde(default, rename = "notes_by_allocation", alias = "notes")]
    pub notes: HashMap<Uuid, String>,
    /// Destination status per allocation, available when absent
    #[serde(default, rename = "destinations_by_allocation", alias = "destinations")]
    pub destinations: HashMap<Uuid, ReturnDestination>,
    /// Terminate every employee left without active allocations, as a
    /// separate write after the return commits
    #[serde(default)]
    pub deactivate_employee: bool,
}

/// Result of a batch return; only `allocations` goes on the wire
#[derive(Debug)]
pub struct BatchReturnOutcome {
    pub allocations: Vec<Allocation>,
    pub deactivated_employees: Vec<Uuid>,
}

/// Term signature request body
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SignTerm {
    pub signed_at: Option<DateTime<Utc>>,
}

/// Issue request handed to the transaction engine
#[derive(Debug, Clone)]
pub struct IssueAllocation {
    pub employee_id: Uuid,
    pub equipment_ids: Vec<Uuid>,
    pub allocated_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub return_deadline: Option<NaiveDate>,
    pub movement_type: Option<MovementType>,
    pub actor: Option<Actor>,
}

/// Return request handed to the transaction engine
#[derive(Debug, Clone, Default)]
pub struct ReturnAllocations {
    pub allocation_ids: Vec<Uuid>,
    pub returned_at: Option<DateTime<Utc>>,
    /// Notes replacing the issue notes, per allocation
    pub notes: HashMap<Uuid, String>,
    /// Destination status per allocation, available when absent
    pub destinations: HashMap<Uuid, ReturnDestination>,
    pub actor: Option<Actor>,
}

/// Column values written when closing one allocation
#[derive(Debug, Clone)]
pub struct AllocationReturn {
    pub id: Uuid,
    pub returned_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub returned_by: Option<Uuid>,
    pub returned_by_name: Option<String>,
}

/// Allocation list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct AllocationQuery {
    /// Only allocations that have not been returned
    pub active_only: Option<bool>,
    pub employee_id: Option<Uuid>,
}

/// Repository-level allocation filter
#[derive(Debug, Clone, Default)]
pub struct AllocationFilter {
    pub active_only: bool,
    pub employee_id: Option<Uuid>,
    pub department_key: Option<String>,
}

/// Allocation id with the normalized department of its employee
#[derive(Debug, Clone, FromRow)]
pub struct AllocationScope {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub department_key: String,
}
