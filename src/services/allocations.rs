//! Allocation workflow service
//!
//! Puts the access policy in front of the transaction engine and runs the
//! offboarding step that follows a batch return.

use chrono::Utc;
use indexmap::IndexSet;
use uuid::Uuid;

use super::{access::AccessPolicy, ledger::AllocationEngine};
use crate::{
    error::{AppError, AppResult},
    models::{
        allocation::{
            Allocation, AllocationDetails, AllocationFilter, AllocationQuery, BatchReturnOutcome,
            BatchReturnRequest, CreateAllocation, ReturnAllocation, ReturnAllocations, SignTerm,
        },
        caller::Caller,
        employee::Deactivation,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct AllocationsService {
    repository: Repository,
    access: AccessPolicy,
    engine: AllocationEngine,
}

impl AllocationsService {
    pub fn new(repository: Repository, access: AccessPolicy, engine: AllocationEngine) -> Self {
        Self {
            repository,
            access,
            engine,
        }
    }

    /// Issue one or more units to an employee
    pub async fn issue(&self, caller: &Caller, request: CreateAllocation) -> AppResult<Vec<Allocation>> {
        self.access
            .ensure_employee_access(caller, request.employee_id)
            .await?;
        self.engine.issue(request.into_issue(caller.actor())).await
    }

    /// Return a single allocation
    pub async fn return_one(
        &self,
        caller: &Caller,
        id: Uuid,
        request: ReturnAllocation,
    ) -> AppResult<Allocation> {
        self.access.ensure_allocation_access(caller, id).await?;

        let mut returning = ReturnAllocations {
            allocation_ids: vec![id],
            returned_at: request.returned_at,
            actor: Some(caller.actor()),
            ..Default::default()
        };
        if let Some(notes) = request.notes {
            returning.notes.insert(id, notes);
        }
        returning.destinations.insert(id, request.destination);

        self.engine
            .return_allocations(returning)
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal(format!("Return of allocation {} produced no row", id)))
    }

    /// Return several allocations at once, optionally terminating the
    /// employees left without equipment
    pub async fn return_batch(
        &self,
        caller: &Caller,
        request: BatchReturnRequest,
    ) -> AppResult<BatchReturnOutcome> {
        let scopes = self
            .access
            .ensure_allocations_access(caller, &request.allocation_ids)
            .await?;

        let allocations = self
            .engine
            .return_allocations(ReturnAllocations {
                allocation_ids: request.allocation_ids,
                returned_at: request.returned_at,
                notes: request.notes,
                destinations: request.destinations,
                actor: Some(caller.actor()),
            })
            .await?;

        let mut deactivated_employees = Vec::new();
        if request.deactivate_employee {
            let employees: IndexSet<Uuid> = scopes.iter().map(|s| s.employee_id).collect();
            for employee_id in employees {
                // Separate write, after the return has committed
                match self.repository.employees.deactivate(employee_id).await? {
                    Deactivation::Deactivated(employee) => {
                        tracing::info!(employee_id = %employee.id, "Employee offboarded");
                        deactivated_employees.push(employee.id);
                    }
                    Deactivation::Blocked(active) => {
                        tracing::info!(%employee_id, active, "Employee keeps active allocations");
                    }
                    Deactivation::NotFound => {
                        tracing::warn!(%employee_id, "Employee vanished before offboarding");
                    }
                }
            }
        }

        Ok(BatchReturnOutcome {
            allocations,
            deactivated_employees,
        })
    }

    /// Allocations visible to the caller, newest first
    pub async fn list(&self, caller: &Caller, query: AllocationQuery) -> AppResult<Vec<AllocationDetails>> {
        let filter = AllocationFilter {
            active_only: query.active_only.unwrap_or(false),
            employee_id: query.employee_id,
            department_key: self.access.scope(caller)?,
        };
        self.repository.allocations.list(&filter).await
    }

    pub async fn get(&self, caller: &Caller, id: Uuid) -> AppResult<Allocation> {
        self.access.ensure_allocation_access(caller, id).await?;
        self.repository
            .allocations
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Allocation {} not found", id)))
    }

    /// Record the signature of the responsibility term
    pub async fn sign_term(&self, caller: &Caller, id: Uuid, request: SignTerm) -> AppResult<Allocation> {
        self.access.ensure_allocation_access(caller, id).await?;
        let signed_at = request.signed_at.unwrap_or_else(Utc::now);

        match self.repository.allocations.sign_term(id, signed_at).await? {
            Some(allocation) => Ok(allocation),
            None => match self.repository.allocations.get(id).await? {
                Some(_) => Err(AppError::Conflict(format!(
                    "Term of allocation {} is already signed",
                    id
                ))),
                None => Err(AppError::NotFound(format!("Allocation {} not found", id))),
            },
        }
    }
}
