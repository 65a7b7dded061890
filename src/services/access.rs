//! Access policy filter
//!
//! Admins are unrestricted. Coordinators only reach employees, and the
//! allocations of employees, whose normalized department equals the one in
//! their own profile.

use indexmap::IndexSet;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        allocation::AllocationScope,
        caller::Caller,
        employee::{normalize_department, Employee},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct AccessPolicy {
    repository: Repository,
}

impl AccessPolicy {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Department key that listings must be restricted to, `None` for admins
    pub fn scope(&self, caller: &Caller) -> AppResult<Option<String>> {
        if caller.is_admin() {
            return Ok(None);
        }
        caller
            .department_key
            .clone()
            .map(Some)
            .ok_or_else(|| AppError::Forbidden("Coordinator profile has no department".to_string()))
    }

    fn ensure_department_key(&self, caller: &Caller, key: &str) -> AppResult<()> {
        match self.scope(caller)? {
            Some(own) if own != key => Err(AppError::Forbidden(
                "Employee belongs to another department".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Check an already loaded employee against the caller's scope
    pub fn ensure_employee_visible(&self, caller: &Caller, employee: &Employee) -> AppResult<()> {
        self.ensure_department_key(caller, &employee.department_key)
    }

    /// Load an employee the caller is allowed to act on
    pub async fn ensure_employee_access(&self, caller: &Caller, employee_id: Uuid) -> AppResult<Employee> {
        let employee = self
            .repository
            .employees
            .get(employee_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", employee_id)))?;
        self.ensure_employee_visible(caller, &employee)?;
        Ok(employee)
    }

    /// Coordinators may only place employees in their own department
    pub fn ensure_department_assignment(&self, caller: &Caller, department: &str) -> AppResult<()> {
        self.ensure_department_key(caller, &normalize_department(department))
    }

    pub async fn ensure_allocation_access(&self, caller: &Caller, allocation_id: Uuid) -> AppResult<AllocationScope> {
        let mut scopes = self.ensure_allocations_access(caller, &[allocation_id]).await?;
        scopes
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("Allocation {} not found", allocation_id)))
    }

    /// Resolve every allocation id; a missing id fails with `NotFound` before
    /// any department is compared
    pub async fn ensure_allocations_access(
        &self,
        caller: &Caller,
        allocation_ids: &[Uuid],
    ) -> AppResult<Vec<AllocationScope>> {
        let ids: Vec<Uuid> = allocation_ids
            .iter()
            .copied()
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();
        if ids.is_empty() {
            return Err(AppError::InvalidArgument(
                "At least one allocation id is required".to_string(),
            ));
        }

        let scopes = self.repository.allocations.scopes(&ids).await?;
        if scopes.len() != ids.len() {
            return Err(AppError::NotFound(format!(
                "{} of {} allocations not found",
                ids.len() - scopes.len(),
                ids.len()
            )));
        }

        if let Some(own) = self.scope(caller)? {
            if scopes.iter().any(|s| s.department_key != own) {
                tracing::warn!(user_id = %caller.user_id, "Allocation outside coordinator department");
                return Err(AppError::Forbidden(
                    "Allocation belongs to another department".to_string(),
                ));
            }
        }
        Ok(scopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::allocation::IssueAllocation,
        services::{
            ledger::AllocationEngine,
            testing::{admin, coordinator, Fixture},
        },
    };

    async fn allocate(fixture: &Fixture, employee: &Employee) -> Uuid {
        let equipment = fixture.equipment("Notebook").await;
        let engine = AllocationEngine::new(fixture.repository.ledger.clone());
        let rows = engine
            .issue(IssueAllocation {
                employee_id: employee.id,
                equipment_ids: vec![equipment.id],
                allocated_at: None,
                notes: None,
                return_deadline: None,
                movement_type: None,
                actor: None,
            })
            .await
            .unwrap();
        rows[0].id
    }

    #[tokio::test]
    async fn test_coordinator_blocked_from_other_department() {
        let fixture = Fixture::new();
        let policy = AccessPolicy::new(fixture.repository.clone());
        let employee = fixture.employee("Bruno", "Financeiro").await;
        let caller = coordinator("Growth e Tecnologia");

        let result = policy.ensure_employee_access(&caller, employee.id).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));

        let allowed = policy.ensure_employee_access(&admin(), employee.id).await;
        assert_eq!(allowed.unwrap().id, employee.id);
    }

    #[tokio::test]
    async fn test_department_match_ignores_accents_case_and_spacing() {
        let fixture = Fixture::new();
        let policy = AccessPolicy::new(fixture.repository.clone());
        let employee = fixture.employee("Bruno", "Engenharia de Soluções").await;
        let caller = coordinator("engenharia de  solucoes");

        assert!(policy.ensure_employee_access(&caller, employee.id).await.is_ok());
        assert!(policy.ensure_department_assignment(&caller, "ENGENHARIA DE SOLUÇÕES").is_ok());
        assert!(matches!(
            policy.ensure_department_assignment(&caller, "Financeiro"),
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_coordinator_without_department_is_forbidden() {
        let fixture = Fixture::new();
        let policy = AccessPolicy::new(fixture.repository.clone());
        let mut caller = coordinator("Financeiro");
        caller.department_key = None;

        assert!(matches!(policy.scope(&caller), Err(AppError::Forbidden(_))));
        assert_eq!(policy.scope(&admin()).unwrap(), None);
    }

    #[tokio::test]
    async fn test_batch_missing_id_is_not_found_before_department_check() {
        let fixture = Fixture::new();
        let policy = AccessPolicy::new(fixture.repository.clone());
        let employee = fixture.employee("Bruno", "Financeiro").await;
        let allocation = allocate(&fixture, &employee).await;
        let caller = coordinator("Growth e Tecnologia");

        let missing = policy
            .ensure_allocations_access(&caller, &[allocation, Uuid::new_v4()])
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let foreign = policy.ensure_allocations_access(&caller, &[allocation]).await;
        assert!(matches!(foreign, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_batch_within_department_resolves_scopes() {
        let fixture = Fixture::new();
        let policy = AccessPolicy::new(fixture.repository.clone());
        let employee = fixture.employee("Bruno", "Growth e Tecnologia").await;
        let first = allocate(&fixture, &employee).await;
        let second = allocate(&fixture, &employee).await;

        let scopes = policy
            .ensure_allocations_access(&coordinator("growth e tecnologia"), &[first, second])
            .await
            .unwrap();
        assert_eq!(scopes.len(), 2);
        assert!(scopes.iter().all(|s| s.employee_id == employee.id));

        let empty = policy.ensure_allocations_access(&admin(), &[]).await;
        assert!(matches!(empty, Err(AppError::InvalidArgument(_))));
    }
}
