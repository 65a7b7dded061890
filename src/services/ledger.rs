//! Allocation transaction engine
//!
//! Issue and return are each one [`LedgerTx`](crate::repository::LedgerTx):
//! preconditions are read under row locks and every ledger row and status
//! flip lands together or not at all.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::Utc;
use indexmap::IndexSet;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        allocation::{Allocation, AllocationReturn, IssueAllocation, MovementType, ReturnAllocations},
        equipment::{EquipmentStatus, ReturnDestination},
    },
    repository::LedgerStore,
};

#[derive(Clone)]
pub struct AllocationEngine {
    store: Arc<dyn LedgerStore>,
}

impl AllocationEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Issue equipment to an employee, one allocation row per unit
    pub async fn issue(&self, request: IssueAllocation) -> AppResult<Vec<Allocation>> {
        let equipment_ids: Vec<Uuid> = request
            .equipment_ids
            .iter()
            .copied()
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();
        if equipment_ids.is_empty() {
            return Err(AppError::InvalidArgument(
                "At least one equipment id is required".to_string(),
            ));
        }

        let movement_type = request.movement_type.unwrap_or_default();
        let return_deadline = match movement_type {
            MovementType::Avulsa => request.return_deadline,
            MovementType::Kit => None,
        };
        let allocated_at = request.allocated_at.unwrap_or_else(Utc::now);
        let (performed_by, performed_by_name) = match request.actor {
            Some(actor) => (Some(actor.id), actor.name),
            None => (None, None),
        };

        let mut tx = self.store.begin().await?;

        let employee = tx
            .lock_employee(request.employee_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", request.employee_id)))?;
        if !employee.is_active() {
            tracing::warn!(employee_id = %employee.id, "Issue refused for terminated employee");
            return Err(AppError::Conflict(format!(
                "Employee {} is terminated",
                employee.id
            )));
        }

        let locked: HashMap<Uuid, EquipmentStatus> = tx
            .lock_equipment(&equipment_ids)
            .await?
            .into_iter()
            .map(|e| (e.id, e.status))
            .collect();
        for id in &equipment_ids {
            match locked.get(id) {
                None => return Err(AppError::NotFound(format!("Equipment {} not found", id))),
                Some(EquipmentStatus::Allocated) => {
                    tracing::warn!(equipment_id = %id, "Issue refused, equipment already allocated");
                    return Err(AppError::Conflict(format!(
                        "Equipment {} is already allocated",
                        id
                    )));
                }
                Some(_) => {}
            }
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(equipment_ids.len());
        for equipment_id in equipment_ids {
            let allocation = Allocation {
                id: Uuid::new_v4(),
                employee_id: employee.id,
                equipment_id,
                allocated_at,
                returned_at: None,
                notes: request.notes.clone(),
                movement_type,
                return_deadline,
                performed_by,
                performed_by_name: performed_by_name.clone(),
                returned_by: None,
                returned_by_name: None,
                term_signed: false,
                term_signed_at: None,
                created_at: now,
            };
            created.push(tx.insert_allocation(&allocation).await?);
            tx.set_equipment_status(equipment_id, EquipmentStatus::Allocated, now)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            employee_id = %employee.id,
            count = created.len(),
            movement_type = %movement_type,
            "Equipment issued"
        );
        Ok(created)
    }

    /// Close one or more active allocations and restore their equipment.
    /// Rows come back in request order.
    pub async fn return_allocations(&self, request: ReturnAllocations) -> AppResult<Vec<Allocation>> {
        let ids = request.allocation_ids;
        if ids.is_empty() {
            return Err(AppError::InvalidArgument(
                "At least one allocation id is required".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(ids.len());
        for id in &ids {
            if !seen.insert(*id) {
                return Err(AppError::InvalidArgument(format!(
                    "Allocation {} is listed more than once",
                    id
                )));
            }
        }
        if let Some(stray) = request
            .notes
            .keys()
            .chain(request.destinations.keys())
            .find(|id| !seen.contains(*id))
        {
            return Err(AppError::InvalidArgument(format!(
                "Allocation {} has notes or a destination but is not being returned",
                stray
            )));
        }

        let returned_at = request.returned_at.unwrap_or_else(Utc::now);
        let (returned_by, returned_by_name) = match request.actor {
            Some(actor) => (Some(actor.id), actor.name),
            None => (None, None),
        };

        let mut tx = self.store.begin().await?;

        let locked: HashMap<Uuid, Allocation> = tx
            .lock_allocations(&ids)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();
        for id in &ids {
            let allocation = locked
                .get(id)
                .ok_or_else(|| AppError::NotFound(format!("Allocation {} not found", id)))?;
            if !allocation.is_active() {
                tracing::warn!(allocation_id = %id, "Return refused, allocation already returned");
                return Err(AppError::Conflict(format!(
                    "Allocation {} was already returned",
                    id
                )));
            }
            if returned_at < allocation.allocated_at {
                return Err(AppError::InvalidArgument(format!(
                    "Allocation {}: return date precedes the issue date",
                    id
                )));
            }
        }

        let now = Utc::now();
        let mut returned = Vec::with_capacity(ids.len());
        for id in &ids {
            let notes = match request.notes.get(id) {
                Some(note) => Some(note.clone()),
                None => locked.get(id).and_then(|a| a.notes.clone()),
            };
            let closing = AllocationReturn {
                id: *id,
                returned_at,
                notes,
                returned_by,
                returned_by_name: returned_by_name.clone(),
            };
            let closed = tx
                .close_allocation(&closing)
                .await?
                .ok_or_else(|| AppError::Conflict(format!("Allocation {} was already returned", id)))?;

            let destination = request.destinations.get(id).copied().unwrap_or_default();
            tx.set_equipment_status(closed.equipment_id, destination.into(), now)
                .await?;
            returned.push(closed);
        }

        tx.commit().await?;

        tracing::info!(
            count = returned.len(),
            maintenance = request
                .destinations
                .values()
                .filter(|d| **d == ReturnDestination::Maintenance)
                .count(),
            "Allocations returned"
        );
        Ok(returned)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate};

    use super::*;
    use crate::{
        models::{
            allocation::{Actor, AllocationFilter},
            employee::Employee,
            equipment::Equipment,
        },
        repository::{LedgerTx, MemoryStore},
        services::testing::{at, Fixture},
    };

    fn issue_request(employee_id: Uuid, equipment_ids: Vec<Uuid>) -> IssueAllocation {
        IssueAllocation {
            employee_id,
            equipment_ids,
            allocated_at: None,
            notes: None,
            return_deadline: None,
            movement_type: None,
            actor: Some(Actor {
                id: Uuid::new_v4(),
                name: Some("Ana Admin".to_string()),
            }),
        }
    }

    fn return_request(ids: Vec<Uuid>) -> ReturnAllocations {
        ReturnAllocations {
            allocation_ids: ids,
            ..Default::default()
        }
    }

    async fn ledger_rows(fixture: &Fixture) -> usize {
        fixture
            .repository
            .allocations
            .list(&AllocationFilter::default())
            .await
            .unwrap()
            .len()
    }

    /// Ledger whose transactions fail on the n-th insert
    struct FailingLedger {
        inner: MemoryStore,
        fail_on_insert: usize,
    }

    struct FailingTx {
        inner: Box<dyn LedgerTx>,
        inserts: usize,
        fail_on_insert: usize,
    }

    #[async_trait]
    impl LedgerStore for FailingLedger {
        async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
            Ok(Box::new(FailingTx {
                inner: self.inner.begin().await?,
                inserts: 0,
                fail_on_insert: self.fail_on_insert,
            }))
        }

        async fn ping(&self) -> AppResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl LedgerTx for FailingTx {
        async fn lock_employee(&mut self, id: Uuid) -> AppResult<Option<Employee>> {
            self.inner.lock_employee(id).await
        }

        async fn lock_equipment(&mut self, ids: &[Uuid]) -> AppResult<Vec<Equipment>> {
            self.inner.lock_equipment(ids).await
        }

        async fn lock_allocations(&mut self, ids: &[Uuid]) -> AppResult<Vec<Allocation>> {
            self.inner.lock_allocations(ids).await
        }

        async fn insert_allocation(&mut self, allocation: &Allocation) -> AppResult<Allocation> {
            self.inserts += 1;
            if self.inserts == self.fail_on_insert {
                return Err(AppError::Internal("injected failure".to_string()));
            }
            self.inner.insert_allocation(allocation).await
        }

        async fn close_allocation(&mut self, closing: &AllocationReturn) -> AppResult<Option<Allocation>> {
            self.inner.close_allocation(closing).await
        }

        async fn set_equipment_status(
            &mut self,
            id: Uuid,
            status: EquipmentStatus,
            at: DateTime<Utc>,
        ) -> AppResult<()> {
            self.inner.set_equipment_status(id, status, at).await
        }

        async fn commit(self: Box<Self>) -> AppResult<()> {
            self.inner.commit().await
        }
    }

    #[tokio::test]
    async fn test_issue_creates_rows_and_flips_status() {
        let fixture = Fixture::new();
        let engine = AllocationEngine::new(fixture.repository.ledger.clone());
        let employee = fixture.employee("Bruno", "Financeiro").await;
        let a = fixture.equipment("Notebook A").await;
        let b = fixture.equipment("Monitor B").await;

        let rows = engine
            .issue(issue_request(employee.id, vec![a.id, b.id]))
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].equipment_id, a.id);
        assert_eq!(rows[1].equipment_id, b.id);
        assert!(rows.iter().all(|r| r.is_active() && r.employee_id == employee.id));
        assert_eq!(rows[0].performed_by_name.as_deref(), Some("Ana Admin"));
        assert_eq!(fixture.equipment_status(a.id).await, EquipmentStatus::Allocated);
        assert_eq!(fixture.equipment_status(b.id).await, EquipmentStatus::Allocated);
    }

    #[tokio::test]
    async fn test_issue_dedupes_equipment_ids() {
        let fixture = Fixture::new();
        let engine = AllocationEngine::new(fixture.repository.ledger.clone());
        let employee = fixture.employee("Bruno", "Financeiro").await;
        let a = fixture.equipment("Notebook A").await;
        let b = fixture.equipment("Monitor B").await;

        let rows = engine
            .issue(issue_request(employee.id, vec![b.id, a.id, b.id]))
            .await
            .unwrap();

        let ids: Vec<Uuid> = rows.iter().map(|r| r.equipment_id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_issue_empty_list_is_invalid() {
        let fixture = Fixture::new();
        let engine = AllocationEngine::new(fixture.repository.ledger.clone());
        let employee = fixture.employee("Bruno", "Financeiro").await;

        let result = engine.issue(issue_request(employee.id, vec![])).await;
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_issue_allocated_equipment_conflicts_without_new_row() {
        let fixture = Fixture::new();
        let engine = AllocationEngine::new(fixture.repository.ledger.clone());
        let first = fixture.employee("Bruno", "Financeiro").await;
        let second = fixture.employee("Clara", "Financeiro").await;
        let a = fixture.equipment("Notebook A").await;
        let b = fixture.equipment("Monitor B").await;

        engine.issue(issue_request(first.id, vec![a.id])).await.unwrap();
        let result = engine.issue(issue_request(second.id, vec![b.id, a.id])).await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(ledger_rows(&fixture).await, 1);
        assert_eq!(fixture.equipment_status(b.id).await, EquipmentStatus::Available);
    }

    #[tokio::test]
    async fn test_issue_to_terminated_employee_conflicts() {
        let fixture = Fixture::new();
        let engine = AllocationEngine::new(fixture.repository.ledger.clone());
        let employee = fixture.employee("Bruno", "Financeiro").await;
        fixture.repository.employees.deactivate(employee.id).await.unwrap();
        let a = fixture.equipment("Notebook A").await;

        let result = engine.issue(issue_request(employee.id, vec![a.id])).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_issue_unknown_references_not_found() {
        let fixture = Fixture::new();
        let engine = AllocationEngine::new(fixture.repository.ledger.clone());
        let employee = fixture.employee("Bruno", "Financeiro").await;
        let a = fixture.equipment("Notebook A").await;

        let missing_employee = engine.issue(issue_request(Uuid::new_v4(), vec![a.id])).await;
        assert!(matches!(missing_employee, Err(AppError::NotFound(_))));

        let missing_equipment = engine
            .issue(issue_request(employee.id, vec![a.id, Uuid::new_v4()]))
            .await;
        assert!(matches!(missing_equipment, Err(AppError::NotFound(_))));
        assert_eq!(fixture.equipment_status(a.id).await, EquipmentStatus::Available);
    }

    #[tokio::test]
    async fn test_issue_deadline_only_kept_for_avulsa() {
        let fixture = Fixture::new();
        let engine = AllocationEngine::new(fixture.repository.ledger.clone());
        let employee = fixture.employee("Bruno", "Financeiro").await;
        let a = fixture.equipment("Tripod").await;
        let b = fixture.equipment("Ringlight").await;
        let deadline = NaiveDate::from_ymd_opt(2026, 3, 1);

        let mut kit = issue_request(employee.id, vec![a.id]);
        kit.return_deadline = deadline;
        let kit_rows = engine.issue(kit).await.unwrap();
        assert_eq!(kit_rows[0].movement_type, MovementType::Kit);
        assert_eq!(kit_rows[0].return_deadline, None);

        let mut loan = issue_request(employee.id, vec![b.id]);
        loan.movement_type = Some(MovementType::Avulsa);
        loan.return_deadline = deadline;
        let loan_rows = engine.issue(loan).await.unwrap();
        assert_eq!(loan_rows[0].return_deadline, deadline);
    }

    #[tokio::test]
    async fn test_issue_failure_after_first_insert_rolls_back() {
        let fixture = Fixture::new();
        let failing = Arc::new(FailingLedger {
            inner: fixture.store.clone(),
            fail_on_insert: 2,
        });
        let engine = AllocationEngine::new(failing);
        let employee = fixture.employee("Bruno", "Financeiro").await;
        let a = fixture.equipment("Notebook A").await;
        let b = fixture.equipment("Monitor B").await;

        let result = engine.issue(issue_request(employee.id, vec![a.id, b.id])).await;

        assert!(matches!(result, Err(AppError::Internal(_))));
        assert_eq!(ledger_rows(&fixture).await, 0);
        assert_eq!(fixture.equipment_status(a.id).await, EquipmentStatus::Available);
        assert_eq!(fixture.equipment_status(b.id).await, EquipmentStatus::Available);
    }

    #[tokio::test]
    async fn test_concurrent_issues_allocate_once() {
        let fixture = Fixture::new();
        let engine = AllocationEngine::new(fixture.repository.ledger.clone());
        let a = fixture.equipment("Notebook A").await;
        let mut employees = Vec::new();
        for name in ["Bruno", "Clara", "Davi", "Elisa"] {
            employees.push(fixture.employee(name, "Financeiro").await);
        }

        let handles: Vec<_> = employees
            .iter()
            .map(|employee| {
                let engine = engine.clone();
                let request = issue_request(employee.id, vec![a.id]);
                tokio::spawn(async move { engine.issue(request).await })
            })
            .collect();

        let mut won = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => won += 1,
                Err(AppError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(won, 1);
        assert_eq!(conflicts, 3);
        let active = fixture
            .repository
            .allocations
            .list(&AllocationFilter {
                active_only: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
    }

    #[tokio::test]
    async fn test_return_twice_conflicts_and_keeps_status() {
        let fixture = Fixture::new();
        let engine = AllocationEngine::new(fixture.repository.ledger.clone());
        let employee = fixture.employee("Bruno", "Financeiro").await;
        let a = fixture.equipment("Notebook A").await;
        let rows = engine.issue(issue_request(employee.id, vec![a.id])).await.unwrap();

        let mut first = return_request(vec![rows[0].id]);
        first.destinations.insert(rows[0].id, ReturnDestination::Maintenance);
        engine.return_allocations(first).await.unwrap();

        let second = engine.return_allocations(return_request(vec![rows[0].id])).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));
        assert_eq!(fixture.equipment_status(a.id).await, EquipmentStatus::Maintenance);
    }

    #[tokio::test]
    async fn test_batch_return_applies_destinations_and_timestamp() {
        let fixture = Fixture::new();
        let engine = AllocationEngine::new(fixture.repository.ledger.clone());
        let employee = fixture.employee("Bruno", "Financeiro").await;
        let x = fixture.equipment("Notebook X").await;
        let y = fixture.equipment("Headset Y").await;
        let rows = engine
            .issue(issue_request(employee.id, vec![x.id, y.id]))
            .await
            .unwrap();
        let returned_at = at("2026-02-20T09:30:00Z");

        let mut request = return_request(vec![rows[1].id, rows[0].id]);
        request.returned_at = Some(returned_at);
        request.destinations.insert(rows[0].id, ReturnDestination::Available);
        request.destinations.insert(rows[1].id, ReturnDestination::Maintenance);
        let returned = engine.return_allocations(request).await.unwrap();

        assert_eq!(returned[0].id, rows[1].id);
        assert_eq!(returned[1].id, rows[0].id);
        assert!(returned.iter().all(|r| r.returned_at == Some(returned_at)));
        assert_eq!(fixture.equipment_status(x.id).await, EquipmentStatus::Available);
        assert_eq!(fixture.equipment_status(y.id).await, EquipmentStatus::Maintenance);
    }

    #[tokio::test]
    async fn test_return_rejects_duplicates_and_stray_keys() {
        let fixture = Fixture::new();
        let engine = AllocationEngine::new(fixture.repository.ledger.clone());
        let employee = fixture.employee("Bruno", "Financeiro").await;
        let a = fixture.equipment("Notebook A").await;
        let rows = engine.issue(issue_request(employee.id, vec![a.id])).await.unwrap();

        let duplicate = engine
            .return_allocations(return_request(vec![rows[0].id, rows[0].id]))
            .await;
        assert!(matches!(duplicate, Err(AppError::InvalidArgument(_))));

        let mut stray = return_request(vec![rows[0].id]);
        stray.notes.insert(Uuid::new_v4(), "lost".to_string());
        let stray = engine.return_allocations(stray).await;
        assert!(matches!(stray, Err(AppError::InvalidArgument(_))));

        let empty = engine.return_allocations(return_request(vec![])).await;
        assert!(matches!(empty, Err(AppError::InvalidArgument(_))));
        assert_eq!(fixture.equipment_status(a.id).await, EquipmentStatus::Allocated);
    }

    #[tokio::test]
    async fn test_return_unknown_allocation_rolls_back_batch() {
        let fixture = Fixture::new();
        let engine = AllocationEngine::new(fixture.repository.ledger.clone());
        let employee = fixture.employee("Bruno", "Financeiro").await;
        let a = fixture.equipment("Notebook A").await;
        let rows = engine.issue(issue_request(employee.id, vec![a.id])).await.unwrap();

        let result = engine
            .return_allocations(return_request(vec![rows[0].id, Uuid::new_v4()]))
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        let stored = fixture.repository.allocations.get(rows[0].id).await.unwrap().unwrap();
        assert!(stored.is_active());
    }

    #[tokio::test]
    async fn test_return_before_issue_is_invalid() {
        let fixture = Fixture::new();
        let engine = AllocationEngine::new(fixture.repository.ledger.clone());
        let employee = fixture.employee("Bruno", "Financeiro").await;
        let a = fixture.equipment("Notebook A").await;
        let mut issue = issue_request(employee.id, vec![a.id]);
        issue.allocated_at = Some(at("2026-02-19T10:00:00Z"));
        let rows = engine.issue(issue).await.unwrap();

        let mut request = return_request(vec![rows[0].id]);
        request.returned_at = Some(at("2026-02-18T10:00:00Z"));
        let result = engine.return_allocations(request).await;
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_return_notes_override_or_keep() {
        let fixture = Fixture::new();
        let engine = AllocationEngine::new(fixture.repository.ledger.clone());
        let employee = fixture.employee("Bruno", "Financeiro").await;
        let a = fixture.equipment("Notebook A").await;
        let b = fixture.equipment("Mouse B").await;
        let mut issue = issue_request(employee.id, vec![a.id, b.id]);
        issue.notes = Some("onboarding kit".to_string());
        let rows = engine.issue(issue).await.unwrap();

        let mut request = return_request(vec![rows[0].id, rows[1].id]);
        request.notes.insert(rows[1].id, "scratched lid".to_string());
        request.actor = Some(Actor {
            id: Uuid::new_v4(),
            name: Some("Carla Coord".to_string()),
        });
        let returned = engine.return_allocations(request).await.unwrap();

        assert_eq!(returned[0].notes.as_deref(), Some("onboarding kit"));
        assert_eq!(returned[1].notes.as_deref(), Some("scratched lid"));
        assert_eq!(returned[0].returned_by_name.as_deref(), Some("Carla Coord"));
    }

    #[tokio::test]
    async fn test_issue_then_partial_return_scenario() {
        let fixture = Fixture::new();
        let engine = AllocationEngine::new(fixture.repository.ledger.clone());
        let employee = fixture.employee("Emp One", "Growth e Tecnologia").await;
        let eq1 = fixture.equipment("eq-1").await;
        let eq2 = fixture.equipment("eq-2").await;

        let mut issue = issue_request(employee.id, vec![eq1.id, eq2.id]);
        issue.allocated_at = Some(at("2026-02-19T10:00:00Z"));
        let rows = engine.issue(issue).await.unwrap();
        assert_eq!(rows.len(), 2);

        let mut request = return_request(vec![rows[0].id]);
        request.returned_at = Some(at("2026-02-19T15:00:00Z"));
        request.destinations.insert(rows[0].id, ReturnDestination::Maintenance);
        engine.return_allocations(request).await.unwrap();

        assert_eq!(fixture.equipment_status(eq1.id).await, EquipmentStatus::Maintenance);
        assert_eq!(fixture.equipment_status(eq2.id).await, EquipmentStatus::Allocated);
        let active = fixture
            .repository
            .allocations
            .count_active_for_employee(employee.id)
            .await
            .unwrap();
        assert_eq!(active, 1);
    }
}
