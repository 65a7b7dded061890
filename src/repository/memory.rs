//! In-memory store
//!
//! Backs tests and local runs without PostgreSQL. A ledger transaction takes
//! the store mutex for its whole lifetime and writes to a staged copy of the
//! state, which replaces the live state only on commit. Transactions are
//! therefore fully serialized, and a dropped transaction leaves no trace.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{
    AllocationsRepository, EmployeesRepository, EquipmentRepository, LedgerStore, LedgerTx,
    ProfilesRepository,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        allocation::{Allocation, AllocationDetails, AllocationFilter, AllocationReturn, AllocationScope},
        caller::CallerProfile,
        employee::{Deactivation, Employee, EmployeeFilter, EmployeeStatus},
        equipment::{Equipment, EquipmentQuery, EquipmentStatus},
    },
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    employees: HashMap<Uuid, Employee>,
    equipment: HashMap<Uuid, Equipment>,
    allocations: HashMap<Uuid, Allocation>,
    profiles: HashMap<Uuid, CallerProfile>,
}

impl MemoryState {
    fn has_active_allocation(&self, equipment_id: Uuid) -> bool {
        self.allocations
            .values()
            .any(|a| a.equipment_id == equipment_id && a.is_active())
    }

    fn active_count(&self, employee_id: Uuid) -> i64 {
        self.allocations
            .values()
            .filter(|a| a.employee_id == employee_id && a.is_active())
            .count() as i64
    }

    fn email_taken(&self, email: &str, except: Uuid) -> bool {
        self.employees
            .values()
            .any(|e| e.id != except && e.email == email)
    }

    fn serial_taken(&self, serial_number: &str, except: Uuid) -> bool {
        self.equipment
            .values()
            .any(|e| e.id != except && e.serial_number == serial_number)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the role and profile of an identity-provider user
    pub async fn insert_profile(&self, user_id: Uuid, profile: CallerProfile) {
        self.state.lock().await.profiles.insert(user_id, profile);
    }
}

#[async_trait]
impl EmployeesRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> AppResult<Option<Employee>> {
        Ok(self.state.lock().await.employees.get(&id).cloned())
    }

    async fn list(&self, filter: &EmployeeFilter) -> AppResult<Vec<Employee>> {
        let state = self.state.lock().await;
        let mut employees: Vec<Employee> = state
            .employees
            .values()
            .filter(|e| filter.include_inactive || e.is_active())
            .filter(|e| {
                filter
                    .department_key
                    .as_deref()
                    .map_or(true, |key| e.department_key == key)
            })
            .cloned()
            .collect();
        employees.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(employees)
    }

    async fn departments(&self) -> AppResult<Vec<String>> {
        let state = self.state.lock().await;
        let mut departments: Vec<String> = state.employees.values().map(|e| e.department.clone()).collect();
        departments.sort();
        departments.dedup();
        Ok(departments)
    }

    async fn create(&self, employee: &Employee) -> AppResult<Employee> {
        let mut state = self.state.lock().await;
        if state.email_taken(&employee.email, employee.id) {
            return Err(AppError::Conflict("Employee e-mail already registered".to_string()));
        }
        state.employees.insert(employee.id, employee.clone());
        Ok(employee.clone())
    }

    async fn update(&self, employee: &Employee) -> AppResult<Option<Employee>> {
        let mut state = self.state.lock().await;
        if state.email_taken(&employee.email, employee.id) {
            return Err(AppError::Conflict("Employee e-mail already registered".to_string()));
        }
        let Some(current) = state.employees.get_mut(&employee.id) else {
            return Ok(None);
        };
        current.name = employee.name.clone();
        current.role = employee.role.clone();
        current.email = employee.email.clone();
        current.department = employee.department.clone();
        current.department_key = employee.department_key.clone();
        current.updated_at = Utc::now();
        Ok(Some(current.clone()))
    }

    async fn reactivate(&self, id: Uuid) -> AppResult<Option<Employee>> {
        let mut state = self.state.lock().await;
        Ok(state.employees.get_mut(&id).map(|employee| {
            employee.status = EmployeeStatus::Active;
            employee.updated_at = Utc::now();
            employee.clone()
        }))
    }

    async fn deactivate(&self, id: Uuid) -> AppResult<Deactivation> {
        let mut state = self.state.lock().await;
        let active = state.active_count(id);
        let Some(employee) = state.employees.get_mut(&id) else {
            return Ok(Deactivation::NotFound);
        };
        if active > 0 {
            return Ok(Deactivation::Blocked(active));
        }
        employee.status = EmployeeStatus::Terminated;
        employee.updated_at = Utc::now();
        Ok(Deactivation::Deactivated(employee.clone()))
    }
}

#[async_trait]
impl EquipmentRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> AppResult<Option<Equipment>> {
        Ok(self.state.lock().await.equipment.get(&id).cloned())
    }

    async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Equipment> = state
            .equipment
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn create(&self, equipment: &Equipment) -> AppResult<Equipment> {
        let mut state = self.state.lock().await;
        if state.serial_taken(&equipment.serial_number, equipment.id) {
            return Err(AppError::Conflict("Serial number already registered".to_string()));
        }
        state.equipment.insert(equipment.id, equipment.clone());
        Ok(equipment.clone())
    }

    async fn update(&self, equipment: &Equipment) -> AppResult<Option<Equipment>> {
        let mut state = self.state.lock().await;
        if state.serial_taken(&equipment.serial_number, equipment.id) {
            return Err(AppError::Conflict("Serial number already registered".to_string()));
        }
        let Some(current) = state.equipment.get_mut(&equipment.id) else {
            return Ok(None);
        };
        let allocated = EquipmentStatus::Allocated;
        let status_ok = current.status == equipment.status
            || (current.status != allocated && equipment.status != allocated);
        if !status_ok {
            return Ok(None);
        }
        let mut updated = equipment.clone();
        updated.created_at = current.created_at;
        updated.updated_at = Utc::now();
        *current = updated.clone();
        Ok(Some(updated))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        if state.allocations.values().any(|a| a.equipment_id == id) {
            return Err(AppError::Conflict(format!(
                "Equipment {} has allocation history and cannot be deleted",
                id
            )));
        }
        Ok(state.equipment.remove(&id).is_some())
    }
}

#[async_trait]
impl AllocationsRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> AppResult<Option<Allocation>> {
        Ok(self.state.lock().await.allocations.get(&id).cloned())
    }

    async fn list(&self, filter: &AllocationFilter) -> AppResult<Vec<AllocationDetails>> {
        let state = self.state.lock().await;
        let mut rows = Vec::new();

        for allocation in state.allocations.values() {
            if filter.active_only && !allocation.is_active() {
                continue;
            }
            if filter.employee_id.map_or(false, |id| id != allocation.employee_id) {
                continue;
            }
            let (Some(employee), Some(equipment)) = (
                state.employees.get(&allocation.employee_id),
                state.equipment.get(&allocation.equipment_id),
            ) else {
                return Err(AppError::Internal(format!(
                    "Allocation {} references a missing employee or equipment",
                    allocation.id
                )));
            };
            if filter
                .department_key
                .as_deref()
                .map_or(false, |key| employee.department_key != key)
            {
                continue;
            }
            rows.push(AllocationDetails {
                allocation: allocation.clone(),
                employee: employee.clone(),
                equipment: equipment.clone(),
            });
        }

        rows.sort_by(|a, b| {
            b.allocation
                .allocated_at
                .cmp(&a.allocation.allocated_at)
                .then(a.allocation.id.cmp(&b.allocation.id))
        });
        Ok(rows)
    }

    async fn scopes(&self, ids: &[Uuid]) -> AppResult<Vec<AllocationScope>> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.allocations.get(id))
            .filter_map(|a| {
                state.employees.get(&a.employee_id).map(|e| AllocationScope {
                    id: a.id,
                    employee_id: e.id,
                    department_key: e.department_key.clone(),
                })
            })
            .collect())
    }

    async fn count_active_for_employee(&self, employee_id: Uuid) -> AppResult<i64> {
        Ok(self.state.lock().await.active_count(employee_id))
    }

    async fn sign_term(&self, id: Uuid, signed_at: DateTime<Utc>) -> AppResult<Option<Allocation>> {
        let mut state = self.state.lock().await;
        Ok(state
            .allocations
            .get_mut(&id)
            .filter(|a| !a.term_signed)
            .map(|a| {
                a.term_signed = true;
                a.term_signed_at = Some(signed_at);
                a.clone()
            }))
    }
}

#[async_trait]
impl ProfilesRepository for MemoryStore {
    async fn find(&self, user_id: Uuid) -> AppResult<CallerProfile> {
        Ok(self
            .state
            .lock()
            .await
            .profiles
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryLedgerTx { guard, staged }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn lock_employee(&mut self, id: Uuid) -> AppResult<Option<Employee>> {
        Ok(self.staged.employees.get(&id).cloned())
    }

    async fn lock_equipment(&mut self, ids: &[Uuid]) -> AppResult<Vec<Equipment>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.staged.equipment.get(id).cloned())
            .collect())
    }

    async fn lock_allocations(&mut self, ids: &[Uuid]) -> AppResult<Vec<Allocation>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.staged.allocations.get(id).cloned())
            .collect())
    }

    async fn insert_allocation(&mut self, allocation: &Allocation) -> AppResult<Allocation> {
        if !self.staged.employees.contains_key(&allocation.employee_id) {
            return Err(AppError::NotFound(format!("Employee {} not found", allocation.employee_id)));
        }
        if !self.staged.equipment.contains_key(&allocation.equipment_id) {
            return Err(AppError::NotFound(format!("Equipment {} not found", allocation.equipment_id)));
        }
        if self.staged.has_active_allocation(allocation.equipment_id) {
            return Err(AppError::Conflict(format!(
                "Equipment {} already has an active allocation",
                allocation.equipment_id
            )));
        }
        if self.staged.allocations.contains_key(&allocation.id) {
            return Err(AppError::Conflict(format!("Allocation {} already exists", allocation.id)));
        }
        self.staged.allocations.insert(allocation.id, allocation.clone());
        Ok(allocation.clone())
    }

    async fn close_allocation(&mut self, closing: &AllocationReturn) -> AppResult<Option<Allocation>> {
        let Some(allocation) = self
            .staged
            .allocations
            .get_mut(&closing.id)
            .filter(|a| a.is_active())
        else {
            return Ok(None);
        };
        if closing.returned_at < allocation.allocated_at {
            return Err(AppError::InvalidArgument(format!(
                "Allocation {}: return precedes issue",
                closing.id
            )));
        }
        allocation.returned_at = Some(closing.returned_at);
        allocation.notes = closing.notes.clone();
        allocation.returned_by = closing.returned_by;
        allocation.returned_by_name = closing.returned_by_name.clone();
        Ok(Some(allocation.clone()))
    }

    async fn set_equipment_status(
        &mut self,
        id: Uuid,
        status: EquipmentStatus,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let equipment = self
            .staged
            .equipment
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))?;
        equipment.status = status;
        equipment.updated_at = at;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryLedgerTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
