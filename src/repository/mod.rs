//! Repository layer for database operations
//!
//! Every aggregate is reached through a trait so the services run unchanged
//! against PostgreSQL or the in-memory store. Multi-row writes go through
//! [`LedgerStore::begin`], which hands out one [`LedgerTx`] per unit of work.

pub mod allocations;
pub mod employees;
pub mod equipment;
pub mod ledger;
pub mod memory;
pub mod profiles;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        allocation::{Allocation, AllocationDetails, AllocationFilter, AllocationReturn, AllocationScope},
        caller::CallerProfile,
        employee::{Deactivation, Employee, EmployeeFilter},
        equipment::{Equipment, EquipmentQuery, EquipmentStatus},
    },
};

pub use memory::MemoryStore;

/// Employee registry
#[async_trait]
pub trait EmployeesRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Option<Employee>>;

    /// Employees ordered by name
    async fn list(&self, filter: &EmployeeFilter) -> AppResult<Vec<Employee>>;

    /// Distinct department display strings, sorted
    async fn departments(&self) -> AppResult<Vec<String>>;

    async fn create(&self, employee: &Employee) -> AppResult<Employee>;

    /// Write descriptive fields and department; status is left untouched
    async fn update(&self, employee: &Employee) -> AppResult<Option<Employee>>;

    async fn reactivate(&self, id: Uuid) -> AppResult<Option<Employee>>;

    /// Mark the employee Desligado unless active allocations remain
    async fn deactivate(&self, id: Uuid) -> AppResult<Deactivation>;
}

/// Equipment registry
#[async_trait]
pub trait EquipmentRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Option<Equipment>>;

    /// Equipment ordered by name
    async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>>;

    async fn create(&self, equipment: &Equipment) -> AppResult<Equipment>;

    /// Write all editable columns. Returns `None` when the row is missing or
    /// when the write would move a unit into or out of `allocated`.
    async fn update(&self, equipment: &Equipment) -> AppResult<Option<Equipment>>;

    /// Returns `false` when the row is missing; `Conflict` when it has ledger history
    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

/// Read side of the allocation ledger
#[async_trait]
pub trait AllocationsRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> AppResult<Option<Allocation>>;

    /// Allocations with employee and equipment, newest first
    async fn list(&self, filter: &AllocationFilter) -> AppResult<Vec<AllocationDetails>>;

    /// Resolve allocation ids to their employee department keys; missing ids are skipped
    async fn scopes(&self, ids: &[Uuid]) -> AppResult<Vec<AllocationScope>>;

    async fn count_active_for_employee(&self, employee_id: Uuid) -> AppResult<i64>;

    /// Set the term-signed flag. Returns `None` when missing or already signed.
    async fn sign_term(&self, id: Uuid, signed_at: DateTime<Utc>) -> AppResult<Option<Allocation>>;
}

/// Role and profile lookup for identity-provider users
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfilesRepository: Send + Sync {
    async fn find(&self, user_id: Uuid) -> AppResult<CallerProfile>;
}

/// Source of ledger transactions
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>>;

    /// Round-trip to the backing store
    async fn ping(&self) -> AppResult<()>;
}

/// One atomic unit of work over employees, equipment and allocations.
///
/// Nothing is visible to other readers until [`LedgerTx::commit`]; dropping
/// the transaction rolls every write back.
#[async_trait]
pub trait LedgerTx: Send {
    /// Read the employee and hold a shared lock until the end of the transaction
    async fn lock_employee(&mut self, id: Uuid) -> AppResult<Option<Employee>>;

    /// Read and exclusively lock the given equipment rows; missing ids are skipped
    async fn lock_equipment(&mut self, ids: &[Uuid]) -> AppResult<Vec<Equipment>>;

    /// Read and exclusively lock the given allocation rows; missing ids are skipped
    async fn lock_allocations(&mut self, ids: &[Uuid]) -> AppResult<Vec<Allocation>>;

    /// Append a ledger row. `Conflict` if the equipment already has an active allocation.
    async fn insert_allocation(&mut self, allocation: &Allocation) -> AppResult<Allocation>;

    /// Close an active allocation. `None` when it is missing or already returned.
    async fn close_allocation(&mut self, closing: &AllocationReturn) -> AppResult<Option<Allocation>>;

    async fn set_equipment_status(
        &mut self,
        id: Uuid,
        status: EquipmentStatus,
        at: DateTime<Utc>,
    ) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

/// Main repository struct holding every store handle
#[derive(Clone)]
pub struct Repository {
    pub employees: Arc<dyn EmployeesRepository>,
    pub equipment: Arc<dyn EquipmentRepository>,
    pub allocations: Arc<dyn AllocationsRepository>,
    pub profiles: Arc<dyn ProfilesRepository>,
    pub ledger: Arc<dyn LedgerStore>,
}

impl Repository {
    /// Create a PostgreSQL-backed repository with the given pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            employees: Arc::new(employees::PgEmployeesRepository::new(pool.clone())),
            equipment: Arc::new(equipment::PgEquipmentRepository::new(pool.clone())),
            allocations: Arc::new(allocations::PgAllocationsRepository::new(pool.clone())),
            profiles: Arc::new(profiles::PgProfilesRepository::new(pool.clone())),
            ledger: Arc::new(ledger::PgLedgerStore::new(pool)),
        }
    }

    /// Create a repository over an in-memory store
    pub fn in_memory(store: MemoryStore) -> Self {
        Self {
            employees: Arc::new(store.clone()),
            equipment: Arc::new(store.clone()),
            allocations: Arc::new(store.clone()),
            profiles: Arc::new(store.clone()),
            ledger: Arc::new(store),
        }
    }

    /// Replace the transaction source, keeping the read side
    pub fn with_ledger(mut self, ledger: Arc<dyn LedgerStore>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Replace the profile lookup
    pub fn with_profiles(mut self, profiles: Arc<dyn ProfilesRepository>) -> Self {
        self.profiles = profiles;
        self
    }
}
