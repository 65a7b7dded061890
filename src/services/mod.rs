//! Business logic services

pub mod access;
pub mod allocations;
pub mod audit;
pub mod employees;
pub mod equipment;
pub mod identity;
pub mod ledger;

#[cfg(test)]
pub(crate) mod testing;

use crate::{config::AuthConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub identity: identity::IdentityService,
    pub access: access::AccessPolicy,
    pub allocations: allocations::AllocationsService,
    pub employees: employees::EmployeesService,
    pub equipment: equipment::EquipmentService,
    pub audit: audit::AuditService,
    pub repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig) -> Self {
        let access = access::AccessPolicy::new(repository.clone());
        let engine = ledger::AllocationEngine::new(repository.ledger.clone());

        Self {
            identity: identity::IdentityService::new(repository.profiles.clone(), auth_config),
            allocations: allocations::AllocationsService::new(repository.clone(), access.clone(), engine),
            employees: employees::EmployeesService::new(repository.clone(), access.clone()),
            equipment: equipment::EquipmentService::new(repository.clone()),
            audit: audit::AuditService::new(repository.clone()),
            access,
            repository,
        }
    }
}
