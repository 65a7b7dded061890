//! Employee registry service

use uuid::Uuid;
use validator::Validate;

use super::access::AccessPolicy;
use crate::{
    error::{AppError, AppResult},
    models::{
        caller::Caller,
        employee::{
            normalize_department, CreateEmployee, Deactivation, Employee, EmployeeFilter, EmployeeQuery,
            EmployeeStatus, UpdateEmployee,
        },
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct EmployeesService {
    repository: Repository,
    access: AccessPolicy,
}

impl EmployeesService {
    pub fn new(repository: Repository, access: AccessPolicy) -> Self {
        Self { repository, access }
    }

    /// Employees visible to the caller, ordered by name
    pub async fn list(&self, caller: &Caller, query: EmployeeQuery) -> AppResult<Vec<Employee>> {
        let filter = EmployeeFilter {
            include_inactive: query.include_inactive.unwrap_or(false),
            department_key: self.access.scope(caller)?,
        };
        self.repository.employees.list(&filter).await
    }

    /// Distinct departments; coordinators only see their own
    pub async fn departments(&self, caller: &Caller) -> AppResult<Vec<String>> {
        let departments = self.repository.employees.departments().await?;
        Ok(match self.access.scope(caller)? {
            Some(key) => departments
                .into_iter()
                .filter(|d| normalize_department(d) == key)
                .collect(),
            None => departments,
        })
    }

    pub async fn get(&self, caller: &Caller, id: Uuid) -> AppResult<Employee> {
        self.access.ensure_employee_access(caller, id).await
    }

    pub async fn create(&self, caller: &Caller, data: CreateEmployee) -> AppResult<Employee> {
        data.validate()?;
        self.access.ensure_department_assignment(caller, &data.department)?;

        let employee = Employee::new(&data);
        if employee.department_key.is_empty() {
            return Err(AppError::InvalidArgument("Department is required".to_string()));
        }
        let created = self.repository.employees.create(&employee).await?;
        tracing::info!(employee_id = %created.id, department = %created.department, "Employee created");
        Ok(created)
    }

    /// Update descriptive fields and, when requested, the employment status
    pub async fn update(&self, caller: &Caller, id: Uuid, data: UpdateEmployee) -> AppResult<Employee> {
        data.validate()?;
        let mut employee = self.access.ensure_employee_access(caller, id).await?;

        if let Some(ref department) = data.department {
            self.access.ensure_department_assignment(caller, department)?;
            employee.set_department(department);
            if employee.department_key.is_empty() {
                return Err(AppError::InvalidArgument("Department cannot be empty".to_string()));
            }
        }

        let terminating = data.status == Some(EmployeeStatus::Terminated) && employee.is_active();
        let reactivating = data.status == Some(EmployeeStatus::Active) && !employee.is_active();
        if terminating {
            let active = self.repository.allocations.count_active_for_employee(id).await?;
            if active > 0 {
                return Err(AppError::Conflict(format!(
                    "Employee still holds {} active allocation(s)",
                    active
                )));
            }
        }

        if let Some(name) = data.name {
            employee.name = name.trim().to_string();
        }
        if let Some(role) = data.role {
            employee.role = role.trim().to_string();
        }
        if let Some(email) = data.email {
            employee.email = email.trim().to_lowercase();
        }

        let mut updated = self
            .repository
            .employees
            .update(&employee)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", id)))?;

        if terminating {
            updated = self.terminate(id).await?;
        } else if reactivating {
            updated = self
                .repository
                .employees
                .reactivate(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", id)))?;
        }
        Ok(updated)
    }

    /// Soft delete: mark the employee Desligado
    pub async fn deactivate(&self, caller: &Caller, id: Uuid) -> AppResult<Employee> {
        self.access.ensure_employee_access(caller, id).await?;
        self.terminate(id).await
    }

    async fn terminate(&self, id: Uuid) -> AppResult<Employee> {
        match self.repository.employees.deactivate(id).await? {
            Deactivation::Deactivated(employee) => {
                tracing::info!(employee_id = %id, "Employee deactivated");
                Ok(employee)
            }
            Deactivation::Blocked(active) => Err(AppError::Conflict(format!(
                "Employee still holds {} active allocation(s)",
                active
            ))),
            Deactivation::NotFound => Err(AppError::NotFound(format!("Employee {} not found", id))),
        }
    }
}
