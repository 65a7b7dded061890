//! Employee model and department normalization

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

text_enum! {
    /// Employment status
    pub enum EmployeeStatus {
        Active => "Ativo",
        Terminated => "Desligado",
    }
}

/// Canonical department key used for every access-control comparison.
///
/// Decomposes to NFD, drops combining marks and whitespace, then case-folds,
/// so "Engenharia de Soluções" and "engenharia de  solucoes" share a key.
pub fn normalize_department(value: &str) -> String {
    value
        .nfd()
        .filter(|c| !is_combining_mark(*c) && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Employee record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Employee {
    pub id: Uuid,
    pub name: String,
    /// Job title
    pub role: String,
    pub email: String,
    /// Department as typed by the user
    pub department: String,
    /// Normalized department, written together with `department`
    #[serde(skip_serializing)]
    pub department_key: String,
    pub status: EmployeeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    /// Build a new registry record from a create request
    pub fn new(data: &CreateEmployee) -> Self {
        let now = Utc::now();
        let mut employee = Self {
            id: Uuid::new_v4(),
            name: data.name.trim().to_string(),
            role: data.role.trim().to_string(),
            email: data.email.trim().to_lowercase(),
            department: String::new(),
            department_key: String::new(),
            status: data.status.unwrap_or(EmployeeStatus::Active),
            created_at: now,
            updated_at: now,
        };
        employee.set_department(&data.department);
        employee
    }

    pub fn is_active(&self) -> bool {
        self.status == EmployeeStatus::Active
    }

    /// Replace the department, keeping the normalized key in sync
    pub fn set_department(&mut self, department: &str) {
        self.department = department.trim().to_string();
        self.department_key = normalize_department(department);
    }
}

/// Create employee request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateEmployee {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Role is required"))]
    pub role: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Department is required"))]
    pub department: String,
    pub status: Option<EmployeeStatus>,
}

/// Update employee request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEmployee {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "Role cannot be empty"))]
    pub role: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "Department cannot be empty"))]
    pub department: Option<String>,
    pub status: Option<EmployeeStatus>,
}

/// Employee list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeQuery {
    /// Include terminated employees
    pub include_inactive: Option<bool>,
}

/// Repository-level employee filter
#[derive(Debug, Clone, Default)]
pub struct EmployeeFilter {
    pub include_inactive: bool,
    pub department_key: Option<String>,
}

/// Outcome of a soft deactivation attempt
#[derive(Debug)]
pub enum Deactivation {
    Deactivated(Employee),
    /// Employee still holds this many active allocations
    Blocked(i64),
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_department_strips_accents_case_and_spaces() {
        assert_eq!(
            normalize_department("Engenharia de Soluções"),
            normalize_department("engenharia de  solucoes")
        );
        assert_eq!(normalize_department("Engenharia de Soluções"), "engenhariadesolucoes");
    }

    #[test]
    fn test_normalize_department_distinct_departments() {
        assert_ne!(
            normalize_department("Growth e Tecnologia"),
            normalize_department("Financeiro")
        );
        assert_eq!(normalize_department("  FINANCEIRO\t"), "financeiro");
    }

    #[test]
    fn test_normalize_department_empty() {
        assert_eq!(normalize_department(""), "");
        assert_eq!(normalize_department("   "), "");
    }

    #[test]
    fn test_employee_status_text() {
        assert_eq!(EmployeeStatus::Terminated.as_str(), "Desligado");
        assert_eq!("Ativo".parse::<EmployeeStatus>(), Ok(EmployeeStatus::Active));
        assert!("inactive".parse::<EmployeeStatus>().is_err());
    }
}
