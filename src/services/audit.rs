//! Audit projection over the allocation ledger

use std::{cmp::Ordering, collections::BTreeSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        allocation::{AllocationDetails, AllocationFilter},
        audit::{AuditEvent, AuditKind, LEGACY_ACTOR},
        employee::normalize_department,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct AuditService {
    repository: Repository,
}

impl AuditService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Lifecycle events, newest first, optionally limited to one department
    pub async fn events(&self, department: Option<&str>) -> AppResult<Vec<AuditEvent>> {
        let filter = AllocationFilter {
            department_key: department
                .map(normalize_department)
                .filter(|key| !key.is_empty()),
            ..Default::default()
        };
        let rows = self.repository.allocations.list(&filter).await?;
        Ok(project(&rows))
    }

    /// Distinct names of everyone who issued or received back equipment
    pub async fn coordinators(&self) -> AppResult<Vec<String>> {
        let rows = self
            .repository
            .allocations
            .list(&AllocationFilter::default())
            .await?;
        let names: BTreeSet<String> = rows
            .iter()
            .flat_map(|row| {
                [
                    row.allocation.performed_by_name.as_deref(),
                    row.allocation.returned_by_name.as_deref(),
                ]
            })
            .flatten()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        Ok(names.into_iter().collect())
    }
}

fn event(
    row: &AllocationDetails,
    kind: AuditKind,
    date: DateTime<Utc>,
    actor: Option<Uuid>,
    actor_name: Option<&str>,
) -> AuditEvent {
    let name = actor_name.map(str::trim).filter(|n| !n.is_empty());
    let suffix = match kind {
        AuditKind::Issue => "issue",
        AuditKind::Return => "return",
    };
    AuditEvent {
        id: format!("{}-{}", row.allocation.id, suffix),
        allocation_id: row.allocation.id,
        kind,
        movement_type: row.allocation.movement_type,
        date,
        performed_by: actor,
        performed_by_name: name.unwrap_or(LEGACY_ACTOR).to_string(),
        legacy_actor: name.is_none(),
        equipment_id: row.equipment.id,
        equipment_name: row.equipment.name.clone(),
        serial_number: row.equipment.serial_number.clone(),
        employee_id: row.employee.id,
        employee_name: row.employee.name.clone(),
        employee_department: row.employee.department.clone(),
        employee_status: row.employee.status,
    }
}

/// Flatten allocations into issue and return events.
///
/// Sorted by date descending; ties fall back to allocation id, then return
/// before issue, so the output does not depend on input order.
pub fn project(rows: &[AllocationDetails]) -> Vec<AuditEvent> {
    let mut events = Vec::with_capacity(rows.len() * 2);
    for row in rows {
        let allocation = &row.allocation;
        events.push(event(
            row,
            AuditKind::Issue,
            allocation.allocated_at,
            allocation.performed_by,
            allocation.performed_by_name.as_deref(),
        ));
        if let Some(returned_at) = allocation.returned_at {
            events.push(event(
                row,
                AuditKind::Return,
                returned_at,
                allocation.returned_by,
                allocation.returned_by_name.as_deref(),
            ));
        }
    }

    events.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.allocation_id.cmp(&b.allocation_id))
            .then_with(|| match (a.kind, b.kind) {
                (AuditKind::Return, AuditKind::Issue) => Ordering::Less,
                (AuditKind::Issue, AuditKind::Return) => Ordering::Greater,
                _ => Ordering::Equal,
            })
    });
    events
}
