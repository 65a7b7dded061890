//! Fixtures shared by the service tests

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::{
    models::{
        caller::{Caller, Role},
        employee::{CreateEmployee, Employee},
        equipment::{Classification, CreateEquipment, Equipment, EquipmentStatus},
    },
    repository::{MemoryStore, Repository},
};

pub(crate) fn at(value: &str) -> DateTime<Utc> {
    value.parse().expect("valid RFC 3339 timestamp")
}

pub(crate) fn new_employee(name: &str, department: &str) -> Employee {
    Employee::new(&CreateEmployee {
        name: name.to_string(),
        role: "Analyst".to_string(),
        email: format!("{}@example.com", Uuid::new_v4().simple()),
        department: department.to_string(),
        status: None,
    })
}

pub(crate) fn new_equipment(name: &str) -> Equipment {
    Equipment::new(&CreateEquipment {
        name: name.to_string(),
        category: "notebook".to_string(),
        classification: Classification::Station,
        serial_number: format!("SN-{}", Uuid::new_v4().simple()),
        purchase_value: dec!(4500.00),
        purchase_date: NaiveDate::from_ymd_opt(2025, 1, 15).expect("valid date"),
        status: None,
        image_url: None,
    })
}

pub(crate) fn admin() -> Caller {
    Caller::new(
        Uuid::new_v4(),
        Some("admin@example.com".to_string()),
        Role::Admin,
        Some("Ana Admin".to_string()),
        None,
    )
}

pub(crate) fn coordinator(department: &str) -> Caller {
    Caller::new(
        Uuid::new_v4(),
        Some("coord@example.com".to_string()),
        Role::Coordinator,
        Some("Carla Coord".to_string()),
        Some(department.to_string()),
    )
}

/// In-memory repository with seeding helpers
pub(crate) struct Fixture {
    pub store: MemoryStore,
    pub repository: Repository,
}

impl Fixture {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let repository = Repository::in_memory(store.clone());
        Self { store, repository }
    }

    pub async fn employee(&self, name: &str, department: &str) -> Employee {
        self.repository
            .employees
            .create(&new_employee(name, department))
            .await
            .expect("seed employee")
    }

    pub async fn equipment(&self, name: &str) -> Equipment {
        self.repository
            .equipment
            .create(&new_equipment(name))
            .await
            .expect("seed equipment")
    }

    pub async fn equipment_status(&self, id: Uuid) -> EquipmentStatus {
        self.repository
            .equipment
            .get(id)
            .await
            .expect("read equipment")
            .expect("equipment exists")
            .status
    }
}
