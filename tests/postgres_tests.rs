//! PostgreSQL store tests
//!
//! Run against a scratch database:
//! DATABASE_URL=postgres://... cargo test --test postgres_tests -- --ignored

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use equipment_ledger::{
    error::AppError,
    models::{
        allocation::{Actor, AllocationReturn, IssueAllocation, ReturnAllocations},
        employee::{CreateEmployee, Employee},
        equipment::{Classification, CreateEquipment, Equipment, EquipmentStatus},
    },
    repository::Repository,
    services::ledger::AllocationEngine,
};

async fn repository() -> Repository {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    Repository::new(pool)
}

async fn seed(repository: &Repository) -> (Employee, Equipment) {
    let employee = Employee::new(&CreateEmployee {
        name: "Bruno".to_string(),
        role: "Analyst".to_string(),
        email: format!("{}@example.com", Uuid::new_v4().simple()),
        department: "Financeiro".to_string(),
        status: None,
    });
    let equipment = Equipment::new(&CreateEquipment {
        name: "Notebook".to_string(),
        category: "notebook".to_string(),
        classification: Classification::Station,
        serial_number: format!("SN-{}", Uuid::new_v4().simple()),
        purchase_value: dec!(4500.00),
        purchase_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
        status: None,
        image_url: None,
    });
    (
        repository.employees.create(&employee).await.unwrap(),
        repository.equipment.create(&equipment).await.unwrap(),
    )
}

fn issue(employee: &Employee, equipment: &Equipment) -> IssueAllocation {
    IssueAllocation {
        employee_id: employee.id,
        equipment_ids: vec![equipment.id],
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

#[tokio::test]
#[ignore]
async fn test_concurrent_issue_has_one_winner() {
    let repository = repository().await;
    let (employee, equipment) = seed(&repository).await;
    let engine = AllocationEngine::new(repository.ledger.clone());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            let request = issue(&employee, &equipment);
            tokio::spawn(async move { engine.issue(request).await })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(rows) => winners += rows.len(),
            Err(AppError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners, 1);

    let stored = repository.equipment.get(equipment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EquipmentStatus::Allocated);
}

#[tokio::test]
#[ignore]
async fn test_dropped_transaction_rolls_back() {
    let repository = repository().await;
    let (employee, equipment) = seed(&repository).await;
    let engine = AllocationEngine::new(repository.ledger.clone());
    let allocation = engine.issue(issue(&employee, &equipment)).await.unwrap().remove(0);

    {
        let mut tx = repository.ledger.begin().await.unwrap();
        let closed = tx
            .close_allocation(&AllocationReturn {
                id: allocation.id,
                returned_at: chrono::Utc::now(),
                notes: None,
                returned_by: None,
                returned_by_name: None,
            })
            .await
            .unwrap();
        assert!(closed.is_some());
        tx.set_equipment_status(equipment.id, EquipmentStatus::Available, chrono::Utc::now())
            .await
            .unwrap();
    }

    let stored = repository.allocations.get(allocation.id).await.unwrap().unwrap();
    assert!(stored.is_active());
    let unit = repository.equipment.get(equipment.id).await.unwrap().unwrap();
    assert_eq!(unit.status, EquipmentStatus::Allocated);
}

#[tokio::test]
#[ignore]
async fn test_second_return_conflicts() {
    let repository = repository().await;
    let (employee, equipment) = seed(&repository).await;
    let engine = AllocationEngine::new(repository.ledger.clone());
    let allocation = engine.issue(issue(&employee, &equipment)).await.unwrap().remove(0);

    let request = ReturnAllocations {
        allocation_ids: vec![allocation.id],
        destinations: HashMap::new(),
        ..Default::default()
    };
    engine.return_allocations(request.clone()).await.unwrap();
    let err = engine.return_allocations(request).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Ledger history blocks hard deletion
    let err = repository.equipment.delete(equipment.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}
