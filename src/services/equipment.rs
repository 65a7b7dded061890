//! Equipment registry service

use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        caller::Caller,
        equipment::{CreateEquipment, Equipment, EquipmentQuery, EquipmentStatus, UpdateEquipment},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct EquipmentService {
    repository: Repository,
}

fn check_purchase_value(value: Decimal) -> AppResult<()> {
    if value < Decimal::ZERO {
        return Err(AppError::InvalidArgument(
            "Purchase value cannot be negative".to_string(),
        ));
    }
    Ok(())
}

impl EquipmentService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<Equipment>> {
        self.repository.equipment.list(query).await
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Equipment> {
        self.repository
            .equipment
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", id)))
    }

    /// Register a new unit (admin only)
    pub async fn create(&self, caller: &Caller, data: CreateEquipment) -> AppResult<Equipment> {
        caller.require_admin()?;
        data.validate()?;
        check_purchase_value(data.purchase_value)?;
        if data.status == Some(EquipmentStatus::Allocated) {
            return Err(AppError::InvalidArgument(
                "Equipment becomes allocated only through an allocation".to_string(),
            ));
        }

        let created = self.repository.equipment.create(&Equipment::new(&data)).await?;
        tracing::info!(equipment_id = %created.id, serial_number = %created.serial_number, "Equipment created");
        Ok(created)
    }

    /// Edit a unit. Only admins may touch the status, and never to or from `allocated`.
    pub async fn update(&self, caller: &Caller, id: Uuid, data: UpdateEquipment) -> AppResult<Equipment> {
        data.validate()?;
        if let Some(status) = data.status {
            caller.require_admin()?;
            if status == EquipmentStatus::Allocated {
                return Err(AppError::InvalidArgument(
                    "Equipment becomes allocated only through an allocation".to_string(),
                ));
            }
        }
        if let Some(value) = data.purchase_value {
            check_purchase_value(value)?;
        }

        let mut equipment = self.get(id).await?;
        let status_change = data.status.filter(|s| *s != equipment.status);
        if status_change.is_some() && equipment.status == EquipmentStatus::Allocated {
            return Err(AppError::Conflict(
                "Status of an allocated unit changes only through a return".to_string(),
            ));
        }
        data.apply_to(&mut equipment);

        match self.repository.equipment.update(&equipment).await? {
            Some(updated) => Ok(updated),
            // Lost a race with the allocation engine
            None => match self.repository.equipment.get(id).await? {
                Some(_) => Err(AppError::Conflict(format!(
                    "Equipment {} changed allocation state concurrently",
                    id
                ))),
                None => Err(AppError::NotFound(format!("Equipment {} not found", id))),
            },
        }
    }

    /// Remove a unit that never entered the ledger (admin only)
    pub async fn delete(&self, caller: &Caller, id: Uuid) -> AppResult<()> {
        caller.require_admin()?;
        if !self.repository.equipment.delete(id).await? {
            return Err(AppError::NotFound(format!("Equipment {} not found", id)));
        }
        tracing::info!(equipment_id = %id, "Equipment deleted");
        Ok(())
    }
}
