//! Equipment model

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

text_enum! {
    /// Equipment status, kept in sync with the allocation ledger
    pub enum EquipmentStatus {
        Available => "available",
        /// An active allocation exists for this unit
        Allocated => "allocated",
        Maintenance => "maintenance",
        /// Held for a field reservation
        Reserved => "reserved",
    }
}

text_enum! {
    /// Station equipment stays with one person, field equipment rotates
    pub enum Classification {
        Station => "station",
        Field => "field",
    }
}

text_enum! {
    /// Status an equipment unit is set to when its allocation is returned
    pub enum ReturnDestination {
        Available => "available",
        Maintenance => "maintenance",
    }
}

impl Default for ReturnDestination {
    fn default() -> Self {
        ReturnDestination::Available
    }
}

impl From<ReturnDestination> for EquipmentStatus {
    fn from(destination: ReturnDestination) -> Self {
        match destination {
            ReturnDestination::Available => EquipmentStatus::Available,
            ReturnDestination::Maintenance => EquipmentStatus::Maintenance,
        }
    }
}

/// Equipment record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Equipment {
    pub id: Uuid,
    pub name: String,
    /// notebook, monitor, keyboard, mouse, headset, webcam, smartphone,
    /// tripod, ringlight, camera, microphone or other
    pub category: String,
    pub classification: Classification,
    /// Asset tag, unique across the registry
    pub serial_number: String,
    #[schema(value_type = String)]
    pub purchase_value: Decimal,
    pub purchase_date: NaiveDate,
    pub status: EquipmentStatus,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Equipment {
    /// Build a new registry record from a create request
    pub fn new(data: &CreateEquipment) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: data.name.trim().to_string(),
            category: data.category.trim().to_string(),
            classification: data.classification,
            serial_number: data.serial_number.trim().to_string(),
            purchase_value: data.purchase_value,
            purchase_date: data.purchase_date,
            status: data.status.unwrap_or(EquipmentStatus::Available),
            image_url: data.image_url.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Create equipment request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateEquipment {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    pub classification: Classification,
    #[validate(length(min = 1, message = "Serial number is required"))]
    pub serial_number: String,
    #[schema(value_type = String)]
    pub purchase_value: Decimal,
    pub purchase_date: NaiveDate,
    /// Initial status, defaults to available
    pub status: Option<EquipmentStatus>,
    pub image_url: Option<String>,
}

/// Update equipment request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEquipment {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "Category cannot be empty"))]
    pub category: Option<String>,
    pub classification: Option<Classification>,
    #[validate(length(min = 1, message = "Serial number cannot be empty"))]
    pub serial_number: Option<String>,
    #[schema(value_type = Option<String>)]
    pub purchase_value: Option<Decimal>,
    pub purchase_date: Option<NaiveDate>,
    /// Admin only; never `allocated`
    pub status: Option<EquipmentStatus>,
    pub image_url: Option<String>,
}

impl UpdateEquipment {
    /// Apply the provided fields onto an existing record
    pub fn apply_to(&self, equipment: &mut Equipment) {
        if let Some(ref name) = self.name {
            equipment.name = name.clone();
        }
        if let Some(ref category) = self.category {
            equipment.category = category.clone();
        }
        if let Some(classification) = self.classification {
            equipment.classification = classification;
        }
        if let Some(ref serial_number) = self.serial_number {
            equipment.serial_number = serial_number.clone();
        }
        if let Some(purchase_value) = self.purchase_value {
            equipment.purchase_value = purchase_value;
        }
        if let Some(purchase_date) = self.purchase_date {
            equipment.purchase_date = purchase_date;
        }
        if let Some(status) = self.status {
            equipment.status = status;
        }
        if self.image_url.is_some() {
            equipment.image_url = self.image_url.clone();
        }
    }
}

/// Equipment list filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct EquipmentQuery {
    pub status: Option<EquipmentStatus>,
    pub classification: Option<Classification>,
    pub category: Option<String>,
}

impl EquipmentQuery {
    pub fn matches(&self, equipment: &Equipment) -> bool {
        self.status.map_or(true, |s| equipment.status == s)
            && self.classification.map_or(true, |c| equipment.classification == c)
            && self.category.as_deref().map_or(true, |c| equipment.category == c)
    }
}
