use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::item::{ItemCategory, ItemRef, ItemStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReservationStatus {
    #[serde(rename = "In Rental")]
    InRental,
    #[serde(rename = "Finished Rental")]
    FinishedRental,
}

impl ReservationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::InRental => "In Rental",
            ReservationStatus::FinishedRental => "Finished Rental",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i64,
    pub reservation_code: String,
    #[serde(rename = "pickupPlan_code")]
    pub pickup_plan_code: String,
    #[serde(rename = "returnPlan_code", default)]
    pub return_plan_code: Option<String>,
    #[serde(default)]
    pub information: Option<String>,
    pub status: ReservationStatus,
    #[serde(default)]
    pub motor_items: Vec<ItemRef>,
    #[serde(default)]
    pub helmet_items: Vec<ItemRef>,
    #[serde(default)]
    pub fak_items: Vec<ItemRef>,
    #[serde(default)]
    pub hardcase_items: Option<Vec<ItemRef>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn items(&self, category: ItemCategory) -> &[ItemRef] {
        match category {
            ItemCategory::Motor => &self.motor_items,
            ItemCategory::Helmet => &self.helmet_items,
            ItemCategory::Fak => &self.fak_items,
            ItemCategory::Hardcase => self.hardcase_items.as_deref().unwrap_or_default(),
        }
    }

    pub fn derived_status(&self) -> ReservationStatus {
        match self.return_plan_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => ReservationStatus::FinishedRental,
            _ => ReservationStatus::InRental,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickupEntry {
    pub category: ItemCategory,
    pub code: String,
}

impl Serialize for PickupEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.category.code_key(), &self.code)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnEntry {
    pub category: ItemCategory,
    pub code: String,
    pub status: ItemStatus,
}

impl Serialize for ReturnEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(self.category.code_key(), &self.code)?;
        map.serialize_entry("status", &self.status)?;
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickupPayload {
    pub reservation_code: String,
    #[serde(rename = "pickupPlan_code")]
    pub pickup_plan_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub information: Option<String>,
    pub motor: Vec<PickupEntry>,
    pub helmet: Vec<PickupEntry>,
    pub fak: Vec<PickupEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hardcase: Vec<PickupEntry>,
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnPayload {
    pub reservation_code: String,
    #[serde(rename = "pickupPlan_code")]
    pub pickup_plan_code: String,
    #[serde(rename = "returnPlan_code")]
    pub return_plan_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub information: Option<String>,
    pub motor: Vec<ReturnEntry>,
    pub helmet: Vec<ReturnEntry>,
    pub fak: Vec<ReturnEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hardcase: Vec<ReturnEntry>,
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitPayload {
    Pickup(PickupPayload),
    Return { id: i64, payload: ReturnPayload },
}

impl SubmitPayload {
    pub fn reservation_code(&self) -> &str {
        match self {
            SubmitPayload::Pickup(payload) => &payload.reservation_code,
            SubmitPayload::Return { payload, .. } => &payload.reservation_code,
        }
    }
}
