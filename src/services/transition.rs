use std::fmt;
use validator::Validate;

use crate::error::{AppError, AppResult, FieldError};
use crate::models::{
    ItemCategory, ItemStatus, PickupPayload, Reservation, ReservationStatus, ReturnPayload,
    SubmitPayload,
};
use crate::services::collection_editor::ItemCollections;
use crate::services::form_errors::{FormErrors, FormField};

const MOTOR_STATUSES: &[ItemStatus] = &[ItemStatus::ReadyForRent, ItemStatus::OutOfService];
const HELMET_STATUSES: &[ItemStatus] = &[ItemStatus::Lost, ItemStatus::Scrap, ItemStatus::ReadyForRent];
const FAK_STATUSES: &[ItemStatus] = &[ItemStatus::Complete, ItemStatus::Incomplete, ItemStatus::Lost];
const HARDCASE_STATUSES: &[ItemStatus] = &[ItemStatus::ReadyForRent, ItemStatus::Scrap, ItemStatus::Lost];

pub fn legal_statuses(category: ItemCategory) -> &'static [ItemStatus] {
    match category {
        ItemCategory::Motor => MOTOR_STATUSES,
        ItemCategory::Helmet => HELMET_STATUSES,
        ItemCategory::Fak => FAK_STATUSES,
        ItemCategory::Hardcase => HARDCASE_STATUSES,
    }
}

pub fn default_return_status(category: ItemCategory) -> ItemStatus {
    match category {
        ItemCategory::Fak => ItemStatus::Complete,
        ItemCategory::Motor | ItemCategory::Helmet | ItemCategory::Hardcase => {
            ItemStatus::ReadyForRent
        }
    }
}

pub fn check_status(category: ItemCategory, code: &str, status: ItemStatus) -> Result<(), FieldError> {
    if legal_statuses(category).contains(&status) {
        Ok(())
    } else {
        Err(FieldError::StatusNotAllowed {
            category,
            code: code.to_string(),
            status: status.to_string(),
        })
    }
}

pub fn parse_status(category: ItemCategory, code: &str, raw: &str) -> Result<ItemStatus, FieldError> {
    let status = raw.parse::<ItemStatus>().map_err(|_| FieldError::StatusNotAllowed {
        category,
        code: code.to_string(),
        status: raw.trim().to_string(),
    })?;
    check_status(category, code, status)?;
    Ok(status)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pickup,
    Return,
}

impl Phase {
    pub fn tabs(self) -> [(Phase, bool); 2] {
        [
            (Phase::Pickup, self == Phase::Pickup),
            (Phase::Return, self == Phase::Return),
        ]
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Pickup => f.write_str("Pickup"),
            Phase::Return => f.write_str("Return"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormMode {
    Pickup,
    Return { reservation_id: i64 },
}

impl FormMode {
    // an existing reservation can only be returned while still in rental
    pub fn for_reservation(reservation: Option<&Reservation>) -> AppResult<Self> {
        match reservation {
            None => Ok(FormMode::Pickup),
            Some(r) if r.derived_status() == ReservationStatus::InRental => {
                if r.status != ReservationStatus::InRental {
                    tracing::warn!(
                        "Reservation {} reports {:?} but has no return plan",
                        r.id,
                        r.status
                    );
                }
                Ok(FormMode::Return {
                    reservation_id: r.id,
                })
            }
            Some(r) => Err(AppError::BadRequest(format!(
                "Reservation {} has already been returned",
                r.reservation_code
            ))),
        }
    }

    pub fn phase(self) -> Phase {
        match self {
            FormMode::Pickup => Phase::Pickup,
            FormMode::Return { .. } => Phase::Return,
        }
    }

    pub fn target_status(self) -> ReservationStatus {
        match self {
            FormMode::Pickup => ReservationStatus::InRental,
            FormMode::Return { .. } => ReservationStatus::FinishedRental,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Validate)]
pub struct ReservationFields {
    #[validate(length(min = 1, max = 255, message = "Reservation code is required"))]
    pub reservation_code: String,

    #[validate(length(min = 1, max = 255, message = "Pickup plan is required"))]
    pub pickup_plan_code: String,

    #[validate(length(max = 255))]
    pub return_plan_code: String,

    #[validate(length(max = 2000))]
    pub information: String,
}

impl ReservationFields {
    pub fn from_reservation(reservation: &Reservation) -> Self {
        Self {
            reservation_code: reservation.reservation_code.clone(),
            pickup_plan_code: reservation.pickup_plan_code.clone(),
            return_plan_code: reservation.return_plan_code.clone().unwrap_or_default(),
            information: reservation.information.clone().unwrap_or_default(),
        }
    }

    pub(crate) fn trimmed(&self) -> Self {
        Self {
            reservation_code: self.reservation_code.trim().to_string(),
            pickup_plan_code: self.pickup_plan_code.trim().to_string(),
            return_plan_code: self.return_plan_code.trim().to_string(),
            information: self.information.trim().to_string(),
        }
    }

    fn information(&self) -> Option<String> {
        let info = self.information.trim();
        (!info.is_empty()).then(|| info.to_string())
    }
}

#[derive(Debug, Validate)]
struct ReturnRequirements {
    #[validate(length(min = 1, message = "Return plan is required"))]
    return_plan_code: String,
}

fn validate_fields(fields: &ReservationFields, errors: &mut FormErrors) {
    if let Err(e) = fields.trimmed().validate() {
        errors.extend(FormErrors::from_validation(&e));
    }
}

fn validate_collections(collections: &ItemCollections, errors: &mut FormErrors) {
    for editor in collections.iter() {
        for error in editor.validate() {
            errors.push(error);
        }
    }
}

pub fn build_pickup(
    fields: &ReservationFields,
    collections: &ItemCollections,
) -> Result<PickupPayload, FormErrors> {
    let mut errors = FormErrors::new();
    validate_fields(fields, &mut errors);
    if !fields.return_plan_code.trim().is_empty() {
        errors.push(FieldError::ReturnPlanNotApplicable);
    }
    validate_collections(collections, &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(PickupPayload {
        reservation_code: fields.reservation_code.trim().to_string(),
        pickup_plan_code: fields.pickup_plan_code.trim().to_string(),
        information: fields.information(),
        motor: collections.get(ItemCategory::Motor).pickup_entries(),
        helmet: collections.get(ItemCategory::Helmet).pickup_entries(),
        fak: collections.get(ItemCategory::Fak).pickup_entries(),
        hardcase: collections.get(ItemCategory::Hardcase).pickup_entries(),
        status: ReservationStatus::InRental,
    })
}

pub fn build_return(
    fields: &ReservationFields,
    collections: &ItemCollections,
) -> Result<ReturnPayload, FormErrors> {
    let mut errors = FormErrors::new();
    validate_fields(fields, &mut errors);

    let requirements = ReturnRequirements {
        return_plan_code: fields.return_plan_code.trim().to_string(),
    };
    if let Err(e) = requirements.validate() {
        errors.extend(FormErrors::from_validation(&e));
    }
    validate_collections(collections, &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ReturnPayload {
        reservation_code: fields.reservation_code.trim().to_string(),
        pickup_plan_code: fields.pickup_plan_code.trim().to_string(),
        return_plan_code: requirements.return_plan_code,
        information: fields.information(),
        motor: collections.get(ItemCategory::Motor).return_entries(),
        helmet: collections.get(ItemCategory::Helmet).return_entries(),
        fak: collections.get(ItemCategory::Fak).return_entries(),
        hardcase: collections.get(ItemCategory::Hardcase).return_entries(),
        status: ReservationStatus::FinishedRental,
    })
}

pub fn build_payload(
    mode: FormMode,
    fields: &ReservationFields,
    collections: &ItemCollections,
) -> Result<SubmitPayload, FormErrors> {
    match mode {
        FormMode::Pickup => build_pickup(fields, collections).map(SubmitPayload::Pickup),
        FormMode::Return { reservation_id } => {
            build_return(fields, collections).map(|payload| SubmitPayload::Return {
                id: reservation_id,
                payload,
            })
        }
    }
}
