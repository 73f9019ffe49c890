use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use validator::ValidationErrors;

use crate::error::FieldError;
use crate::models::ItemCategory;
use crate::services::transition::Phase;

// "motor", "motor.0" and "motor.0.motor_code" all point at the motor collection
static SERVER_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<field>[A-Za-z_]+)(?:\.\d+(?:\.[A-Za-z_]+)?)?$")
        .expect("server error key pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormField {
    ReservationCode,
    PickupPlanCode,
    ReturnPlanCode,
    Information,
    Items(ItemCategory),
    Status,
}

impl FormField {
    pub fn wire_name(self) -> &'static str {
        match self {
            FormField::ReservationCode => "reservation_code",
            FormField::PickupPlanCode => "pickupPlan_code",
            FormField::ReturnPlanCode => "returnPlan_code",
            FormField::Information => "information",
            FormField::Items(category) => category.field_name(),
            FormField::Status => "status",
        }
    }

    pub fn from_server_key(key: &str, phase: Phase) -> Option<Self> {
        let captures = SERVER_KEY.captures(key)?;
        let base = captures.name("field")?.as_str();

        match base {
            "reservation_code" => Some(FormField::ReservationCode),
            "pickupPlan_code" => Some(FormField::PickupPlanCode),
            "returnPlan_code" => Some(FormField::ReturnPlanCode),
            "information" => Some(FormField::Information),
            "status" if phase == Phase::Return => Some(FormField::Status),
            other => ItemCategory::from_field_name(other).map(FormField::Items),
        }
    }

    fn from_struct_field(name: &str) -> Option<Self> {
        match name {
            "reservation_code" => Some(FormField::ReservationCode),
            "pickup_plan_code" => Some(FormField::PickupPlanCode),
            "return_plan_code" => Some(FormField::ReturnPlanCode),
            "information" => Some(FormField::Information),
            _ => None,
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormField::ReservationCode => f.write_str("Reservation code"),
            FormField::PickupPlanCode => f.write_str("Pickup plan"),
            FormField::ReturnPlanCode => f.write_str("Return plan"),
            FormField::Information => f.write_str("Information"),
            FormField::Items(category) => write!(f, "{} items", category),
            FormField::Status => f.write_str("Status"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<FormField, Vec<String>>,
    entries: Vec<FieldError>,
    custom: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.entries.is_empty() && self.custom.is_empty()
    }

    pub fn push(&mut self, error: FieldError) {
        match &error {
            FieldError::ReturnPlanNotApplicable => {
                self.push_field(FormField::ReturnPlanCode, error.to_string());
            }
            _ => {
                if !self.entries.contains(&error) {
                    self.entries.push(error);
                }
            }
        }
    }

    pub fn push_field(&mut self, field: FormField, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn push_custom(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.custom.entry(key.into()).or_default().push(message.into());
    }

    pub fn field(&self, field: FormField) -> &[String] {
        self.fields.get(&field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = (FormField, &[String])> {
        self.fields.iter().map(|(f, m)| (*f, m.as_slice()))
    }

    pub fn entries(&self) -> &[FieldError] {
        &self.entries
    }

    pub fn entry(&self, category: ItemCategory, code: &str) -> Vec<&FieldError> {
        self.entries
            .iter()
            .filter(|e| e.entry() == Some((category, code)))
            .collect()
    }

    pub fn custom(&self) -> &BTreeMap<String, Vec<String>> {
        &self.custom
    }

    pub fn clear_field(&mut self, field: FormField) {
        self.fields.remove(&field);
    }

    pub fn clear_entry(&mut self, category: ItemCategory, code: &str) {
        self.entries.retain(|e| e.entry() != Some((category, code)));
    }

    pub fn extend(&mut self, other: FormErrors) {
        for (field, messages) in other.fields {
            self.fields.entry(field).or_default().extend(messages);
        }
        for error in other.entries {
            self.push(error);
        }
        for (key, messages) in other.custom {
            self.custom.entry(key).or_default().extend(messages);
        }
    }

    pub fn from_validation(errors: &ValidationErrors) -> Self {
        let mut form_errors = FormErrors::new();

        for (name, field_errors) in errors.field_errors() {
            let name = name.to_string();
            let field = FormField::from_struct_field(&name);
            for error in field_errors.iter() {
                let message = match (&error.message, field) {
                    (Some(message), _) => message.to_string(),
                    (None, Some(field)) => format!("{} is invalid", field),
                    (None, None) => format!("{} is invalid", name),
                };
                match field {
                    Some(field) => form_errors.push_field(field, message),
                    None => form_errors.push_custom(name.clone(), message),
                }
            }
        }

        form_errors
    }

    pub fn from_server(errors: &BTreeMap<String, Vec<String>>, phase: Phase) -> Self {
        let mut form_errors = FormErrors::new();

        for (key, messages) in errors {
            match FormField::from_server_key(key, phase) {
                Some(field) => form_errors
                    .fields
                    .entry(field)
                    .or_default()
                    .extend(messages.iter().cloned()),
                None => form_errors
                    .custom
                    .entry(key.clone())
                    .or_default()
                    .extend(messages.iter().cloned()),
            }
        }

        form_errors
    }
}
