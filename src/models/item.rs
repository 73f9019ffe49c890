use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCategory {
    Motor,
    Helmet,
    Fak,
    Hardcase,
}

impl ItemCategory {
    pub const ALL: [ItemCategory; 4] = [
        ItemCategory::Motor,
        ItemCategory::Helmet,
        ItemCategory::Fak,
        ItemCategory::Hardcase,
    ];

    pub fn field_name(self) -> &'static str {
        match self {
            ItemCategory::Motor => "motor",
            ItemCategory::Helmet => "helmet",
            ItemCategory::Fak => "fak",
            ItemCategory::Hardcase => "hardcase",
        }
    }

    pub fn code_key(self) -> &'static str {
        match self {
            ItemCategory::Motor => "motor_code",
            ItemCategory::Helmet => "helmet_code",
            ItemCategory::Fak => "fak_code",
            ItemCategory::Hardcase => "hardcase_code",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        ItemCategory::ALL
            .into_iter()
            .find(|c| c.field_name() == name)
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ItemCategory::Motor => "Motor",
            ItemCategory::Helmet => "Helmet",
            ItemCategory::Fak => "First Aid Kit",
            ItemCategory::Hardcase => "Hardcase",
        };
        f.write_str(label)
    }
}

impl FromStr for ItemCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemCategory::from_field_name(&s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown item category \"{}\"", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    #[serde(rename = "Ready For Rent")]
    ReadyForRent,
    #[serde(rename = "Out Of Service")]
    OutOfService,
    Lost,
    // the API spells it "Scrab"
    #[serde(rename = "Scrab", alias = "Scrap")]
    Scrap,
    Complete,
    Incomplete,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::ReadyForRent => "Ready For Rent",
            ItemStatus::OutOfService => "Out Of Service",
            ItemStatus::Lost => "Lost",
            ItemStatus::Scrap => "Scrab",
            ItemStatus::Complete => "Complete",
            ItemStatus::Incomplete => "Incomplete",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        match normalized.as_str() {
            "ready for rent" | "readyforrent" => Ok(ItemStatus::ReadyForRent),
            "out of service" | "outofservice" => Ok(ItemStatus::OutOfService),
            "lost" => Ok(ItemStatus::Lost),
            "scrab" | "scrap" => Ok(ItemStatus::Scrap),
            "complete" => Ok(ItemStatus::Complete),
            "incomplete" => Ok(ItemStatus::Incomplete),
            _ => Err(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRef {
    #[serde(default)]
    pub id: Option<i64>,
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bom_code: Option<String>,
    #[serde(default)]
    pub plan_code: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub information: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ItemRef {
    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            id: None,
            code: code.into(),
            name: None,
            bom_code: None,
            plan_code: None,
            status: None,
            information: None,
            created_at: None,
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_wire_and_display_spellings() {
        assert_eq!("Ready For Rent".parse::<ItemStatus>(), Ok(ItemStatus::ReadyForRent));
        assert_eq!("out  of service".parse::<ItemStatus>(), Ok(ItemStatus::OutOfService));
        assert_eq!("Scrap".parse::<ItemStatus>(), Ok(ItemStatus::Scrap));
        assert_eq!("Scrab".parse::<ItemStatus>(), Ok(ItemStatus::Scrap));
        assert!("Broken".parse::<ItemStatus>().is_err());
    }

    #[test]
    fn scrap_serializes_with_server_spelling() {
        let json = serde_json::to_string(&ItemStatus::Scrap).unwrap();
        assert_eq!(json, "\"Scrab\"");
        let back: ItemStatus = serde_json::from_str("\"Scrap\"").unwrap();
        assert_eq!(back, ItemStatus::Scrap);
    }

    #[test]
    fn category_names() {
        assert_eq!("FAK".parse::<ItemCategory>(), Ok(ItemCategory::Fak));
        assert_eq!(ItemCategory::Hardcase.code_key(), "hardcase_code");
        assert_eq!(ItemCategory::from_field_name("helmet"), Some(ItemCategory::Helmet));
        assert_eq!(ItemCategory::from_field_name("general"), None);
    }
}
