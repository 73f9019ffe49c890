pub mod item;
pub mod notice;
pub mod plan;
pub mod reservation;
pub mod session;

pub use item::*;
pub use notice::*;
pub use plan::*;
pub use reservation::*;
pub use session::*;

use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct DataResponse<T> {
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn field_errors(&self) -> BTreeMap<String, Vec<String>> {
        let Some(serde_json::Value::Object(fields)) = &self.error else {
            return BTreeMap::new();
        };

        fields
            .iter()
            .map(|(field, messages)| {
                let messages = match messages {
                    serde_json::Value::Array(values) => values
                        .iter()
                        .map(|v| match v {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect(),
                    serde_json::Value::String(s) => vec![s.clone()],
                    other => vec![other.to_string()],
                };
                (field.clone(), messages)
            })
            .collect()
    }

    pub fn describe(&self) -> Option<String> {
        if let Some(message) = self.message.as_ref().filter(|m| !m.is_empty()) {
            return Some(message.clone());
        }
        match &self.error {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }
}
