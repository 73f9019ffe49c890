use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::ItemCategory;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        errors: BTreeMap<String, Vec<String>>,
    },
    #[error("Unauthenticated")]
    Unauthorized,
    #[error("{message} (status {status})")]
    Status { status: u16, message: String },
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("{category} item {code} is already in the list")]
    DuplicateCode { category: ItemCategory, code: String },
    #[error("{category} item {code} is not in the list")]
    UnknownCode { category: ItemCategory, code: String },
    #[error("\"{status}\" is not a valid {category} status (item {code})")]
    StatusNotAllowed {
        category: ItemCategory,
        code: String,
        status: String,
    },
    #[error("{category} item {code} has no return status")]
    MissingStatus { category: ItemCategory, code: String },
    #[error("{category} item {code} cannot carry a status before return")]
    StatusNotApplicable { category: ItemCategory, code: String },
    #[error("return plan can only be set on a return")]
    ReturnPlanNotApplicable,
}

impl FieldError {
    pub fn entry(&self) -> Option<(ItemCategory, &str)> {
        match self {
            FieldError::DuplicateCode { category, code }
            | FieldError::UnknownCode { category, code }
            | FieldError::StatusNotAllowed { category, code, .. }
            | FieldError::MissingStatus { category, code }
            | FieldError::StatusNotApplicable { category, code } => Some((*category, code)),
            FieldError::ReturnPlanNotApplicable => None,
        }
    }
}
