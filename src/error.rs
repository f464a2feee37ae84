use thiserror::Error;

#[derive(Error, Debug)]
pub enum KpiEngineError {
    #[error("Invalid day of month {0}: must be between 1 and the number of days in the selected month")]
    InvalidDay(u32),

    #[error("Invalid month {0}: must be between 1 and 12")]
    InvalidMonth(u32),

    #[error("Duplicate KPI id in brand data: {0}")]
    DuplicateKpiId(String),

    #[error("Validation failed for KPI '{kpi}': {details}")]
    ValidationError { kpi: String, details: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, KpiEngineError>;
