use thiserror::Error;

use crate::images::TelescopeType;
use crate::tables::TableQuantity;

#[derive(Error, Debug)]
pub enum ShowerScaleError {
    #[error("Invalid lookup parameter: {0}")]
    InvalidLookupParameter(String),

    #[error("Invalid sample weight (must be finite and non-negative): {0}")]
    InvalidSampleWeight(f64),

    #[error("Invalid table axis: {0}")]
    InvalidTableAxis(String),

    #[error("Axis definition mismatch for {quantity} table: {detail}")]
    AxisMismatch {
        quantity: TableQuantity,
        detail: String,
    },

    #[error("Missing lookup table: {0}")]
    MissingTable(String),

    #[error("Telescope type {0} is not present in the table grid")]
    UnknownTelescopeType(TelescopeType),

    #[error("Inconsistent grid layout: {0}")]
    InconsistentGrid(String),

    #[error("Empty table grid: {0}")]
    EmptyGrid(String),

    #[error("Event is inconsistent with the array description: {0}")]
    InvalidEvent(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON (de)serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl PartialEq for ShowerScaleError {
    fn eq(&self, other: &Self) -> bool {
        use ShowerScaleError::*;
        match (self, other) {
            (InvalidLookupParameter(a), InvalidLookupParameter(b)) => a == b,
            (InvalidSampleWeight(a), InvalidSampleWeight(b)) => a.to_bits() == b.to_bits(),
            (InvalidTableAxis(a), InvalidTableAxis(b)) => a == b,
            (
                AxisMismatch {
                    quantity: qa,
                    detail: da,
                },
                AxisMismatch {
                    quantity: qb,
                    detail: db,
                },
            ) => qa == qb && da == db,
            (MissingTable(a), MissingTable(b)) => a == b,
            (UnknownTelescopeType(a), UnknownTelescopeType(b)) => a == b,
            (InconsistentGrid(a), InconsistentGrid(b)) => a == b,
            (EmptyGrid(a), EmptyGrid(b)) => a == b,
            (InvalidEvent(a), InvalidEvent(b)) => a == b,

            // Not comparable: equal when the variant matches
            (IoError(_), IoError(_)) => true,
            (JsonError(_), JsonError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            _ => false,
        }
    }
}
