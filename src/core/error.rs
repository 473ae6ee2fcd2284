use thiserror::Error;

use super::types::RowField;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("projection needs at least one seed row")]
    EmptySeed,

    #[error("row {index} has no preceding row to recalculate from")]
    MissingPredecessor { index: usize },

    #[error("row {index} is out of range for a projection of {len} rows")]
    RowOutOfRange { index: usize, len: usize },

    #[error("row {index} is a course year and cannot be edited")]
    PreGraduationRowNotEditable { index: usize },

    #[error("field '{field}' is derived and cannot be edited")]
    FieldNotEditable { field: RowField },

    #[error("field '{field}' must be a finite, non-negative number, got {value}")]
    InvalidFieldValue { field: RowField, value: f64 },
}

pub type ProjectionResult<T> = Result<T, ProjectionError>;
