mod engine;
mod error;
mod inflation;
mod plans;
mod recalc;
mod summary;
mod types;

pub use engine::{
    accrue_course_years, first_repayment_row, initial_row, next_row, project, run_projection,
};
pub use error::{ProjectionError, ProjectionResult};
pub use inflation::{projected_nominal_value, real_value};
pub use plans::{Plan, PlanParameters};
pub use recalc::{recalculate_edited_row, recalculate_from_edit};
pub use summary::{ProjectionOutcome, ProjectionSummary, summarize};
pub use types::{
    CourseDetails, PreGradYearRow, ProjectionOptions, ProjectionRow, RowField, RowInputs,
    RowOptions, StudentPath, YearRow,
};
