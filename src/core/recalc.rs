use log::debug;

use super::engine::{annual_interest_on, income_contingent_repayment, project};
use super::error::{ProjectionError, ProjectionResult};
use super::types::{ProjectionOptions, ProjectionRow, RowField, RowInputs, RowOptions, YearRow};

/// Refreshes the derived columns of an edited row. Calendar year, debt and threshold are kept as
/// given; only interest, repayment and the running total follow from them.
pub fn recalculate_edited_row(
    edited: YearRow,
    inputs: RowInputs,
    row_options: &RowOptions,
) -> YearRow {
    let annual_interest = annual_interest_on(edited.total_debt, edited.interest_rate);
    let annual_repayment = income_contingent_repayment(
        edited.current_loan_year,
        edited.salary,
        edited.repayment_threshold,
        edited.total_debt,
        annual_interest,
        row_options.income_percentage_taxed_over_threshold,
    );

    YearRow {
        annual_interest,
        annual_repayment,
        total_repaid: inputs.total_repaid + annual_repayment,
        ..edited
    }
}

/// Applies one cell edit and regenerates every row from `edited_index` on.
///
/// Rows before `edited_index` are copied untouched. The regenerated tail, edited row included,
/// is never longer than the tail it replaces.
pub fn recalculate_from_edit(
    rows: &[ProjectionRow],
    edited_index: usize,
    field: RowField,
    value: f64,
    options: &ProjectionOptions,
) -> ProjectionResult<Vec<ProjectionRow>> {
    let original = rows
        .get(edited_index)
        .ok_or(ProjectionError::RowOutOfRange {
            index: edited_index,
            len: rows.len(),
        })?
        .as_repayment()
        .ok_or(ProjectionError::PreGraduationRowNotEditable {
            index: edited_index,
        })?;
    let edited = original.with_field(field, value)?;

    let inputs = if edited_index == 0 {
        RowInputs {
            total_debt: edited.total_debt,
            interest_rate: edited.interest_rate,
            annual_repayment: 0.0,
            total_repaid: 0.0,
        }
    } else {
        // Unreachable once the bounds check above passes.
        rows.get(edited_index - 1)
            .map(ProjectionRow::inputs)
            .ok_or(ProjectionError::MissingPredecessor {
                index: edited_index,
            })?
    };

    let recalculated = recalculate_edited_row(edited, inputs, &options.row_options);
    let max_row_count = (rows.len() - edited_index - 1) as u32;
    debug!(
        "recalculating from row {edited_index} ({field} = {value}), up to {max_row_count} rows after it"
    );
    let tail = project(&[ProjectionRow::Repayment(recalculated)], max_row_count, options)?;

    let mut result = Vec::with_capacity(edited_index + tail.len());
    result.extend_from_slice(&rows[..edited_index]);
    result.extend(tail);
    Ok(result)
}
