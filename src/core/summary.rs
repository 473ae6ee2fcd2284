use serde::Serialize;

use super::inflation::real_value;
use super::types::ProjectionRow;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectionOutcome {
    RepaidInFull,
    WrittenOff,
    /// Stopped by the row cap before either of the above.
    HorizonReached,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionSummary {
    pub outcome: ProjectionOutcome,
    pub final_calendar_year: i32,
    pub repayment_years: u32,
    pub total_repaid: f64,
    /// Total repaid expressed in reference-year money.
    pub total_repaid_real: f64,
    pub total_interest: f64,
    /// Balance left after the final year; the amount written off when the loan is wiped.
    pub remaining_debt: f64,
}

pub fn summarize(rows: &[ProjectionRow], reference_year: i32) -> Option<ProjectionSummary> {
    let last = rows.last()?;

    let outcome = if last.total_debt().round() == 0.0 {
        ProjectionOutcome::RepaidInFull
    } else if last
        .as_repayment()
        .is_some_and(|row| row.years_until_wiped <= 1)
    {
        ProjectionOutcome::WrittenOff
    } else {
        ProjectionOutcome::HorizonReached
    };

    let total_repaid_real = rows
        .iter()
        .map(|row| real_value(row.annual_repayment(), row.calendar_year(), reference_year))
        .sum();

    Some(ProjectionSummary {
        outcome,
        final_calendar_year: last.calendar_year(),
        repayment_years: rows.iter().filter(|row| row.annual_repayment() > 0.0).count() as u32,
        total_repaid: last.total_repaid(),
        total_repaid_real,
        total_interest: rows.iter().map(ProjectionRow::annual_interest).sum(),
        remaining_debt: (last.total_debt() + last.annual_interest() - last.annual_repayment())
            .max(0.0),
    })
}
