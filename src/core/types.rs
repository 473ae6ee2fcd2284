use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{ProjectionError, ProjectionResult};

/// Year-on-year growth and rate assumptions applied by the row transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowOptions {
    /// Multiplier applied to salary each year, e.g. 1.05.
    pub average_salary_growth: f64,
    /// Multiplier applied to the repayment threshold each year.
    pub repayment_threshold_growth: f64,
    /// Share of income above the threshold that is repaid, in [0, 1).
    pub income_percentage_taxed_over_threshold: f64,
    /// Statutory plan rate in percent, used for course years and the initial row.
    pub plan_interest_rate: f64,
    /// Long-run average rate in percent, used for every generated row.
    pub average_interest_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionOptions {
    pub loan_period: u32,
    pub repayment_threshold: f64,
    pub salary: f64,
    pub graduating_year: i32,
    /// The calendar year treated as "now".
    pub reference_year: i32,
    pub row_options: RowOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetails {
    pub course_start_year: i32,
    pub course_length: u32,
    pub yearly_maintenance: f64,
    pub yearly_tuition: f64,
}

impl CourseDetails {
    pub fn yearly_borrowing(&self) -> f64 {
        self.yearly_maintenance + self.yearly_tuition
    }

    pub fn graduating_year(&self) -> i32 {
        self.course_start_year + self.course_length as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StudentPath {
    Current(CourseDetails),
    Graduate { current_loan_balance: f64 },
}

/// One projected year once repayment obligations can exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRow {
    pub current_loan_year: u32,
    pub graduating_year: i32,
    pub salary: f64,
    pub calendar_year: i32,
    pub total_debt: f64,
    pub interest_rate: f64,
    pub annual_interest: f64,
    pub repayment_threshold: f64,
    pub annual_repayment: f64,
    pub total_repaid: f64,
    pub years_until_wiped: i32,
}

impl YearRow {
    /// Copy of this row with one editable field replaced.
    pub fn with_field(&self, field: RowField, value: f64) -> ProjectionResult<YearRow> {
        let mut row = self.clone();
        let slot = match field {
            RowField::Salary => &mut row.salary,
            RowField::TotalDebt => &mut row.total_debt,
            RowField::InterestRate => &mut row.interest_rate,
            RowField::RepaymentThreshold => &mut row.repayment_threshold,
            _ => return Err(ProjectionError::FieldNotEditable { field }),
        };
        if !value.is_finite() || value < 0.0 {
            return Err(ProjectionError::InvalidFieldValue { field, value });
        }
        *slot = value;
        Ok(row)
    }
}

/// A course year: debt accrues, nothing is repaid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PreGradYearRow {
    pub calendar_year: i32,
    pub total_debt: f64,
    pub interest_rate: f64,
    pub annual_interest: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProjectionRow {
    Repayment(YearRow),
    PreGraduation(PreGradYearRow),
}

impl ProjectionRow {
    pub fn calendar_year(&self) -> i32 {
        match self {
            ProjectionRow::Repayment(row) => row.calendar_year,
            ProjectionRow::PreGraduation(row) => row.calendar_year,
        }
    }

    pub fn total_debt(&self) -> f64 {
        match self {
            ProjectionRow::Repayment(row) => row.total_debt,
            ProjectionRow::PreGraduation(row) => row.total_debt,
        }
    }

    pub fn interest_rate(&self) -> f64 {
        match self {
            ProjectionRow::Repayment(row) => row.interest_rate,
            ProjectionRow::PreGraduation(row) => row.interest_rate,
        }
    }

    pub fn annual_interest(&self) -> f64 {
        match self {
            ProjectionRow::Repayment(row) => row.annual_interest,
            ProjectionRow::PreGraduation(row) => row.annual_interest,
        }
    }

    pub fn annual_repayment(&self) -> f64 {
        match self {
            ProjectionRow::Repayment(row) => row.annual_repayment,
            ProjectionRow::PreGraduation(_) => 0.0,
        }
    }

    pub fn total_repaid(&self) -> f64 {
        match self {
            ProjectionRow::Repayment(row) => row.total_repaid,
            ProjectionRow::PreGraduation(_) => 0.0,
        }
    }

    pub fn as_repayment(&self) -> Option<&YearRow> {
        match self {
            ProjectionRow::Repayment(row) => Some(row),
            ProjectionRow::PreGraduation(_) => None,
        }
    }

    /// The values that feed the row after this one.
    pub fn inputs(&self) -> RowInputs {
        RowInputs {
            total_debt: self.total_debt(),
            interest_rate: self.interest_rate(),
            annual_repayment: self.annual_repayment(),
            total_repaid: self.total_repaid(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowInputs {
    pub total_debt: f64,
    pub interest_rate: f64,
    pub annual_repayment: f64,
    pub total_repaid: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RowField {
    CurrentLoanYear,
    GraduatingYear,
    Salary,
    CalendarYear,
    TotalDebt,
    InterestRate,
    AnnualInterest,
    RepaymentThreshold,
    AnnualRepayment,
    TotalRepaid,
    YearsUntilWiped,
}

impl RowField {
    pub const ALL: [RowField; 11] = [
        RowField::CurrentLoanYear,
        RowField::GraduatingYear,
        RowField::Salary,
        RowField::CalendarYear,
        RowField::TotalDebt,
        RowField::InterestRate,
        RowField::AnnualInterest,
        RowField::RepaymentThreshold,
        RowField::AnnualRepayment,
        RowField::TotalRepaid,
        RowField::YearsUntilWiped,
    ];

    /// Inputs a user may override; everything else is derived or structural.
    pub fn is_editable(self) -> bool {
        matches!(
            self,
            RowField::Salary
                | RowField::TotalDebt
                | RowField::InterestRate
                | RowField::RepaymentThreshold
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RowField::CurrentLoanYear => "currentLoanYear",
            RowField::GraduatingYear => "graduatingYear",
            RowField::Salary => "salary",
            RowField::CalendarYear => "calendarYear",
            RowField::TotalDebt => "totalDebt",
            RowField::InterestRate => "interestRate",
            RowField::AnnualInterest => "annualInterest",
            RowField::RepaymentThreshold => "repaymentThreshold",
            RowField::AnnualRepayment => "annualRepayment",
            RowField::TotalRepaid => "totalRepaid",
            RowField::YearsUntilWiped => "yearsUntilWiped",
        }
    }
}

impl fmt::Display for RowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RowField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RowField::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("unknown row field '{s}'"))
    }
}
