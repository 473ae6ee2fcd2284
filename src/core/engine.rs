use log::debug;

use super::error::{ProjectionError, ProjectionResult};
use super::inflation::projected_nominal_value;
use super::types::{
    PreGradYearRow, ProjectionOptions, ProjectionRow, RowInputs, RowOptions, StudentPath, YearRow,
};

pub fn annual_interest_on(total_debt: f64, interest_rate: f64) -> f64 {
    total_debt * (interest_rate / 100.0)
}

fn carried_debt(total_debt: f64, annual_interest: f64, annual_repayment: f64) -> f64 {
    (total_debt + annual_interest - annual_repayment).max(0.0)
}

/// Years since graduation, 0 while repayment has not started.
pub fn loan_year(graduating_year: i32, calendar_year: i32) -> u32 {
    if graduating_year > calendar_year {
        0
    } else {
        calendar_year.abs_diff(graduating_year)
    }
}

/// Saturates instead of wrapping for terms beyond `i32::MAX` years.
pub fn years_until_wiped(loan_period: u32, graduating_year: i32, calendar_year: i32) -> i32 {
    let years_since_april = calendar_year
        .saturating_sub(graduating_year)
        .saturating_sub(1)
        .max(0);
    i32::try_from(loan_period)
        .unwrap_or(i32::MAX)
        .saturating_sub(years_since_april)
}

/// Share of income above the threshold, capped at the outstanding balance plus this year's interest.
pub fn income_contingent_repayment(
    current_loan_year: u32,
    salary: f64,
    repayment_threshold: f64,
    total_debt: f64,
    annual_interest: f64,
    income_percentage_taxed_over_threshold: f64,
) -> f64 {
    if current_loan_year == 0 || salary < repayment_threshold {
        return 0.0;
    }
    let max_repayment = (salary - repayment_threshold) * income_percentage_taxed_over_threshold;
    max_repayment.min(total_debt + annual_interest).max(0.0)
}

pub fn initial_row(inputs: RowInputs, options: &ProjectionOptions) -> YearRow {
    let calendar_year = options.reference_year;
    let annual_interest = annual_interest_on(inputs.total_debt, inputs.interest_rate);
    let current_loan_year = loan_year(options.graduating_year, calendar_year);
    let annual_repayment = income_contingent_repayment(
        current_loan_year,
        options.salary,
        options.repayment_threshold,
        inputs.total_debt,
        annual_interest,
        options.row_options.income_percentage_taxed_over_threshold,
    );

    YearRow {
        current_loan_year,
        graduating_year: options.graduating_year,
        salary: options.salary,
        calendar_year,
        total_debt: inputs.total_debt,
        interest_rate: inputs.interest_rate,
        annual_interest,
        repayment_threshold: options.repayment_threshold,
        annual_repayment,
        total_repaid: inputs.total_repaid + annual_repayment,
        years_until_wiped: years_until_wiped(
            options.loan_period,
            options.graduating_year,
            calendar_year,
        ),
    }
}

pub fn next_row(prev: &YearRow, row_options: &RowOptions) -> YearRow {
    let calendar_year = prev.calendar_year + 1;
    let total_debt = carried_debt(prev.total_debt, prev.annual_interest, prev.annual_repayment);
    let interest_rate = row_options.average_interest_rate;
    let annual_interest = annual_interest_on(total_debt, interest_rate);
    let current_loan_year = loan_year(prev.graduating_year, calendar_year);
    let salary = prev.salary * row_options.average_salary_growth;
    let repayment_threshold = prev.repayment_threshold * row_options.repayment_threshold_growth;
    let annual_repayment = income_contingent_repayment(
        current_loan_year,
        salary,
        repayment_threshold,
        total_debt,
        annual_interest,
        row_options.income_percentage_taxed_over_threshold,
    );

    YearRow {
        current_loan_year,
        graduating_year: prev.graduating_year,
        salary,
        calendar_year,
        total_debt,
        interest_rate,
        annual_interest,
        repayment_threshold,
        annual_repayment,
        total_repaid: prev.total_repaid + annual_repayment,
        years_until_wiped: prev.years_until_wiped - 1,
    }
}

/// Steps out of the last course year. Salary and threshold are the options' today's-money
/// figures carried to the course year at the average rate, then grown like any other year.
pub fn first_repayment_row(prev: &PreGradYearRow, options: &ProjectionOptions) -> YearRow {
    let row_options = &options.row_options;
    let calendar_year = prev.calendar_year + 1;
    let total_debt = carried_debt(prev.total_debt, prev.annual_interest, 0.0);
    let interest_rate = row_options.average_interest_rate;
    let annual_interest = annual_interest_on(total_debt, interest_rate);
    let current_loan_year = loan_year(options.graduating_year, calendar_year);
    let salary = projected_nominal_value(
        options.salary,
        row_options.average_interest_rate,
        options.reference_year,
        prev.calendar_year,
    ) * row_options.average_salary_growth;
    let repayment_threshold = projected_nominal_value(
        options.repayment_threshold,
        row_options.average_interest_rate,
        options.reference_year,
        prev.calendar_year,
    ) * row_options.repayment_threshold_growth;
    let annual_repayment = income_contingent_repayment(
        current_loan_year,
        salary,
        repayment_threshold,
        total_debt,
        annual_interest,
        row_options.income_percentage_taxed_over_threshold,
    );

    YearRow {
        current_loan_year,
        graduating_year: options.graduating_year,
        salary,
        calendar_year,
        total_debt,
        interest_rate,
        annual_interest,
        repayment_threshold,
        annual_repayment,
        total_repaid: annual_repayment,
        years_until_wiped: years_until_wiped(
            options.loan_period,
            options.graduating_year,
            calendar_year,
        ),
    }
}

pub fn accrue_course_years(
    start_year: i32,
    course_length: u32,
    per_year_borrowing: f64,
    interest_rate: f64,
) -> Vec<PreGradYearRow> {
    let mut rows: Vec<PreGradYearRow> = Vec::with_capacity(course_length as usize);
    for course_year in 1..=course_length {
        let (prev_debt, prev_interest) = rows
            .last()
            .map(|row| (row.total_debt, row.annual_interest))
            .unwrap_or((0.0, 0.0));
        let total_debt = carried_debt(prev_debt + per_year_borrowing, prev_interest, 0.0);
        rows.push(PreGradYearRow {
            calendar_year: start_year + course_year as i32,
            total_debt,
            interest_rate,
            annual_interest: annual_interest_on(total_debt, interest_rate),
        });
    }
    rows
}

/// Extends `seed` until the loan is repaid, written off, or `max_row_count` rows were added.
pub fn project(
    seed: &[ProjectionRow],
    max_row_count: u32,
    options: &ProjectionOptions,
) -> ProjectionResult<Vec<ProjectionRow>> {
    let Some(mut last) = seed.last().cloned() else {
        return Err(ProjectionError::EmptySeed);
    };

    // The cap only bounds iteration; rows grow as they are produced.
    let mut rows = seed.to_vec();

    for _ in 0..max_row_count {
        if last.total_debt().round() == 0.0 {
            debug!("loan repaid by {}", last.calendar_year());
            break;
        }
        let next = match &last {
            ProjectionRow::PreGraduation(row) => first_repayment_row(row, options),
            ProjectionRow::Repayment(row) => {
                if row.years_until_wiped <= 1 {
                    debug!(
                        "remaining balance {:.2} written off after {}",
                        row.total_debt, row.calendar_year
                    );
                    break;
                }
                next_row(row, &options.row_options)
            }
        };
        last = ProjectionRow::Repayment(next);
        rows.push(last.clone());
    }

    Ok(rows)
}

pub fn run_projection(
    path: &StudentPath,
    options: &ProjectionOptions,
) -> ProjectionResult<Vec<ProjectionRow>> {
    match path {
        StudentPath::Current(course) => {
            let seed: Vec<ProjectionRow> = accrue_course_years(
                course.course_start_year,
                course.course_length,
                course.yearly_borrowing(),
                options.row_options.plan_interest_rate,
            )
            .into_iter()
            .map(ProjectionRow::PreGraduation)
            .collect();
            project(&seed, options.loan_period, options)
        }
        StudentPath::Graduate {
            current_loan_balance,
        } => {
            let first = initial_row(
                RowInputs {
                    total_debt: *current_loan_balance,
                    interest_rate: options.row_options.plan_interest_rate,
                    annual_repayment: 0.0,
                    total_repaid: 0.0,
                },
                options,
            );
            let max_row_count = (first.years_until_wiped - 1).max(0) as u32;
            project(&[ProjectionRow::Repayment(first)], max_row_count, options)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::types::CourseDetails;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    pub(crate) fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    pub(crate) fn sample_options() -> ProjectionOptions {
        ProjectionOptions {
            loan_period: 30,
            repayment_threshold: 27_295.0,
            salary: 30_000.0,
            graduating_year: 2021,
            reference_year: 2023,
            row_options: RowOptions {
                average_salary_growth: 1.05,
                repayment_threshold_growth: 1.04,
                income_percentage_taxed_over_threshold: 0.09,
                plan_interest_rate: 3.0,
                average_interest_rate: 3.0,
            },
        }
    }

    fn graduate(balance: f64) -> StudentPath {
        StudentPath::Graduate {
            current_loan_balance: balance,
        }
    }

    fn rounded_debts(rows: &[ProjectionRow]) -> Vec<i64> {
        rows.iter().map(|row| row.total_debt().round() as i64).collect()
    }

    pub(crate) fn assert_row_invariants(rows: &[ProjectionRow]) {
        let mut running_repaid = 0.0;
        for (index, row) in rows.iter().enumerate() {
            assert!(row.total_debt() >= 0.0, "row {index} has negative debt");
            if let Some(prev) = index.checked_sub(1).map(|i| &rows[i]) {
                assert_eq!(row.calendar_year(), prev.calendar_year() + 1, "row {index}");
                if let (Some(a), Some(b)) = (prev.as_repayment(), row.as_repayment()) {
                    assert_eq!(b.years_until_wiped, a.years_until_wiped - 1, "row {index}");
                }
            }
            running_repaid += row.annual_repayment();
            assert!(
                (row.total_repaid() - running_repaid).abs() <= 1e-6,
                "row {index}: total repaid {} vs running sum {running_repaid}",
                row.total_repaid()
            );
        }
    }

    #[test]
    fn initial_row_matches_hand_calculation() {
        let options = sample_options();
        let row = initial_row(
            RowInputs {
                total_debt: 5_000.0,
                interest_rate: 3.0,
                annual_repayment: 0.0,
                total_repaid: 0.0,
            },
            &options,
        );

        assert_eq!(row.current_loan_year, 2);
        assert_eq!(row.graduating_year, 2021);
        assert_eq!(row.calendar_year, 2023);
        assert_eq!(row.years_until_wiped, 29);
        assert_approx(row.salary, 30_000.0);
        assert_approx(row.total_debt, 5_000.0);
        assert_approx(row.annual_interest, 150.0);
        assert_approx(row.repayment_threshold, 27_295.0);
        assert_approx(row.annual_repayment, 243.45);
        assert_approx(row.total_repaid, 243.45);
    }

    #[test]
    fn initial_row_before_graduation_repays_nothing() {
        let mut options = sample_options();
        options.graduating_year = 2025;
        let row = initial_row(
            RowInputs {
                total_debt: 20_000.0,
                interest_rate: 7.1,
                annual_repayment: 0.0,
                total_repaid: 0.0,
            },
            &options,
        );

        assert_eq!(row.current_loan_year, 0);
        assert_eq!(row.years_until_wiped, 30);
        assert_approx(row.annual_interest, 1_420.0);
        assert_approx(row.annual_repayment, 0.0);
        assert_approx(row.total_repaid, 0.0);
    }

    #[test]
    fn next_row_applies_last_years_interest_and_repayment() {
        let prev = YearRow {
            current_loan_year: 2,
            graduating_year: 2021,
            salary: 30_000.0,
            calendar_year: 2023,
            total_debt: 5_000.0,
            interest_rate: 3.0,
            annual_interest: 150.0,
            repayment_threshold: 27_295.0,
            annual_repayment: 243.45,
            total_repaid: 243.45,
            years_until_wiped: 27,
        };

        let row = next_row(&prev, &sample_options().row_options);

        assert_eq!(row.calendar_year, 2024);
        assert_eq!(row.current_loan_year, 3);
        assert_eq!(row.graduating_year, 2021);
        assert_eq!(row.years_until_wiped, 26);
        assert_approx(row.total_debt, 4_906.55);
        assert_approx(row.annual_interest, 147.1965);
        assert_approx(row.salary, 31_500.0);
        assert_approx(row.repayment_threshold, 28_386.8);
        assert_approx(row.annual_repayment, 280.188);
        assert_approx(row.total_repaid, 523.638);
    }

    #[test]
    fn next_row_switches_to_the_average_interest_rate() {
        let mut row_options = sample_options().row_options;
        row_options.average_interest_rate = 5.0;
        let prev = initial_row(
            RowInputs {
                total_debt: 10_000.0,
                interest_rate: 7.1,
                annual_repayment: 0.0,
                total_repaid: 0.0,
            },
            &sample_options(),
        );

        let row = next_row(&prev, &row_options);
        assert_approx(prev.interest_rate, 7.1);
        assert_approx(row.interest_rate, 5.0);
        assert_approx(row.annual_interest, row.total_debt * 0.05);
    }

    #[test]
    fn repayment_is_zero_below_threshold_or_before_graduation() {
        assert_approx(
            income_contingent_repayment(3, 20_000.0, 27_295.0, 10_000.0, 300.0, 0.09),
            0.0,
        );
        assert_approx(
            income_contingent_repayment(0, 90_000.0, 27_295.0, 10_000.0, 300.0, 0.09),
            0.0,
        );
    }

    #[test]
    fn repayment_is_capped_at_balance_plus_interest() {
        let repayment = income_contingent_repayment(5, 100_000.0, 27_295.0, 200.0, 6.0, 0.09);
        assert_approx(repayment, 206.0);
    }

    #[test]
    fn years_until_wiped_counts_from_the_april_after_graduation() {
        assert_eq!(years_until_wiped(30, 2021, 2022), 30);
        assert_eq!(years_until_wiped(30, 2021, 2023), 29);
        assert_eq!(years_until_wiped(30, 2025, 2023), 30);
    }

    #[test]
    fn years_until_wiped_saturates_for_oversized_terms() {
        assert_eq!(years_until_wiped(3_000_000_000, 2021, 2021), i32::MAX);
        assert_eq!(years_until_wiped(3_000_000_000, 2021, 2023), i32::MAX - 1);
        assert_eq!(years_until_wiped(30, i32::MIN, i32::MAX), 31 - i32::MAX);
    }

    #[test]
    fn huge_row_cap_stops_when_the_loan_is_repaid() {
        let mut options = sample_options();
        options.loan_period = 4_000_000_000;
        options.graduating_year = 2023;
        options.reference_year = 2020;
        let path = StudentPath::Current(CourseDetails {
            course_start_year: 2020,
            course_length: 3,
            yearly_maintenance: 0.0,
            yearly_tuition: 9_250.0,
        });

        let rows = run_projection(&path, &options).expect("projects");

        let last = rows.last().expect("rows");
        assert_eq!(last.total_debt().round(), 0.0);
        assert!(rows.len() < 100, "got {} rows", rows.len());
        assert!(
            rows[3]
                .as_repayment()
                .is_some_and(|row| row.years_until_wiped == i32::MAX)
        );
        assert_row_invariants(&rows);
    }

    #[test]
    fn small_balance_is_repaid_in_full() {
        let rows = run_projection(&graduate(5_000.0), &sample_options()).expect("projects");

        assert_eq!(
            rounded_debts(&rows),
            vec![
                5000, 4907, 4774, 4597, 4373, 4096, 3761, 3364, 2899, 2359, 1737, 1028, 222, 0
            ]
        );
        let last = rows.last().and_then(ProjectionRow::as_repayment).expect("repayment row");
        assert_approx(last.annual_repayment, 0.0);
        assert_row_invariants(&rows);
    }

    #[test]
    fn large_balance_runs_until_written_off() {
        let rows = run_projection(&graduate(50_000.0), &sample_options()).expect("projects");

        assert_eq!(
            rounded_debts(&rows),
            vec![
                50000, 51257, 52514, 53770, 55021, 56263, 57494, 58709, 59903, 61073, 62213,
                63318, 64381, 65397, 66358, 67257, 68086, 68836, 69497, 70061, 70515, 70850,
                71051, 71106, 71001, 70720, 70247, 69565, 68655,
            ]
        );
        let last = rows.last().and_then(ProjectionRow::as_repayment).expect("repayment row");
        assert_eq!(last.years_until_wiped, 1);
        assert_eq!(last.calendar_year, 2051);
        assert_row_invariants(&rows);
    }

    #[test]
    fn accrue_course_years_compounds_borrowing_and_interest() {
        let rows = accrue_course_years(2020, 3, 10_000.0, 7.1);

        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows.iter().map(|row| row.calendar_year).collect::<Vec<_>>(),
            vec![2021, 2022, 2023]
        );
        assert_approx(rows[0].total_debt, 10_000.0);
        assert_approx(rows[0].annual_interest, 710.0);
        assert_approx(rows[1].total_debt, 20_710.0);
        assert_approx(rows[1].annual_interest, 1_470.41);
        assert_approx(rows[2].total_debt, 32_180.41);
        assert_approx(rows[2].annual_interest, 2_284.80911);
    }

    #[test]
    fn accrue_course_years_with_no_course_is_empty() {
        assert!(accrue_course_years(2020, 0, 10_000.0, 7.1).is_empty());
    }

    #[test]
    fn current_student_starts_repaying_the_year_after_the_course() {
        let mut options = sample_options();
        options.graduating_year = 2023;
        options.reference_year = 2020;
        options.row_options.plan_interest_rate = 7.1;
        let path = StudentPath::Current(CourseDetails {
            course_start_year: 2020,
            course_length: 3,
            yearly_maintenance: 4_000.0,
            yearly_tuition: 6_000.0,
        });

        let rows = run_projection(&path, &options).expect("projects");

        assert!(matches!(rows[0], ProjectionRow::PreGraduation(_)));
        assert!(matches!(rows[2], ProjectionRow::PreGraduation(_)));
        let first = rows[3].as_repayment().expect("repayment row after the course");
        assert_eq!(first.calendar_year, 2024);
        assert_eq!(first.current_loan_year, 1);
        assert_eq!(first.years_until_wiped, 30);
        assert_approx(first.total_debt, 34_465.21911);
        assert_approx(first.annual_interest, 1_033.9565733);
        assert_approx(first.salary, 30_000.0 * 1.03_f64.powi(3) * 1.05);
        assert_approx(first.repayment_threshold, 27_295.0 * 1.03_f64.powi(3) * 1.04);
        assert_approx(
            first.annual_repayment,
            (first.salary - first.repayment_threshold) * 0.09,
        );
        assert!(rows.len() <= 3 + 30);
        assert_row_invariants(&rows);
    }

    #[test]
    fn course_with_no_years_has_nothing_to_project() {
        let path = StudentPath::Current(CourseDetails {
            course_start_year: 2020,
            course_length: 0,
            yearly_maintenance: 4_000.0,
            yearly_tuition: 6_000.0,
        });
        assert_eq!(
            run_projection(&path, &sample_options()),
            Err(ProjectionError::EmptySeed)
        );
    }

    #[test]
    fn project_rejects_an_empty_seed() {
        assert_eq!(
            project(&[], 10, &sample_options()),
            Err(ProjectionError::EmptySeed)
        );
    }

    #[test]
    fn project_keeps_the_seed_and_respects_the_row_cap() {
        let options = sample_options();
        let seed = vec![ProjectionRow::Repayment(initial_row(
            RowInputs {
                total_debt: 50_000.0,
                interest_rate: 3.0,
                annual_repayment: 0.0,
                total_repaid: 0.0,
            },
            &options,
        ))];

        let rows = project(&seed, 5, &options).expect("projects");
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0], seed[0]);
        assert_eq!(seed.len(), 1);
    }

    #[test]
    fn fully_written_off_loan_produces_only_the_seed() {
        let mut options = sample_options();
        options.graduating_year = 1990;
        let rows = run_projection(&graduate(10_000.0), &options).expect("projects");

        assert_eq!(rows.len(), 1);
        let seed = rows[0].as_repayment().expect("repayment row");
        assert!(seed.years_until_wiped <= 0);
    }

    #[test]
    fn projections_are_deterministic() {
        let options = sample_options();
        let a = run_projection(&graduate(42_000.0), &options).expect("projects");
        let b = run_projection(&graduate(42_000.0), &options).expect("projects");
        assert_eq!(a, b);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_graduate_projection_upholds_row_invariants(
            balance in 0u32..150_000,
            salary in 0u32..150_000,
            threshold in 10_000u32..40_000,
            salary_growth_bp in -500i32..1000,
            threshold_growth_bp in 0i32..600,
            share_bp in 0u32..1500,
            plan_rate_bp in 0u32..900,
            average_rate_bp in 0u32..900,
            loan_period in 1u32..45,
            graduating_year in 1990i32..2035,
        ) {
            let options = ProjectionOptions {
                loan_period,
                repayment_threshold: threshold as f64,
                salary: salary as f64,
                graduating_year,
                reference_year: 2024,
                row_options: RowOptions {
                    average_salary_growth: 1.0 + salary_growth_bp as f64 / 10_000.0,
                    repayment_threshold_growth: 1.0 + threshold_growth_bp as f64 / 10_000.0,
                    income_percentage_taxed_over_threshold: share_bp as f64 / 10_000.0,
                    plan_interest_rate: plan_rate_bp as f64 / 100.0,
                    average_interest_rate: average_rate_bp as f64 / 100.0,
                },
            };

            let rows = run_projection(&graduate(balance as f64), &options).expect("projects");
            assert_row_invariants(&rows);

            let seed = rows[0].as_repayment().expect("graduate seed");
            let cap = (seed.years_until_wiped - 1).max(0) as usize;
            prop_assert!(rows.len() <= cap + 1);
            for row in &rows[..rows.len() - 1] {
                prop_assert!(row.total_debt().round() != 0.0);
            }
            for row in rows.iter().filter_map(ProjectionRow::as_repayment) {
                prop_assert!(row.years_until_wiped >= seed.years_until_wiped.min(1));
                prop_assert!(row.annual_repayment >= 0.0);
            }
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_current_student_projection_is_bounded_by_the_loan_period(
            course_length in 1u32..7,
            borrowing in 1_000u32..20_000,
            start_year in 2015i32..2030,
            loan_period in 1u32..45,
            share_bp in 0u32..1500,
        ) {
            let course = CourseDetails {
                course_start_year: start_year,
                course_length,
                yearly_maintenance: borrowing as f64,
                yearly_tuition: 0.0,
            };
            let mut options = sample_options();
            options.loan_period = loan_period;
            options.graduating_year = course.graduating_year();
            options.reference_year = start_year;
            options.row_options.income_percentage_taxed_over_threshold = share_bp as f64 / 10_000.0;

            let rows = run_projection(&StudentPath::Current(course), &options).expect("projects");
            assert_row_invariants(&rows);

            let course_rows = rows
                .iter()
                .take_while(|row| matches!(row, ProjectionRow::PreGraduation(_)))
                .count();
            prop_assert_eq!(course_rows, course_length as usize);
            prop_assert!(rows.len() - course_rows <= loan_period as usize);
            if let Some(first) = rows.get(course_rows).and_then(ProjectionRow::as_repayment) {
                prop_assert_eq!(first.current_loan_year, 1);
                prop_assert_eq!(first.years_until_wiped, loan_period as i32);
            }
        }
    }
}
