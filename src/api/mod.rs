use axum::{
    Router,
    extract::{Json, Query},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Datelike;
use clap::{Parser, ValueEnum};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    CourseDetails, Plan, PlanParameters, ProjectionOptions, ProjectionRow, ProjectionSummary,
    RowField, RowOptions, StudentPath, recalculate_from_edit, run_projection, summarize,
};

const MIN_CALENDAR_YEAR: i32 = 1980;
const MAX_CALENDAR_YEAR: i32 = 2200;
const MAX_YEARS_AHEAD: i32 = 10;
const MAX_COURSE_LENGTH: u32 = 10;
const MAX_LOAN_PERIOD: u32 = 100;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliPlan {
    Plan1,
    Plan2,
    Plan3,
    Plan4,
    Plan5,
}

impl From<CliPlan> for Plan {
    fn from(value: CliPlan) -> Self {
        match value {
            CliPlan::Plan1 => Plan::Plan1,
            CliPlan::Plan2 => Plan::Plan2,
            CliPlan::Plan3 => Plan::Plan3,
            CliPlan::Plan4 => Plan::Plan4,
            CliPlan::Plan5 => Plan::Plan5,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliStudentType {
    Current,
    Graduate,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiPlan {
    #[serde(alias = "plan-1", alias = "1")]
    Plan1,
    #[serde(alias = "plan-2", alias = "2")]
    Plan2,
    #[serde(alias = "plan-3", alias = "3", alias = "postgraduate")]
    Plan3,
    #[serde(alias = "plan-4", alias = "4")]
    Plan4,
    #[serde(alias = "plan-5", alias = "5")]
    Plan5,
}

impl From<ApiPlan> for CliPlan {
    fn from(value: ApiPlan) -> Self {
        match value {
            ApiPlan::Plan1 => CliPlan::Plan1,
            ApiPlan::Plan2 => CliPlan::Plan2,
            ApiPlan::Plan3 => CliPlan::Plan3,
            ApiPlan::Plan4 => CliPlan::Plan4,
            ApiPlan::Plan5 => CliPlan::Plan5,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiStudentType {
    #[serde(alias = "currentStudent", alias = "current_student", alias = "student")]
    Current,
    #[serde(alias = "graduated")]
    Graduate,
}

impl From<ApiStudentType> for CliStudentType {
    fn from(value: ApiStudentType) -> Self {
        match value {
            ApiStudentType::Current => CliStudentType::Current,
            ApiStudentType::Graduate => CliStudentType::Graduate,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
enum ResponseStudentType {
    Current,
    Graduate,
}

impl From<&StudentPath> for ResponseStudentType {
    fn from(value: &StudentPath) -> Self {
        match value {
            StudentPath::Current(_) => ResponseStudentType::Current,
            StudentPath::Graduate { .. } => ResponseStudentType::Graduate,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    plan: Option<ApiPlan>,
    student: Option<ApiStudentType>,
    reference_year: Option<i32>,

    salary: Option<f64>,
    salary_growth: Option<f64>,
    threshold_growth: Option<f64>,
    average_interest_rate: Option<f64>,

    loan_period: Option<u32>,
    repayment_threshold: Option<f64>,
    income_share: Option<f64>,
    plan_interest_rate: Option<f64>,

    graduating_year: Option<i32>,
    current_loan_balance: Option<f64>,

    course_start_year: Option<i32>,
    course_length: Option<u32>,
    yearly_maintenance: Option<f64>,
    yearly_tuition: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecalculatePayload {
    #[serde(default)]
    request: ProjectPayload,
    rows: Vec<ProjectionRow>,
    row_index: usize,
    field: RowField,
    value: f64,
}

#[derive(Parser, Debug)]
#[command(
    name = "loan-tracker",
    about = "UK student loan projector (income-contingent repayment, course-year interest, write-off)"
)]
struct Cli {
    #[arg(long, value_enum, default_value_t = CliPlan::Plan2)]
    plan: CliPlan,
    #[arg(long, value_enum, default_value_t = CliStudentType::Graduate)]
    student: CliStudentType,
    #[arg(
        long,
        help = "Calendar year the projection starts from; defaults to the current year"
    )]
    reference_year: Option<i32>,
    #[arg(long, default_value_t = 30_000.0, help = "Starting annual salary")]
    salary: f64,
    #[arg(
        long,
        default_value_t = 5.0,
        help = "Average annual salary growth in percent"
    )]
    salary_growth: f64,
    #[arg(
        long,
        default_value_t = 4.0,
        help = "Annual repayment threshold growth in percent"
    )]
    threshold_growth: f64,
    #[arg(
        long,
        default_value_t = 3.0,
        help = "Long-run average interest rate in percent, applied after the first year"
    )]
    average_interest_rate: f64,
    #[arg(long, help = "Years until write-off; defaults to the plan's term")]
    loan_period: Option<u32>,
    #[arg(long, help = "Repayment threshold; defaults to the plan's threshold")]
    repayment_threshold: Option<f64>,
    #[arg(
        long,
        help = "Percent of income above the threshold that is repaid; defaults to the plan's share"
    )]
    income_share: Option<f64>,
    #[arg(
        long,
        help = "Interest rate in percent for course years and the first year; defaults to the plan's rate"
    )]
    plan_interest_rate: Option<f64>,
    #[arg(long, help = "Graduation year; required for graduates")]
    graduating_year: Option<i32>,
    #[arg(long, default_value_t = 0.0, help = "Outstanding balance for graduates")]
    current_loan_balance: f64,
    #[arg(long, help = "First calendar year of the course; required for current students")]
    course_start_year: Option<i32>,
    #[arg(long, default_value_t = 3)]
    course_length: u32,
    #[arg(long, default_value_t = 0.0, help = "Maintenance loan per course year")]
    yearly_maintenance: f64,
    #[arg(long, default_value_t = 9_250.0, help = "Tuition fee loan per course year")]
    yearly_tuition: f64,
}

#[derive(Debug)]
struct ProjectionRequest {
    plan: Plan,
    options: ProjectionOptions,
    path: StudentPath,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    plan: Plan,
    student_type: ResponseStudentType,
    reference_year: i32,
    options: ProjectionOptions,
    rows: Vec<ProjectionRow>,
    summary: Option<ProjectionSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecalculateResponse {
    rows: Vec<ProjectionRow>,
    summary: Option<ProjectionSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanEntry {
    plan: Plan,
    #[serde(flatten)]
    parameters: PlanParameters,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn current_year() -> i32 {
    chrono::Local::now().year()
}

fn validate_year(flag: &str, year: i32, reference_year: i32) -> Result<(), String> {
    let max_year = reference_year.saturating_add(MAX_YEARS_AHEAD);
    if !(MIN_CALENDAR_YEAR..=max_year).contains(&year) {
        return Err(format!(
            "{flag} must be between {MIN_CALENDAR_YEAR} and {max_year}"
        ));
    }
    Ok(())
}

fn build_request(cli: Cli, today: i32) -> Result<ProjectionRequest, String> {
    let plan: Plan = cli.plan.into();
    let plan_params = plan.parameters();
    let reference_year = cli.reference_year.unwrap_or(today);

    if !(MIN_CALENDAR_YEAR..=MAX_CALENDAR_YEAR).contains(&reference_year) {
        return Err(format!(
            "--reference-year must be between {MIN_CALENDAR_YEAR} and {MAX_CALENDAR_YEAR}"
        ));
    }

    if !cli.salary.is_finite() || cli.salary < 0.0 {
        return Err("--salary must be >= 0".to_string());
    }

    for (name, rate) in [
        ("--salary-growth", cli.salary_growth),
        ("--threshold-growth", cli.threshold_growth),
        ("--average-interest-rate", cli.average_interest_rate),
    ] {
        if !rate.is_finite() || rate <= -100.0 {
            return Err(format!("{name} must be > -100"));
        }
    }

    let loan_period = cli.loan_period.unwrap_or(plan_params.loan_period);
    if !(1..=MAX_LOAN_PERIOD).contains(&loan_period) {
        return Err(format!("--loan-period must be between 1 and {MAX_LOAN_PERIOD}"));
    }

    let repayment_threshold = cli
        .repayment_threshold
        .unwrap_or(plan_params.repayment_threshold);
    if !repayment_threshold.is_finite() || repayment_threshold < 0.0 {
        return Err("--repayment-threshold must be >= 0".to_string());
    }

    let income_share = cli
        .income_share
        .map(|share| share / 100.0)
        .unwrap_or(plan_params.income_percentage_taxed_over_threshold);
    if !(0.0..1.0).contains(&income_share) {
        return Err("--income-share must be >= 0 and < 100".to_string());
    }

    let plan_interest_rate = cli
        .plan_interest_rate
        .unwrap_or(plan_params.interest_rate);
    if !plan_interest_rate.is_finite() || plan_interest_rate < 0.0 {
        return Err("--plan-interest-rate must be >= 0".to_string());
    }

    let (path, graduating_year) = match cli.student {
        CliStudentType::Graduate => {
            let Some(graduating_year) = cli.graduating_year else {
                return Err("--graduating-year is required for graduates".to_string());
            };
            validate_year("--graduating-year", graduating_year, reference_year)?;
            if !cli.current_loan_balance.is_finite() || cli.current_loan_balance <= 0.0 {
                return Err("--current-loan-balance must be > 0".to_string());
            }
            (
                StudentPath::Graduate {
                    current_loan_balance: cli.current_loan_balance,
                },
                graduating_year,
            )
        }
        CliStudentType::Current => {
            let Some(course_start_year) = cli.course_start_year else {
                return Err("--course-start-year is required for current students".to_string());
            };
            validate_year("--course-start-year", course_start_year, reference_year)?;
            if !(1..=MAX_COURSE_LENGTH).contains(&cli.course_length) {
                return Err(format!(
                    "--course-length must be between 1 and {MAX_COURSE_LENGTH}"
                ));
            }
            if !cli.yearly_maintenance.is_finite() || cli.yearly_maintenance < 0.0 {
                return Err("--yearly-maintenance must be >= 0".to_string());
            }
            if !cli.yearly_tuition.is_finite() || cli.yearly_tuition < 0.0 {
                return Err("--yearly-tuition must be >= 0".to_string());
            }
            let course = CourseDetails {
                course_start_year,
                course_length: cli.course_length,
                yearly_maintenance: cli.yearly_maintenance,
                yearly_tuition: cli.yearly_tuition,
            };
            let graduating_year = course.graduating_year();
            if cli.graduating_year.is_some_and(|year| year != graduating_year) {
                return Err(
                    "--graduating-year must equal --course-start-year + --course-length"
                        .to_string(),
                );
            }
            (StudentPath::Current(course), graduating_year)
        }
    };

    Ok(ProjectionRequest {
        plan,
        options: ProjectionOptions {
            loan_period,
            repayment_threshold,
            salary: cli.salary,
            graduating_year,
            reference_year,
            row_options: RowOptions {
                average_salary_growth: 1.0 + cli.salary_growth / 100.0,
                repayment_threshold_growth: 1.0 + cli.threshold_growth / 100.0,
                income_percentage_taxed_over_threshold: income_share,
                plan_interest_rate,
                average_interest_rate: cli.average_interest_rate,
            },
        },
        path,
    })
}

fn project_response(request: &ProjectionRequest) -> Result<ProjectResponse, String> {
    let rows = run_projection(&request.path, &request.options).map_err(|e| e.to_string())?;
    let summary = summarize(&rows, request.options.reference_year);
    Ok(ProjectResponse {
        plan: request.plan,
        student_type: (&request.path).into(),
        reference_year: request.options.reference_year,
        options: request.options,
        rows,
        summary,
    })
}

/// Parses CLI flags, runs one projection and prints it as JSON.
pub fn run_cli() -> Result<(), String> {
    let cli = Cli::parse();
    let request = build_request(cli, current_year())?;
    let response = project_response(&request)?;
    let json = serde_json::to_string_pretty(&response)
        .map_err(|e| format!("failed to serialize projection: {e}"))?;
    println!("{json}");
    Ok(())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/plans", get(plans_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route("/api/recalculate", post(recalculate_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!("loan tracker HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/api/plans");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn plans_handler() -> Response {
    json_response(StatusCode::OK, plan_entries())
}

async fn project_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_handler_impl(payload).await
}

async fn project_handler_impl(payload: ProjectPayload) -> Response {
    let result = request_from_payload(payload, current_year())
        .and_then(|request| project_response(&request));
    match result {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => {
            warn!("rejected projection request: {msg}");
            error_response(StatusCode::BAD_REQUEST, &msg)
        }
    }
}

async fn recalculate_handler(Json(payload): Json<RecalculatePayload>) -> Response {
    match recalculate_from_payload(payload, current_year()) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => {
            warn!("rejected recalculation request: {msg}");
            error_response(StatusCode::BAD_REQUEST, &msg)
        }
    }
}

fn plan_entries() -> Vec<PlanEntry> {
    Plan::ALL
        .into_iter()
        .map(|plan| PlanEntry {
            plan,
            parameters: plan.parameters(),
        })
        .collect()
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn recalculate_from_payload(
    payload: RecalculatePayload,
    today: i32,
) -> Result<RecalculateResponse, String> {
    let request = request_from_payload(payload.request, today)?;
    validate_rows(&payload.rows)?;
    let rows = recalculate_from_edit(
        &payload.rows,
        payload.row_index,
        payload.field,
        payload.value,
        &request.options,
    )
    .map_err(|e| e.to_string())?;
    let summary = summarize(&rows, request.options.reference_year);
    Ok(RecalculateResponse { rows, summary })
}

/// Rows come back from the client; keep their years in the range projections can produce.
fn validate_rows(rows: &[ProjectionRow]) -> Result<(), String> {
    let max_year = MAX_CALENDAR_YEAR + MAX_LOAN_PERIOD as i32 + MAX_COURSE_LENGTH as i32;
    let years_in_range = |year: i32| (MIN_CALENDAR_YEAR..=max_year).contains(&year);
    for (index, row) in rows.iter().enumerate() {
        let graduating_year_ok = row
            .as_repayment()
            .is_none_or(|row| years_in_range(row.graduating_year));
        if !years_in_range(row.calendar_year()) || !graduating_year_ok {
            return Err(format!(
                "rows[{index}] years must be between {MIN_CALENDAR_YEAR} and {max_year}"
            ));
        }
    }
    Ok(())
}

fn request_from_payload(payload: ProjectPayload, today: i32) -> Result<ProjectionRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.plan {
        cli.plan = v.into();
    }
    if let Some(v) = payload.student {
        cli.student = v.into();
    }
    if let Some(v) = payload.reference_year {
        cli.reference_year = Some(v);
    }

    if let Some(v) = payload.salary {
        cli.salary = v;
    }
    if let Some(v) = payload.salary_growth {
        cli.salary_growth = v;
    }
    if let Some(v) = payload.threshold_growth {
        cli.threshold_growth = v;
    }
    if let Some(v) = payload.average_interest_rate {
        cli.average_interest_rate = v;
    }

    if let Some(v) = payload.loan_period {
        cli.loan_period = Some(v);
    }
    if let Some(v) = payload.repayment_threshold {
        cli.repayment_threshold = Some(v);
    }
    if let Some(v) = payload.income_share {
        cli.income_share = Some(v);
    }
    if let Some(v) = payload.plan_interest_rate {
        cli.plan_interest_rate = Some(v);
    }

    if let Some(v) = payload.graduating_year {
        cli.graduating_year = Some(v);
    }
    if let Some(v) = payload.current_loan_balance {
        cli.current_loan_balance = v;
    }

    if let Some(v) = payload.course_start_year {
        cli.course_start_year = Some(v);
    }
    if let Some(v) = payload.course_length {
        cli.course_length = v;
    }
    if let Some(v) = payload.yearly_maintenance {
        cli.yearly_maintenance = v;
    }
    if let Some(v) = payload.yearly_tuition {
        cli.yearly_tuition = v;
    }

    build_request(cli, today)
}

fn default_cli_for_api() -> Cli {
    Cli {
        plan: CliPlan::Plan2,
        student: CliStudentType::Graduate,
        reference_year: None,
        salary: 30_000.0,
        salary_growth: 5.0,
        threshold_growth: 4.0,
        average_interest_rate: 3.0,
        loan_period: None,
        repayment_threshold: None,
        income_share: None,
        plan_interest_rate: None,
        graduating_year: None,
        current_loan_balance: 0.0,
        course_start_year: None,
        course_length: 3,
        yearly_maintenance: 0.0,
        yearly_tuition: 9_250.0,
    }
}
