use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Plan1,
    Plan2,
    Plan3,
    Plan4,
    Plan5,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanParameters {
    pub loan_period: u32,
    pub repayment_threshold: f64,
    pub income_percentage_taxed_over_threshold: f64,
    /// Statutory rate in percent.
    pub interest_rate: f64,
}

impl Plan {
    pub const ALL: [Plan; 5] = [Plan::Plan1, Plan::Plan2, Plan::Plan3, Plan::Plan4, Plan::Plan5];

    pub fn parameters(self) -> PlanParameters {
        match self {
            // Plan 1 loans taken out before September 2006 are instead wiped at age 65.
            Plan::Plan1 => PlanParameters {
                loan_period: 25,
                repayment_threshold: 22_015.0,
                income_percentage_taxed_over_threshold: 0.09,
                interest_rate: 5.5,
            },
            Plan::Plan2 => PlanParameters {
                loan_period: 30,
                repayment_threshold: 27_295.0,
                income_percentage_taxed_over_threshold: 0.09,
                interest_rate: 7.1,
            },
            Plan::Plan3 => PlanParameters {
                loan_period: 30,
                repayment_threshold: 21_000.0,
                income_percentage_taxed_over_threshold: 0.06,
                interest_rate: 7.1,
            },
            // Also wiped at 65 for 2006-07 or earlier loans, whichever comes first.
            Plan::Plan4 => PlanParameters {
                loan_period: 30,
                repayment_threshold: 27_660.0,
                income_percentage_taxed_over_threshold: 0.09,
                interest_rate: 5.5,
            },
            Plan::Plan5 => PlanParameters {
                loan_period: 40,
                repayment_threshold: 25_000.0,
                income_percentage_taxed_over_threshold: 0.09,
                interest_rate: 3.0,
            },
        }
    }
}
