use tracing::{debug, info};

use super::regimes::RegimeConfig;
use super::types::{
    Contributions, Regime, RegimeConfigs, RegimeSeries, RegimeState, RegimeSummary, ReturnSeries,
    SimulationResult, YearStep, sanitize_amount,
};

const MONTHS: u32 = 12;

/// Per-regime trajectory while the year loop is running.
#[derive(Debug)]
struct RegimeTrack {
    config: RegimeConfig,
    state: RegimeState,
    wealth: Vec<f64>,
    annual_tax: Vec<f64>,
    cumulative_tax: Vec<f64>,
    carry_forward_loss: Vec<f64>,
}

impl RegimeTrack {
    fn new(config: RegimeConfig, start_capital: f64, years: usize) -> Self {
        let mut wealth = Vec::with_capacity(years + 1);
        wealth.push(start_capital);
        Self {
            config,
            state: RegimeState::new(start_capital),
            wealth,
            annual_tax: Vec::with_capacity(years),
            cumulative_tax: Vec::with_capacity(years),
            carry_forward_loss: Vec::with_capacity(years),
        }
    }

    fn advance(&mut self, year: i32, return_pct: f64, monthly_deposit: f64) {
        let step = grow_one_year(year, self.state.wealth, return_pct, monthly_deposit);
        let assessed = self.config.assess_year(&mut self.state, &step);
        let tax = assessed.max(0.0).min(step.wealth_after_return.max(0.0));

        self.state.wealth = step.wealth_after_return - tax;
        let cumulative = self.cumulative_tax.last().copied().unwrap_or(0.0) + tax;

        self.wealth.push(self.state.wealth);
        self.annual_tax.push(tax);
        self.cumulative_tax.push(cumulative);
        self.carry_forward_loss.push(self.state.carry_forward_loss);
    }

    fn into_series(self, total_contributed: f64, no_tax_final: Option<f64>) -> RegimeSeries {
        let regime = self.config.regime();
        let final_wealth = self.wealth.last().copied().unwrap_or(0.0);
        let total_tax = self.cumulative_tax.last().copied().unwrap_or(0.0);
        let wealth_gap_vs_no_tax = match (regime, no_tax_final) {
            (Regime::NoTax, _) | (_, None) => 0.0,
            (_, Some(reference)) => reference - final_wealth,
        };

        RegimeSeries {
            regime,
            wealth: self.wealth,
            annual_tax: self.annual_tax,
            cumulative_tax: self.cumulative_tax,
            carry_forward_loss: self.carry_forward_loss,
            summary: RegimeSummary {
                final_wealth,
                total_tax,
                total_contributed,
                wealth_gap_vs_no_tax,
            },
        }
    }
}

/// Applies one year of market return plus deposits to `prev_wealth`.
///
/// Without deposits the year compounds once. With deposits the year is split
/// into twelve monthly steps, each growing the balance and then adding the
/// deposit at month end.
pub fn grow_one_year(
    year: i32,
    prev_wealth: f64,
    return_pct: f64,
    monthly_deposit: f64,
) -> YearStep {
    let annual_factor = 1.0 + return_pct / 100.0;

    let wealth_after_return = if monthly_deposit <= 0.0 {
        prev_wealth * annual_factor
    } else {
        let monthly_factor = if annual_factor > 0.0 {
            annual_factor.powf(1.0 / MONTHS as f64)
        } else {
            0.0
        };
        let mut value = prev_wealth;
        for _ in 0..MONTHS {
            value = value * monthly_factor + monthly_deposit;
        }
        value
    };

    let deposited = monthly_deposit.max(0.0) * MONTHS as f64;
    YearStep {
        year,
        prev_wealth,
        wealth_after_return,
        return_amount: wealth_after_return - prev_wealth - deposited,
        deposited,
    }
}

/// Runs every regime over the same return series.
///
/// All regimes share the year index so results line up year by year. The
/// first wealth entry is the start capital; an empty series yields empty
/// yearly series.
pub fn run_simulation(
    start_capital: f64,
    returns: &ReturnSeries,
    configs: &RegimeConfigs,
    contributions: &Contributions,
) -> SimulationResult {
    let start_capital = sanitize_amount(start_capital);
    let years = returns.len();
    info!(
        years,
        first_year = ?returns.first_year(),
        last_year = ?returns.last_year(),
        start_capital,
        "running simulation"
    );

    let mut tracks = configs
        .variants()
        .into_iter()
        .map(|config| RegimeTrack::new(config, start_capital, years))
        .collect::<Vec<_>>();

    let mut total_contributed = 0.0;
    for point in returns.points() {
        let deposit = contributions.monthly_for(point.year);
        total_contributed += deposit * MONTHS as f64;
        for track in tracks.iter_mut() {
            track.advance(point.year, point.return_pct, deposit);
        }
        debug!(year = point.year, return_pct = point.return_pct, deposit, "year simulated");
    }

    let no_tax_final = tracks
        .iter()
        .find(|track| track.config.regime() == Regime::NoTax)
        .and_then(|track| track.wealth.last().copied());
    let regimes = tracks
        .into_iter()
        .map(|track| track.into_series(total_contributed, no_tax_final))
        .collect::<Vec<_>>();

    for series in &regimes {
        debug!(
            regime = ?series.regime,
            final_wealth = series.summary.final_wealth,
            total_tax = series.summary.total_tax,
            "regime finished"
        );
    }

    SimulationResult {
        start_capital,
        labels: axis_labels(returns),
        years: returns.years(),
        regimes,
    }
}

fn axis_labels(returns: &ReturnSeries) -> Vec<String> {
    std::iter::once("Start".to_string())
        .chain(returns.points().iter().map(|p| p.year.to_string()))
        .collect()
}
