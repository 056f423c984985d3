use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{Result, SimulationError};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Regime {
    #[serde(alias = "noTax", alias = "no_tax")]
    NoTax,
    Old,
    Current,
    Future,
}

impl Regime {
    pub const ALL: [Regime; 4] = [Regime::NoTax, Regime::Old, Regime::Current, Regime::Future];
}

pub const SINGLE: f64 = 1.0;
pub const JOINT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoTaxConfig {
    pub partner_multiplier: f64,
}

impl Default for NoTaxConfig {
    fn default() -> Self {
        Self {
            partner_multiplier: SINGLE,
        }
    }
}

/// Deemed-return regime: a flat notional yield on wealth above one exemption.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OldConfig {
    pub exemption: f64,
    pub deemed_return_rate: f64,
    pub tax_rate: f64,
    pub partner_multiplier: f64,
}

impl Default for OldConfig {
    fn default() -> Self {
        Self {
            exemption: 21_139.0,
            deemed_return_rate: 4.0,
            tax_rate: 30.0,
            partner_multiplier: SINGLE,
        }
    }
}

/// Category-weighted deemed return. Weights describe how the portfolio splits
/// over savings, investments and debt; they are normalized before use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConfig {
    pub savings_weight: f64,
    pub invest_weight: f64,
    pub debt_weight: f64,
    pub savings_rate: f64,
    pub invest_rate: f64,
    pub debt_rate: f64,
    pub exemption: f64,
    pub debt_threshold: f64,
    pub tax_rate: f64,
    pub partner_multiplier: f64,
}

impl Default for CurrentConfig {
    fn default() -> Self {
        Self {
            savings_weight: 0.0,
            invest_weight: 100.0,
            debt_weight: 0.0,
            savings_rate: 1.44,
            invest_rate: 6.04,
            debt_rate: 2.61,
            exemption: 57_000.0,
            debt_threshold: 3_700.0,
            tax_rate: 36.0,
            partner_multiplier: SINGLE,
        }
    }
}

/// Actual-return regime with an income-side free amount and loss carry-forward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FutureConfig {
    pub free_return: f64,
    pub tax_rate: f64,
    pub loss_threshold: f64,
    pub partner_multiplier: f64,
}

impl Default for FutureConfig {
    fn default() -> Self {
        Self {
            free_return: 1_800.0,
            tax_rate: 36.0,
            loss_threshold: 500.0,
            partner_multiplier: SINGLE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeConfigs {
    pub no_tax: NoTaxConfig,
    pub old: OldConfig,
    pub current: CurrentConfig,
    pub future: FutureConfig,
}

impl RegimeConfigs {
    pub fn with_partner_multiplier(mut self, multiplier: f64) -> Self {
        let multiplier = pick_partner("partnerMultiplier", Some(multiplier), SINGLE);
        self.no_tax.partner_multiplier = multiplier;
        self.old.partner_multiplier = multiplier;
        self.current.partner_multiplier = multiplier;
        self.future.partner_multiplier = multiplier;
        self
    }
}

pub fn get_default_configs() -> RegimeConfigs {
    RegimeConfigs::default()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NoTaxOverrides {
    pub partner_multiplier: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OldOverrides {
    pub exemption: Option<f64>,
    pub deemed_return_rate: Option<f64>,
    pub tax_rate: Option<f64>,
    pub partner_multiplier: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CurrentOverrides {
    pub savings_weight: Option<f64>,
    pub invest_weight: Option<f64>,
    pub debt_weight: Option<f64>,
    pub savings_rate: Option<f64>,
    pub invest_rate: Option<f64>,
    pub debt_rate: Option<f64>,
    pub exemption: Option<f64>,
    pub debt_threshold: Option<f64>,
    pub tax_rate: Option<f64>,
    pub partner_multiplier: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FutureOverrides {
    pub free_return: Option<f64>,
    pub tax_rate: Option<f64>,
    pub loss_threshold: Option<f64>,
    pub partner_multiplier: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigOverrides {
    pub no_tax: NoTaxOverrides,
    pub old: OldOverrides,
    pub current: CurrentOverrides,
    pub future: FutureOverrides,
}

impl NoTaxOverrides {
    pub fn apply(&self, base: NoTaxConfig) -> NoTaxConfig {
        NoTaxConfig {
            partner_multiplier: pick_partner(
                "noTax.partnerMultiplier",
                self.partner_multiplier,
                base.partner_multiplier,
            ),
        }
    }
}

impl OldOverrides {
    pub fn apply(&self, base: OldConfig) -> OldConfig {
        OldConfig {
            exemption: pick_amount("old.exemption", self.exemption, base.exemption),
            deemed_return_rate: pick_amount(
                "old.deemedReturnRate",
                self.deemed_return_rate,
                base.deemed_return_rate,
            ),
            tax_rate: pick_amount("old.taxRate", self.tax_rate, base.tax_rate),
            partner_multiplier: pick_partner(
                "old.partnerMultiplier",
                self.partner_multiplier,
                base.partner_multiplier,
            ),
        }
    }
}

impl CurrentOverrides {
    pub fn apply(&self, base: CurrentConfig) -> CurrentConfig {
        CurrentConfig {
            savings_weight: pick_weight(
                "current.savingsWeight",
                self.savings_weight,
                base.savings_weight,
            ),
            invest_weight: pick_weight(
                "current.investWeight",
                self.invest_weight,
                base.invest_weight,
            ),
            debt_weight: pick_weight("current.debtWeight", self.debt_weight, base.debt_weight),
            savings_rate: pick_amount(
                "current.savingsRate",
                self.savings_rate,
                base.savings_rate,
            ),
            invest_rate: pick_amount("current.investRate", self.invest_rate, base.invest_rate),
            debt_rate: pick_amount("current.debtRate", self.debt_rate, base.debt_rate),
            exemption: pick_amount("current.exemption", self.exemption, base.exemption),
            debt_threshold: pick_amount(
                "current.debtThreshold",
                self.debt_threshold,
                base.debt_threshold,
            ),
            tax_rate: pick_amount("current.taxRate", self.tax_rate, base.tax_rate),
            partner_multiplier: pick_partner(
                "current.partnerMultiplier",
                self.partner_multiplier,
                base.partner_multiplier,
            ),
        }
    }
}

impl FutureOverrides {
    pub fn apply(&self, base: FutureConfig) -> FutureConfig {
        FutureConfig {
            free_return: pick_amount("future.freeReturn", self.free_return, base.free_return),
            tax_rate: pick_amount("future.taxRate", self.tax_rate, base.tax_rate),
            loss_threshold: pick_amount(
                "future.lossThreshold",
                self.loss_threshold,
                base.loss_threshold,
            ),
            partner_multiplier: pick_partner(
                "future.partnerMultiplier",
                self.partner_multiplier,
                base.partner_multiplier,
            ),
        }
    }
}

impl ConfigOverrides {
    pub fn apply(&self, base: RegimeConfigs) -> RegimeConfigs {
        RegimeConfigs {
            no_tax: self.no_tax.apply(base.no_tax),
            old: self.old.apply(base.old),
            current: self.current.apply(base.current),
            future: self.future.apply(base.future),
        }
    }
}

fn pick_amount(field: &'static str, value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        Some(v) => {
            debug!(field, value = v, "rejected config override, keeping default");
            default
        }
        None => default,
    }
}

fn pick_weight(field: &'static str, value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        Some(v) => {
            debug!(field, value = v, "rejected config override, keeping default");
            default
        }
        None => default,
    }
}

fn pick_partner(field: &'static str, value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v == SINGLE || v == JOINT => v,
        Some(v) => {
            debug!(field, value = v, "partner multiplier must be 1 or 2, keeping default");
            default
        }
        None => default,
    }
}

/// Clamps a money amount to a finite, non-negative value.
pub(crate) fn sanitize_amount(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnPoint {
    pub year: i32,
    pub return_pct: f64,
}

/// Annual returns in percent, strictly increasing by year.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ReturnSeries {
    points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    pub fn new(points: Vec<ReturnPoint>) -> Result<Self> {
        for (idx, point) in points.iter().enumerate() {
            if !point.return_pct.is_finite() {
                return Err(SimulationError::NonFiniteReturn { year: point.year });
            }
            if idx == 0 {
                continue;
            }
            let previous = points[idx - 1].year;
            if point.year == previous {
                return Err(SimulationError::DuplicateYear { year: point.year });
            }
            if point.year < previous {
                return Err(SimulationError::UnorderedYears {
                    previous,
                    year: point.year,
                });
            }
        }
        Ok(Self { points })
    }

    pub fn from_year_map(returns: &BTreeMap<i32, f64>) -> Result<Self> {
        Self::new(
            returns
                .iter()
                .map(|(&year, &return_pct)| ReturnPoint { year, return_pct })
                .collect(),
        )
    }

    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn years(&self) -> Vec<i32> {
        self.points.iter().map(|p| p.year).collect()
    }

    pub fn first_year(&self) -> Option<i32> {
        self.points.first().map(|p| p.year)
    }

    pub fn last_year(&self) -> Option<i32> {
        self.points.last().map(|p| p.year)
    }
}

/// Monthly deposit per calendar year.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ContributionSchedule(BTreeMap<i32, f64>);

impl ContributionSchedule {
    pub fn new(by_year: BTreeMap<i32, f64>) -> Self {
        Self(
            by_year
                .into_iter()
                .map(|(year, amount)| (year, sanitize_amount(amount)))
                .collect(),
        )
    }

    pub fn get(&self, year: i32) -> f64 {
        self.0.get(&year).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.0.iter().map(|(&year, &amount)| (year, amount))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Contributions {
    Flat(f64),
    ByYear(ContributionSchedule),
}

impl Default for Contributions {
    fn default() -> Self {
        Contributions::Flat(0.0)
    }
}

impl From<ContributionSchedule> for Contributions {
    fn from(schedule: ContributionSchedule) -> Self {
        Contributions::ByYear(schedule)
    }
}

impl Contributions {
    pub fn monthly_for(&self, year: i32) -> f64 {
        match self {
            Contributions::Flat(amount) => sanitize_amount(*amount),
            Contributions::ByYear(schedule) => schedule.get(year),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeState {
    pub wealth: f64,
    pub carry_forward_loss: f64,
}

impl RegimeState {
    pub fn new(start_capital: f64) -> Self {
        Self {
            wealth: start_capital,
            carry_forward_loss: 0.0,
        }
    }
}

/// Growth outcome of one simulated year, shared by every regime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearStep {
    pub year: i32,
    pub prev_wealth: f64,
    pub wealth_after_return: f64,
    pub return_amount: f64,
    pub deposited: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeSummary {
    pub final_wealth: f64,
    pub total_tax: f64,
    pub total_contributed: f64,
    pub wealth_gap_vs_no_tax: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeSeries {
    pub regime: Regime,
    pub wealth: Vec<f64>,
    pub annual_tax: Vec<f64>,
    pub cumulative_tax: Vec<f64>,
    pub carry_forward_loss: Vec<f64>,
    pub summary: RegimeSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub start_capital: f64,
    pub labels: Vec<String>,
    pub years: Vec<i32>,
    pub regimes: Vec<RegimeSeries>,
}

impl SimulationResult {
    pub fn regime(&self, regime: Regime) -> Option<&RegimeSeries> {
        self.regimes.iter().find(|series| series.regime == regime)
    }
}
