use std::collections::BTreeMap;

use super::error::{Result, SimulationError};
use super::types::ReturnSeries;

pub const CUSTOM_INDEX: &str = "custom";

/// Yearly inflation in percent.
pub trait InflationLookup {
    fn rate(&self, year: i32) -> Option<f64>;

    /// Known rates for `from..=to` in year order. Tables should override this
    /// so wide gaps are not walked year by year.
    fn rates_between(&self, from: i32, to: i32) -> Vec<(i32, f64)> {
        (from..=to)
            .filter_map(|year| self.rate(year).map(|rate| (year, rate)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoInflation;

impl InflationLookup for NoInflation {
    fn rate(&self, _year: i32) -> Option<f64> {
        None
    }

    fn rates_between(&self, _from: i32, _to: i32) -> Vec<(i32, f64)> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InflationTable {
    rates: BTreeMap<i32, f64>,
}

impl InflationTable {
    pub fn new(rates: BTreeMap<i32, f64>) -> Self {
        Self {
            rates: rates.into_iter().filter(|(_, r)| r.is_finite()).collect(),
        }
    }
}

impl InflationLookup for InflationTable {
    fn rate(&self, year: i32) -> Option<f64> {
        self.rates.get(&year).copied()
    }

    fn rates_between(&self, from: i32, to: i32) -> Vec<(i32, f64)> {
        if from > to {
            return Vec::new();
        }
        self.rates
            .range(from..=to)
            .map(|(&year, &rate)| (year, rate))
            .collect()
    }
}

pub trait ReturnProvider {
    /// Returns for `index` restricted to `start_year..=end_year`, or `None`
    /// when the index is unknown.
    fn series(&self, index: &str, start_year: i32, end_year: i32) -> Option<Result<ReturnSeries>>;
}

/// Named year to return maps. User-entered returns live under [`CUSTOM_INDEX`].
#[derive(Debug, Clone, Default)]
pub struct ReturnLibrary {
    indices: BTreeMap<String, BTreeMap<i32, f64>>,
}

impl ReturnLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_custom(returns: BTreeMap<i32, f64>) -> Self {
        let mut library = Self::new();
        library.insert(CUSTOM_INDEX, returns);
        library
    }

    pub fn insert(&mut self, index: impl Into<String>, returns: BTreeMap<i32, f64>) {
        self.indices.insert(index.into(), returns);
    }

    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.indices.keys().map(String::as_str)
    }

    /// Full year span of an index.
    pub fn year_range(&self, index: &str) -> Option<(i32, i32)> {
        let returns = self.indices.get(index)?;
        let first = *returns.keys().next()?;
        let last = *returns.keys().next_back()?;
        Some((first, last))
    }

    pub fn require(&self, index: &str, start_year: i32, end_year: i32) -> Result<ReturnSeries> {
        self.series(index, start_year, end_year)
            .unwrap_or_else(|| {
                Err(SimulationError::UnknownIndex {
                    index: index.to_string(),
                })
            })
    }
}

impl ReturnProvider for ReturnLibrary {
    fn series(&self, index: &str, start_year: i32, end_year: i32) -> Option<Result<ReturnSeries>> {
        let returns = self.indices.get(index)?;
        if start_year > end_year {
            return Some(Err(SimulationError::InvalidYearRange {
                start: start_year,
                end: end_year,
            }));
        }
        let window = returns
            .range(start_year..=end_year)
            .map(|(&year, &pct)| (year, pct))
            .collect::<BTreeMap<_, _>>();
        Some(ReturnSeries::from_year_map(&window))
    }
}
