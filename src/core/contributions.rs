use std::collections::BTreeMap;

use tracing::debug;

use super::sources::InflationLookup;
use super::types::{ContributionSchedule, sanitize_amount};

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Monthly deposit per year from `start_year` through `end_year` inclusive.
///
/// With `indexed` set, each year after the first grows the previous year's
/// (rounded) amount by that year's inflation; years without a rate keep the
/// previous amount.
pub fn build_contribution_schedule(
    base_monthly: f64,
    start_year: i32,
    end_year: i32,
    indexed: bool,
    inflation: &impl InflationLookup,
) -> ContributionSchedule {
    if end_year < start_year {
        return ContributionSchedule::default();
    }
    schedule_for_years(base_monthly, start_year..=end_year, indexed, inflation)
}

/// Same amounts as [`build_contribution_schedule`], but only for `years`.
///
/// Indexation still compounds over every year in a gap between two listed
/// years, using the inflation rates known inside that gap.
pub fn build_contribution_schedule_for_years(
    base_monthly: f64,
    years: &[i32],
    indexed: bool,
    inflation: &impl InflationLookup,
) -> ContributionSchedule {
    schedule_for_years(base_monthly, years.iter().copied(), indexed, inflation)
}

fn schedule_for_years(
    base_monthly: f64,
    years: impl IntoIterator<Item = i32>,
    indexed: bool,
    inflation: &impl InflationLookup,
) -> ContributionSchedule {
    let mut amount = round_cents(sanitize_amount(base_monthly));
    let mut by_year = BTreeMap::new();
    let mut previous: Option<i32> = None;

    for year in years {
        if let Some(prev) = previous {
            // prev < year, so prev + 1 cannot overflow.
            if indexed && year > prev {
                let rates = inflation.rates_between(prev + 1, year);
                if rates.is_empty() {
                    debug!(from = prev + 1, to = year, "no inflation rate, contribution kept flat");
                }
                for (_, rate) in rates {
                    amount = round_cents(sanitize_amount(amount * (1.0 + rate / 100.0)));
                }
            }
        }
        by_year.insert(year, amount);
        previous = Some(year);
    }

    ContributionSchedule::new(by_year)
}
