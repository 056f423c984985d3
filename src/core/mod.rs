mod contributions;
mod engine;
mod error;
mod regimes;
mod sources;
mod types;

pub use contributions::{build_contribution_schedule, build_contribution_schedule_for_years};
pub use engine::{grow_one_year, run_simulation};
pub use error::{Result, SimulationError};
pub use regimes::{
    RegimeConfig, calc_current_system, calc_future_income, calc_future_system, calc_no_tax,
    calc_old_system,
};
pub use sources::{
    CUSTOM_INDEX, InflationLookup, InflationTable, NoInflation, ReturnLibrary, ReturnProvider,
};
pub use types::{
    ConfigOverrides, ContributionSchedule, Contributions, CurrentConfig, CurrentOverrides,
    FutureConfig, FutureOverrides, JOINT, NoTaxConfig, NoTaxOverrides, OldConfig, OldOverrides,
    Regime, RegimeConfigs, RegimeSeries, RegimeState, RegimeSummary, ReturnPoint, ReturnSeries,
    SINGLE, SimulationResult, YearStep, get_default_configs,
};
