use super::types::{
    CurrentConfig, FutureConfig, NoTaxConfig, OldConfig, Regime, RegimeConfigs, RegimeState,
    YearStep,
};

fn pct(rate: f64) -> f64 {
    rate / 100.0
}

pub fn calc_no_tax() -> f64 {
    0.0
}

/// Flat deemed return on wealth above the exemption.
pub fn calc_old_system(wealth: f64, _return_amount: f64, config: &OldConfig) -> f64 {
    let taxable_wealth = (wealth - config.exemption * config.partner_multiplier).max(0.0);
    taxable_wealth * pct(config.deemed_return_rate) * pct(config.tax_rate)
}

/// Category-weighted deemed return with debt deduction. The exemption reduces
/// the taxed share of the notional return proportionally rather than the base.
pub fn calc_current_system(wealth: f64, _return_amount: f64, config: &CurrentConfig) -> f64 {
    let savings_weight = config.savings_weight.max(0.0);
    let invest_weight = config.invest_weight.max(0.0);
    let debt_weight = config.debt_weight.max(0.0);
    let total_weight = savings_weight + invest_weight + debt_weight;
    if total_weight <= 0.0 {
        return 0.0;
    }

    let savings = wealth * savings_weight / total_weight;
    let invest = wealth * invest_weight / total_weight;
    let debt = wealth * debt_weight / total_weight;

    let deductible_debt = (debt - config.debt_threshold * config.partner_multiplier).max(0.0);

    let notional_return = savings * pct(config.savings_rate) + invest * pct(config.invest_rate)
        - deductible_debt * pct(config.debt_rate);
    if notional_return <= 0.0 {
        return 0.0;
    }

    let notional_base = savings + invest - deductible_debt;
    if notional_base <= 0.0 {
        return 0.0;
    }

    let exempt_base = (notional_base - config.exemption * config.partner_multiplier).max(0.0);
    let share = (exempt_base / notional_base).min(1.0);

    notional_return * share * pct(config.tax_rate)
}

/// Income after the free amount. Losses pass through unchanged.
pub fn calc_future_income(return_amount: f64, config: &FutureConfig) -> f64 {
    if return_amount <= 0.0 {
        return return_amount;
    }
    (return_amount - config.free_return * config.partner_multiplier).max(0.0)
}

pub fn calc_future_system(taxable_income: f64, config: &FutureConfig) -> f64 {
    taxable_income.max(0.0) * pct(config.tax_rate)
}

/// One regime with its resolved configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegimeConfig {
    NoTax(NoTaxConfig),
    Old(OldConfig),
    Current(CurrentConfig),
    Future(FutureConfig),
}

impl RegimeConfig {
    pub fn regime(&self) -> Regime {
        match self {
            RegimeConfig::NoTax(_) => Regime::NoTax,
            RegimeConfig::Old(_) => Regime::Old,
            RegimeConfig::Current(_) => Regime::Current,
            RegimeConfig::Future(_) => Regime::Future,
        }
    }

    /// Tax due for the year before clamping. Updates the carried loss for the
    /// actual-return regime; the other regimes leave `state` untouched.
    pub fn assess_year(&self, state: &mut RegimeState, step: &YearStep) -> f64 {
        match self {
            RegimeConfig::NoTax(_) => calc_no_tax(),
            // Deemed-return regimes assess wealth at the start of the year.
            RegimeConfig::Old(config) => {
                calc_old_system(step.prev_wealth, step.return_amount, config)
            }
            RegimeConfig::Current(config) => {
                calc_current_system(step.prev_wealth, step.return_amount, config)
            }
            RegimeConfig::Future(config) => assess_future_year(state, step.return_amount, config),
        }
    }
}

fn assess_future_year(state: &mut RegimeState, return_amount: f64, config: &FutureConfig) -> f64 {
    let income = calc_future_income(return_amount, config);

    if income < 0.0 {
        let loss = income.abs();
        // Losses at or below the threshold are not banked.
        if loss > config.loss_threshold * config.partner_multiplier {
            state.carry_forward_loss += loss;
        }
        return 0.0;
    }
    if income == 0.0 {
        return 0.0;
    }

    let setoff = state.carry_forward_loss.min(income);
    state.carry_forward_loss -= setoff;
    calc_future_system(income - setoff, config)
}

impl RegimeConfigs {
    pub fn variants(&self) -> [RegimeConfig; 4] {
        [
            RegimeConfig::NoTax(self.no_tax),
            RegimeConfig::Old(self.old),
            RegimeConfig::Current(self.current),
            RegimeConfig::Future(self.future),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{JOINT, get_default_configs};
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    fn step(prev_wealth: f64, return_amount: f64) -> YearStep {
        YearStep {
            year: 2000,
            prev_wealth,
            wealth_after_return: prev_wealth + return_amount,
            return_amount,
            deposited: 0.0,
        }
    }

    #[test]
    fn no_tax_is_always_zero() {
        assert_eq!(calc_no_tax(), 0.0);
        let mut state = RegimeState::new(1_000_000.0);
        let regime = RegimeConfig::NoTax(NoTaxConfig::default());
        assert_eq!(regime.assess_year(&mut state, &step(1_000_000.0, 250_000.0)), 0.0);
    }

    #[test]
    fn old_system_taxes_deemed_return_above_exemption() {
        let config = OldConfig {
            exemption: 20_000.0,
            deemed_return_rate: 4.0,
            tax_rate: 30.0,
            partner_multiplier: 1.0,
        };
        assert_approx(calc_old_system(120_000.0, 0.0, &config), 100_000.0 * 0.04 * 0.30);
        assert_eq!(calc_old_system(15_000.0, 0.0, &config), 0.0);
        assert_eq!(calc_old_system(-5_000.0, 0.0, &config), 0.0);
    }

    #[test]
    fn old_system_ignores_actual_return() {
        let config = OldConfig::default();
        assert_eq!(
            calc_old_system(200_000.0, -50_000.0, &config),
            calc_old_system(200_000.0, 90_000.0, &config)
        );
    }

    #[test]
    fn current_system_full_investment_allocation() {
        let config = CurrentConfig {
            exemption: 50_000.0,
            ..CurrentConfig::default()
        };
        // 200k invested: notional 200k * 6.04%, taxed share 150k/200k.
        let expected = 200_000.0 * 0.0604 * (150_000.0 / 200_000.0) * 0.36;
        assert_approx(calc_current_system(200_000.0, 0.0, &config), expected);
    }

    #[test]
    fn current_system_deducts_debt_above_threshold() {
        let config = CurrentConfig {
            savings_weight: 20.0,
            invest_weight: 70.0,
            debt_weight: 10.0,
            savings_rate: 1.0,
            invest_rate: 6.0,
            debt_rate: 3.0,
            exemption: 50_000.0,
            debt_threshold: 4_000.0,
            tax_rate: 36.0,
            partner_multiplier: 1.0,
        };
        let wealth = 300_000.0;
        let savings = 60_000.0;
        let invest = 210_000.0;
        let deductible_debt = 30_000.0 - 4_000.0;
        let notional = savings * 0.01 + invest * 0.06 - deductible_debt * 0.03;
        let base = savings + invest - deductible_debt;
        let expected = notional * ((base - 50_000.0) / base) * 0.36;
        assert_approx(calc_current_system(wealth, 0.0, &config), expected);
    }

    #[test]
    fn current_system_zero_for_non_positive_weights() {
        let config = CurrentConfig {
            savings_weight: 0.0,
            invest_weight: -10.0,
            debt_weight: 0.0,
            ..CurrentConfig::default()
        };
        assert_eq!(calc_current_system(500_000.0, 0.0, &config), 0.0);
    }

    #[test]
    fn current_system_zero_when_debt_dominates() {
        let config = CurrentConfig {
            savings_weight: 10.0,
            invest_weight: 0.0,
            debt_weight: 90.0,
            debt_threshold: 0.0,
            ..CurrentConfig::default()
        };
        assert_eq!(calc_current_system(400_000.0, 0.0, &config), 0.0);
    }

    #[test]
    fn current_system_zero_below_exemption() {
        let config = CurrentConfig::default();
        assert_eq!(calc_current_system(40_000.0, 0.0, &config), 0.0);
    }

    #[test]
    fn future_income_passes_losses_through() {
        let config = FutureConfig::default();
        assert_eq!(calc_future_income(-12_345.0, &config), -12_345.0);
        assert_eq!(calc_future_income(0.0, &config), 0.0);
        assert_eq!(calc_future_income(1_000.0, &config), 0.0);
        assert_approx(calc_future_income(20_000.0, &config), 18_200.0);
    }

    #[test]
    fn future_system_taxes_positive_income_only() {
        let config = FutureConfig::default();
        assert_approx(calc_future_system(18_200.0, &config), 6_552.0);
        assert_eq!(calc_future_system(-500.0, &config), 0.0);
    }

    #[test]
    fn future_loss_is_banked_only_above_threshold() {
        let config = FutureConfig::default();
        let regime = RegimeConfig::Future(config);

        let mut state = RegimeState::new(10_000.0);
        assert_eq!(regime.assess_year(&mut state, &step(10_000.0, -500.0)), 0.0);
        assert_eq!(state.carry_forward_loss, 0.0);

        assert_eq!(regime.assess_year(&mut state, &step(10_000.0, -500.01)), 0.0);
        assert_approx(state.carry_forward_loss, 500.01);
    }

    #[test]
    fn future_partner_doubles_free_return() {
        let joint = FutureConfig {
            partner_multiplier: JOINT,
            ..FutureConfig::default()
        };
        assert_approx(calc_future_income(20_000.0, &joint), 16_400.0);
        assert_eq!(calc_future_income(3_600.0, &joint), 0.0);
        assert_eq!(calc_future_income(-800.0, &joint), -800.0);
    }

    #[test]
    fn future_partner_doubles_loss_threshold() {
        let joint = FutureConfig {
            partner_multiplier: JOINT,
            ..FutureConfig::default()
        };
        let regime = RegimeConfig::Future(joint);

        // Above the single threshold but not the joint one.
        let mut state = RegimeState::new(10_000.0);
        assert_eq!(regime.assess_year(&mut state, &step(10_000.0, -800.0)), 0.0);
        assert_eq!(state.carry_forward_loss, 0.0);

        assert_eq!(regime.assess_year(&mut state, &step(10_000.0, -1_000.0)), 0.0);
        assert_eq!(state.carry_forward_loss, 0.0);

        assert_eq!(regime.assess_year(&mut state, &step(10_000.0, -1_000.01)), 0.0);
        assert_approx(state.carry_forward_loss, 1_000.01);

        // 20_000 return -> 16_400 income -> 15_399.99 after set-off.
        let tax = regime.assess_year(&mut state, &step(10_000.0, 20_000.0));
        assert_approx(tax, 15_399.99 * 0.36);
        assert_eq!(state.carry_forward_loss, 0.0);
    }

    #[test]
    fn future_carried_loss_offsets_later_income() {
        let config = FutureConfig::default();
        let regime = RegimeConfig::Future(config);
        let mut state = RegimeState {
            wealth: 100_000.0,
            carry_forward_loss: 5_000.0,
        };

        // 10_000 return -> 8_200 income -> 3_200 after set-off.
        let tax = regime.assess_year(&mut state, &step(100_000.0, 10_000.0));
        assert_approx(tax, 3_200.0 * 0.36);
        assert_eq!(state.carry_forward_loss, 0.0);

        let mut state = RegimeState {
            wealth: 100_000.0,
            carry_forward_loss: 20_000.0,
        };
        let tax = regime.assess_year(&mut state, &step(100_000.0, 10_000.0));
        assert_eq!(tax, 0.0);
        assert_approx(state.carry_forward_loss, 11_800.0);
    }

    #[test]
    fn future_income_within_free_amount_leaves_state_alone() {
        let regime = RegimeConfig::Future(FutureConfig::default());
        let mut state = RegimeState {
            wealth: 50_000.0,
            carry_forward_loss: 700.0,
        };
        assert_eq!(regime.assess_year(&mut state, &step(50_000.0, 1_500.0)), 0.0);
        assert_eq!(state.carry_forward_loss, 700.0);
    }

    #[test]
    fn deemed_regimes_assess_start_of_year_wealth() {
        let configs = get_default_configs();
        let old = RegimeConfig::Old(configs.old);
        let mut state = RegimeState::new(100_000.0);
        let year = YearStep {
            year: 2000,
            prev_wealth: 100_000.0,
            wealth_after_return: 500_000.0,
            return_amount: 400_000.0,
            deposited: 0.0,
        };
        assert_approx(
            old.assess_year(&mut state, &year),
            calc_old_system(100_000.0, 0.0, &configs.old),
        );
    }

    #[test]
    fn variants_cover_every_regime_in_order() {
        let tags = get_default_configs()
            .variants()
            .iter()
            .map(RegimeConfig::regime)
            .collect::<Vec<_>>();
        assert_eq!(tags, Regime::ALL.to_vec());
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_calculators_are_pure_and_non_negative(
            wealth in -1_000_000.0f64..5_000_000.0,
            return_amount in -500_000.0f64..500_000.0,
        ) {
            let configs = get_default_configs();
            let before = configs;

            let old = calc_old_system(wealth, return_amount, &configs.old);
            let current = calc_current_system(wealth, return_amount, &configs.current);
            let income = calc_future_income(return_amount, &configs.future);
            let future = calc_future_system(income, &configs.future);

            prop_assert!(old >= 0.0);
            prop_assert!(current >= 0.0);
            prop_assert!(future >= 0.0);
            prop_assert_eq!(old, calc_old_system(wealth, return_amount, &configs.old));
            prop_assert_eq!(current, calc_current_system(wealth, return_amount, &configs.current));
            prop_assert_eq!(future, calc_future_system(income, &configs.future));
            prop_assert_eq!(configs, before);
        }

        #[test]
        fn prop_partner_multiplier_doubles_exemption_terms(
            wealth in 0.0f64..3_000_000.0,
            exemption in 0.0f64..100_000.0,
            debt_threshold in 0.0f64..20_000.0,
        ) {
            let single_old = OldConfig { exemption, ..OldConfig::default() };
            let joint_old = OldConfig { partner_multiplier: JOINT, ..single_old };
            let doubled_old = OldConfig { exemption: exemption * 2.0, ..single_old };
            let joint = calc_old_system(wealth, 0.0, &joint_old);
            let doubled = calc_old_system(wealth, 0.0, &doubled_old);
            prop_assert!((joint - doubled).abs() <= 1e-9 * doubled.abs().max(1.0));

            let single_current = CurrentConfig {
                savings_weight: 30.0,
                invest_weight: 60.0,
                debt_weight: 10.0,
                exemption,
                debt_threshold,
                ..CurrentConfig::default()
            };
            let joint_current = CurrentConfig { partner_multiplier: JOINT, ..single_current };
            let doubled_current = CurrentConfig {
                exemption: exemption * 2.0,
                debt_threshold: debt_threshold * 2.0,
                ..single_current
            };
            let joint = calc_current_system(wealth, 0.0, &joint_current);
            let doubled = calc_current_system(wealth, 0.0, &doubled_current);
            prop_assert!((joint - doubled).abs() <= 1e-9 * doubled.abs().max(1.0));
        }
    }
}
