use crate::config::CommissionConfig;
use crate::entities::restaurant_entity as restaurants;
use crate::error::{AppError, AppResult};
use rust_decimal::prelude::*;

const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// `round(total * rate / 100, 2)`, midpoint away from zero.
pub fn calculate_commission(total: Decimal, rate_percent: Decimal) -> Decimal {
    (total * rate_percent / ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn cents_to_decimal(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

pub fn decimal_to_cents(amount: Decimal) -> AppResult<i64> {
    let mut scaled = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    scaled.rescale(2);
    i64::try_from(scaled.mantissa())
        .map_err(|_| AppError::InternalError(format!("amount out of range: {amount}")))
}

/// 700 bp -> 7.00 %
pub fn bp_to_percent(rate_bp: i32) -> Decimal {
    Decimal::new(rate_bp as i64, 2)
}

pub fn percent_to_bp(rate_percent: Decimal) -> AppResult<i32> {
    (rate_percent * ONE_HUNDRED)
        .round()
        .to_i32()
        .ok_or_else(|| AppError::ConfigError(format!("commission rate out of range: {rate_percent}")))
}

pub fn commission_cents(total_cents: i64, rate_bp: i32) -> AppResult<i64> {
    decimal_to_cents(calculate_commission(
        cents_to_decimal(total_cents),
        bp_to_percent(rate_bp),
    ))
}

/// Resolves the rate that applies to a restaurant.
#[derive(Clone, Debug)]
pub struct CommissionEngine {
    default_rate_percent: Decimal,
}

impl CommissionEngine {
    pub fn new(config: &CommissionConfig) -> Self {
        Self {
            default_rate_percent: config.default_rate_percent,
        }
    }

    pub fn default_rate_percent(&self) -> Decimal {
        self.default_rate_percent
    }

    /// 餐厅有非零的覆盖费率时使用覆盖值，否则使用全局默认
    pub fn rate_for(&self, restaurant: Option<&restaurants::Model>) -> Decimal {
        match restaurant.and_then(|r| r.commission_rate_bp) {
            Some(bp) if bp != 0 => bp_to_percent(bp),
            _ => self.default_rate_percent,
        }
    }

    pub fn rate_bp_for(&self, restaurant: Option<&restaurants::Model>) -> AppResult<i32> {
        percent_to_bp(self.rate_for(restaurant))
    }
}
