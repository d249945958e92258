use crate::error::ValidationError;
use bigdecimal::{BigDecimal, Zero};
use jiff::civil::Date;

/// Everything needed to split one bill. Construct with [`BillingInputs::new`], which rejects
/// values the calculation has no sensible answer for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingInputs {
    unit_rate: BigDecimal,
    standing_charge_daily: BigDecimal,
    bill_days: u32,
    total_kwh_usage: BigDecimal,
    device_kwh_usage: BigDecimal,
}

impl BillingInputs {
    pub fn new(
        unit_rate: BigDecimal,
        standing_charge_daily: BigDecimal,
        bill_days: u32,
        total_kwh_usage: BigDecimal,
        device_kwh_usage: BigDecimal,
    ) -> Result<Self, ValidationError> {
        ensure_non_negative("unit rate", &unit_rate)?;
        ensure_non_negative("standing charge", &standing_charge_daily)?;
        ensure_non_negative("total usage", &total_kwh_usage)?;
        ensure_non_negative("device usage", &device_kwh_usage)?;
        if bill_days == 0 {
            return Err(ValidationError::ZeroBillDays);
        }
        if device_kwh_usage > total_kwh_usage {
            return Err(ValidationError::DeviceUsageExceedsTotal {
                device: device_kwh_usage,
                total: total_kwh_usage,
            });
        }
        Ok(Self {
            unit_rate,
            standing_charge_daily,
            bill_days,
            total_kwh_usage,
            device_kwh_usage,
        })
    }
}

fn ensure_non_negative(field: &'static str, value: &BigDecimal) -> Result<(), ValidationError> {
    if *value < BigDecimal::zero() {
        return Err(ValidationError::Negative {
            field,
            value: value.clone(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostBreakdown {
    pub standing_charge_total: BigDecimal,
    pub energy_cost_total: BigDecimal,
    pub bill_total: BigDecimal,
    pub device_cost: BigDecimal,
    /// Not clamped: if the device cost ever exceeded the bill this goes negative.
    pub shared_cost: BigDecimal,
    /// The device owner: half the shared cost plus all of the device cost.
    pub party_a_pay: BigDecimal,
    pub party_b_pay: BigDecimal,
}

pub fn compute(inputs: &BillingInputs) -> CostBreakdown {
    let standing_charge_total = &inputs.standing_charge_daily * BigDecimal::from(inputs.bill_days);
    let energy_cost_total = &inputs.total_kwh_usage * &inputs.unit_rate;
    let bill_total = &standing_charge_total + &energy_cost_total;
    let device_cost = &inputs.device_kwh_usage * &inputs.unit_rate;
    let shared_cost = &bill_total - &device_cost;
    let half_shared = &shared_cost / BigDecimal::from(2);
    CostBreakdown {
        party_a_pay: &half_shared + &device_cost,
        party_b_pay: half_shared,
        standing_charge_total,
        energy_cost_total,
        bill_total,
        device_cost,
        shared_cost,
    }
}

/// An inclusive span of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: Date,
    end: Date,
}

impl DateRange {
    pub fn new(start: Date, end: Date) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::PeriodEndsBeforeStart { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Date {
        self.start
    }

    pub fn end(&self) -> Date {
        self.end
    }

    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days covered, counting both ends.
    pub fn days(&self) -> u32 {
        let span = self.end - self.start;
        // end >= start, so the day count is never negative
        span.get_days().unsigned_abs() + 1
    }
}
