//! Gas accounting.

use crate::error::StateError;

/// Scalar gas amount.
pub type GasUnit = u64;

/// A gas meter.
///
/// A meter without a limit never runs out; it is what genesis and the block
/// hooks run with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GasMeter {
    limit: Option<GasUnit>,
    consumed: GasUnit,
}

impl GasMeter {
    /// Creates a meter that fails once `limit` is exceeded.
    pub const fn new(limit: GasUnit) -> Self {
        Self {
            limit: Some(limit),
            consumed: 0,
        }
    }

    /// Creates a meter without a limit.
    pub const fn infinite() -> Self {
        Self {
            limit: None,
            consumed: 0,
        }
    }

    /// Returns the limit, or `None` for an infinite meter.
    pub const fn limit(&self) -> Option<GasUnit> {
        self.limit
    }

    /// Returns the total gas incurred, which can exceed the limit after a
    /// failed charge.
    pub const fn consumed(&self) -> GasUnit {
        self.consumed
    }

    /// Returns the gas consumed, capped at the limit.
    pub fn consumed_to_limit(&self) -> GasUnit {
        match self.limit {
            Some(limit) => self.consumed.min(limit),
            None => self.consumed,
        }
    }

    /// Returns the gas left before the meter runs out.
    pub fn remaining(&self) -> GasUnit {
        match self.limit {
            Some(limit) => limit.saturating_sub(self.consumed),
            None => GasUnit::MAX,
        }
    }

    /// Returns `true` once consumption has gone past the limit.
    pub fn is_out_of_gas(&self) -> bool {
        matches!(self.limit, Some(limit) if self.consumed > limit)
    }

    /// Records `amount` of gas for `descriptor`.
    pub fn charge_gas(&mut self, amount: GasUnit, descriptor: &str) -> Result<(), StateError> {
        self.consumed = self.consumed.saturating_add(amount);

        match self.limit {
            Some(limit) if self.consumed > limit => Err(StateError::OutOfGas {
                descriptor: descriptor.to_owned(),
                limit,
                used: self.consumed,
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charges_until_limit() {
        let mut meter = GasMeter::new(100);
        meter.charge_gas(60, "first").unwrap();
        assert_eq!(meter.remaining(), 40);

        let err = meter.charge_gas(50, "second").unwrap_err();
        assert!(matches!(err, StateError::OutOfGas { used: 110, .. }));
        assert_eq!(meter.consumed_to_limit(), 100);
        assert!(meter.is_out_of_gas());
    }

    #[test]
    fn infinite_meter_never_fails() {
        let mut meter = GasMeter::infinite();
        meter.charge_gas(u64::MAX, "huge").unwrap();
        meter.charge_gas(1, "more").unwrap();
        assert_eq!(meter.remaining(), u64::MAX);
        assert!(!meter.is_out_of_gas());
    }
}
