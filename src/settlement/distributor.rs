use crate::types::balance::Balance;

/// Pro-rates win payouts when a batch collected less than its losses declared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LossDistributor {
    expected_collected: Balance,
    collected: Balance,
}

impl LossDistributor {
    pub fn new(expected_collected: Balance, collected: Balance) -> Self {
        LossDistributor {
            expected_collected,
            collected,
        }
    }

    pub fn expected_collected(&self) -> &Balance {
        &self.expected_collected
    }

    pub fn collected(&self) -> &Balance {
        &self.collected
    }

    pub fn needs_scaling(&self) -> bool {
        !self.expected_collected.is_zero() && self.collected != self.expected_collected
    }

    pub fn scale(&self, amount: &Balance) -> Balance {
        if !self.needs_scaling() {
            return amount.clone();
        }
        amount.mul_div_floor(&self.collected, &self.expected_collected)
    }

    // Flooring remainder of the batch total goes to the first request.
    pub fn distribute(&self, requested: &[Balance]) -> Vec<Balance> {
        let mut scaled: Vec<Balance> = requested.iter().map(|amount| self.scale(amount)).collect();
        if !self.needs_scaling() || scaled.is_empty() {
            return scaled;
        }

        let total_requested: Balance = requested.iter().sum();
        let target = self.scale(&total_requested);
        let paid: Balance = scaled.iter().sum();
        let remainder = target.saturating_sub(&paid);
        if !remainder.is_zero() {
            tracing::debug!(remainder = %remainder, "Assigning rounding remainder to first winner");
            scaled[0] += &remainder;
        }
        scaled
    }
}
