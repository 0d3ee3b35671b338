//! Fee accounting.
//!
//! Payment is all-or-nothing at deliverable approval: the escrowed budget
//! splits into the platform fee and the worker amount, exactly, with no
//! partial or proportional paths.

/// Platform fee: 1% of the budget, floored.
pub fn platform_fee(budget: u64) -> u64 {
    budget / 100
}

/// Split a budget into (worker_amount, fee). `worker_amount + fee` always
/// equals the budget.
pub fn split_budget(budget: u64) -> (u64, u64) {
    let fee = platform_fee(budget);
    (budget - fee, fee)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_is_floored_one_percent() {
        assert_eq!(platform_fee(10_000), 100);
        assert_eq!(platform_fee(199), 1);
        assert_eq!(platform_fee(99), 0);
        assert_eq!(platform_fee(0), 0);
    }

    #[test]
    fn split_always_sums_to_budget() {
        for budget in [1u64, 99, 100, 101, 9_999, 10_000, 123_456_789] {
            let (worker_amount, fee) = split_budget(budget);
            assert_eq!(worker_amount + fee, budget);
            assert_eq!(fee, budget / 100);
        }
    }
}
