/// The power-weighted median of `(price, power)` reports: the lowest price
/// at which the cumulative power reaches half of the total.
pub fn weighted_median(mut reports: Vec<(u128, i64)>) -> Option<u128> {
    reports.retain(|(_, power)| *power > 0);
    if reports.is_empty() {
        return None;
    }
    reports.sort_unstable();

    let total: i128 = reports.iter().map(|(_, power)| i128::from(*power)).sum();
    let mut cumulative: i128 = 0;
    for (price, power) in &reports {
        cumulative += i128::from(*power);
        if cumulative * 2 >= total {
            return Some(*price);
        }
    }
    reports.last().map(|(price, _)| *price)
}
