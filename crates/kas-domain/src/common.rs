//! Primitive aliases and helpers shared by kiosk ledger entities.

/// Monetary amount in the smallest Rupiah unit. There are no fractional units.
pub type Rupiah = i64;

/// Lowercases `value` and strips every character that is not alphanumeric.
///
/// Used wherever counterparty names are compared across submissions.
pub fn normalize_name(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::normalize_name;

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize_name("  Budi S. (BCA) "), "budisbca");
        assert_eq!(normalize_name("SITI-aminah"), "sitiaminah");
        assert_eq!(normalize_name("***"), "");
    }
}
