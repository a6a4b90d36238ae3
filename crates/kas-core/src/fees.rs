//! Service-fee suggestions keyed by transaction amount.
//!
//! Tables are pure step functions over inclusive ranges; amounts outside every tier
//! suggest no fee. The suggestion only pre-fills the form, the operator may override it.

use std::collections::HashMap;

use kas_domain::{Rupiah, TransactionKind};

use crate::CoreError;

/// Inclusive amount range mapped to a fixed fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeTier {
    pub min: Rupiah,
    pub max: Rupiah,
    pub fee: Rupiah,
}

impl FeeTier {
    pub const fn new(min: Rupiah, max: Rupiah, fee: Rupiah) -> Self {
        Self { min, max, fee }
    }

    pub fn contains(&self, amount: Rupiah) -> bool {
        amount >= self.min && amount <= self.max
    }
}

const TRANSFER_TIERS: [FeeTier; 7] = [
    FeeTier::new(10_000, 39_999, 3_000),
    FeeTier::new(40_000, 999_999, 5_000),
    FeeTier::new(1_000_000, 1_999_999, 7_000),
    FeeTier::new(2_000_000, 3_499_999, 10_000),
    FeeTier::new(3_500_000, 5_999_999, 15_000),
    FeeTier::new(6_000_000, 7_999_999, 20_000),
    FeeTier::new(8_000_000, 10_000_000, 25_000),
];

const WITHDRAWAL_TIERS: [FeeTier; 5] = [
    FeeTier::new(10_000, 999_999, 5_000),
    FeeTier::new(1_000_000, 1_999_999, 10_000),
    FeeTier::new(2_000_000, 2_999_999, 15_000),
    FeeTier::new(3_000_000, 4_999_999, 20_000),
    FeeTier::new(5_000_000, 10_000_000, 25_000),
];

const TOP_UP_TIERS: [FeeTier; 4] = [
    FeeTier::new(10_000, 99_999, 2_000),
    FeeTier::new(100_000, 499_999, 3_000),
    FeeTier::new(500_000, 999_999, 5_000),
    FeeTier::new(1_000_000, 5_000_000, 7_000),
];

const EMONEY_TOP_UP_TIERS: [FeeTier; 3] = [
    FeeTier::new(10_000, 99_999, 2_000),
    FeeTier::new(100_000, 499_999, 3_000),
    FeeTier::new(500_000, 1_000_000, 5_000),
];

/// Ordered, non-overlapping fee tiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeTable {
    tiers: Vec<FeeTier>,
}

impl FeeTable {
    /// Builds a table, rejecting empty ranges, negative values and overlapping tiers.
    pub fn new(mut tiers: Vec<FeeTier>) -> Result<Self, CoreError> {
        tiers.sort_by_key(|tier| tier.min);
        for tier in &tiers {
            if tier.min < 0 || tier.fee < 0 || tier.max < tier.min {
                return Err(CoreError::Validation(format!(
                    "invalid fee tier {}..={} -> {}",
                    tier.min, tier.max, tier.fee
                )));
            }
        }
        for pair in tiers.windows(2) {
            if pair[1].min <= pair[0].max {
                return Err(CoreError::Validation(format!(
                    "fee tiers {}..={} and {}..={} overlap",
                    pair[0].min, pair[0].max, pair[1].min, pair[1].max
                )));
            }
        }
        Ok(Self { tiers })
    }

    fn from_static(tiers: &[FeeTier]) -> Self {
        Self {
            tiers: tiers.to_vec(),
        }
    }

    pub fn transfer() -> Self {
        Self::from_static(&TRANSFER_TIERS)
    }

    pub fn withdrawal() -> Self {
        Self::from_static(&WITHDRAWAL_TIERS)
    }

    pub fn top_up() -> Self {
        Self::from_static(&TOP_UP_TIERS)
    }

    pub fn emoney_top_up() -> Self {
        Self::from_static(&EMONEY_TOP_UP_TIERS)
    }

    pub fn tiers(&self) -> &[FeeTier] {
        &self.tiers
    }

    /// Fee of the tier containing `amount`, or zero outside every tier.
    pub fn fee_for(&self, amount: Rupiah) -> Rupiah {
        self.tiers
            .iter()
            .find(|tier| tier.contains(amount))
            .map(|tier| tier.fee)
            .unwrap_or(0)
    }
}

/// Fee tables per transaction kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    tables: HashMap<TransactionKind, FeeTable>,
}

impl FeeSchedule {
    pub fn empty() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    /// Default tables for the kinds that price by amount.
    pub fn standard() -> Self {
        Self::empty()
            .with_table(TransactionKind::CustomerTransfer, FeeTable::transfer())
            .with_table(TransactionKind::CustomerWithdrawal, FeeTable::withdrawal())
            .with_table(TransactionKind::KjpWithdrawal, FeeTable::withdrawal())
            .with_table(TransactionKind::CustomerTopUp, FeeTable::top_up())
            .with_table(TransactionKind::CustomerEmoneyTopUp, FeeTable::emoney_top_up())
    }

    pub fn with_table(mut self, kind: TransactionKind, table: FeeTable) -> Self {
        self.tables.insert(kind, table);
        self
    }

    pub fn set_table(&mut self, kind: TransactionKind, table: FeeTable) {
        self.tables.insert(kind, table);
    }

    pub fn table(&self, kind: TransactionKind) -> Option<&FeeTable> {
        self.tables.get(&kind)
    }

    /// Suggested service fee for `amount`; zero for kinds without a table.
    pub fn suggest(&self, kind: TransactionKind, amount: Rupiah) -> Rupiah {
        self.table(kind)
            .map(|table| table.fee_for(amount))
            .unwrap_or(0)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_table_boundaries() {
        let table = FeeTable::transfer();
        let cases = [
            (9_999, 0),
            (10_000, 3_000),
            (39_999, 3_000),
            (40_000, 5_000),
            (999_999, 5_000),
            (1_000_000, 7_000),
            (1_999_999, 7_000),
            (2_000_000, 10_000),
            (3_499_999, 10_000),
            (3_500_000, 15_000),
            (5_999_999, 15_000),
            (6_000_000, 20_000),
            (7_999_999, 20_000),
            (8_000_000, 25_000),
            (10_000_000, 25_000),
            (10_000_001, 0),
        ];
        for (amount, fee) in cases {
            assert_eq!(table.fee_for(amount), fee, "amount {amount}");
        }
    }

    #[test]
    fn builtin_tables_are_valid() {
        for table in [
            FeeTable::transfer(),
            FeeTable::withdrawal(),
            FeeTable::top_up(),
            FeeTable::emoney_top_up(),
        ] {
            FeeTable::new(table.tiers().to_vec()).expect("builtin table must validate");
        }
    }

    #[test]
    fn overlapping_tiers_are_rejected() {
        let err = FeeTable::new(vec![
            FeeTier::new(0, 50_000, 1_000),
            FeeTier::new(50_000, 100_000, 2_000),
        ])
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(ref msg) if msg.contains("overlap")));
    }

    #[test]
    fn schedule_suggests_zero_for_unpriced_kinds() {
        let schedule = FeeSchedule::standard();
        assert_eq!(schedule.suggest(TransactionKind::PpobPdam, 150_000), 0);
        assert_eq!(schedule.suggest(TransactionKind::CustomerTransfer, 39_999), 3_000);
        assert_eq!(schedule.suggest(TransactionKind::KjpWithdrawal, 1_000_000), 10_000);
    }
}
