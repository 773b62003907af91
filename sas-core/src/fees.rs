//! Fee estimation.
//!
//! Liquid fees are flat and low (around 0.1 sat/vbyte), so estimation is a
//! static rate table plus representative transaction sizes per operation.
//! The pipeline's fixed `FEE_SATS` already clears every estimate here; this
//! module exists for callers that want to reason about fees explicitly.

use serde::Serialize;

use crate::prepared::TransactionKind;

/// Network minimum, satoshis.
pub const MIN_FEE_SATS: u64 = 100;

/// How soon the transaction should confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeePriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl FeePriority {
    /// Static rate table, sat/vbyte.
    pub fn sat_per_vbyte(&self) -> f64 {
        // TODO: fetch live rates from Esplora /fee-estimates and fall back
        // to this table.
        match self {
            FeePriority::Low => 0.1,
            FeePriority::Medium => 0.11,
            FeePriority::High => 0.15,
            FeePriority::Urgent => 0.2,
        }
    }

    /// Expected confirmation distance, blocks.
    pub fn estimated_blocks(&self) -> u32 {
        match self {
            FeePriority::Low => 6,
            FeePriority::Medium => 2,
            FeePriority::High | FeePriority::Urgent => 1,
        }
    }
}

/// A concrete fee recommendation.
#[derive(Debug, Clone, Serialize)]
pub struct FeeEstimate {
    pub sat_per_vbyte: f64,
    pub total_sats: u64,
    pub priority: FeePriority,
    pub estimated_blocks: u32,
}

impl FeeEstimate {
    pub fn total_btc(&self) -> f64 {
        self.total_sats as f64 / 100_000_000.0
    }
}

/// Static-table fee estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeEstimator;

impl FeeEstimator {
    pub fn new() -> Self {
        FeeEstimator
    }

    /// Estimate for an operation, using its representative size.
    pub fn estimate(&self, kind: TransactionKind, priority: FeePriority) -> FeeEstimate {
        self.estimate_for_size(representative_vbytes(kind), priority)
    }

    /// Estimate for an explicit transaction size.
    pub fn estimate_for_size(&self, vbytes: u64, priority: FeePriority) -> FeeEstimate {
        let rate = priority.sat_per_vbyte();
        let total_sats = ((vbytes as f64 * rate) as u64).max(MIN_FEE_SATS);
        FeeEstimate {
            sat_per_vbyte: rate,
            total_sats,
            priority,
            estimated_blocks: priority.estimated_blocks(),
        }
    }

    /// Medium-priority total for an operation.
    pub fn recommended(&self, kind: TransactionKind) -> u64 {
        self.estimate(kind, FeePriority::Medium).total_sats
    }
}

/// Typical vbyte sizes observed for each operation shape.
fn representative_vbytes(kind: TransactionKind) -> u64 {
    match kind {
        // change + certificate + annotation + fee
        TransactionKind::IssueCertificate => 350,
        // one or two outputs
        TransactionKind::RevokeCertificate | TransactionKind::DrainVault => 200,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_table() {
        assert_eq!(FeePriority::Low.sat_per_vbyte(), 0.1);
        assert_eq!(FeePriority::Medium.sat_per_vbyte(), 0.11);
        assert_eq!(FeePriority::High.sat_per_vbyte(), 0.15);
        assert_eq!(FeePriority::Urgent.sat_per_vbyte(), 0.2);
        assert_eq!(FeePriority::Low.estimated_blocks(), 6);
        assert_eq!(FeePriority::Urgent.estimated_blocks(), 1);
    }

    #[test]
    fn test_small_transactions_hit_the_floor() {
        let estimator = FeeEstimator::new();
        let estimate = estimator.estimate(TransactionKind::IssueCertificate, FeePriority::Urgent);
        // 350 vbytes at 0.2 sat/vbyte is 70 sats, below the network minimum.
        assert_eq!(estimate.total_sats, MIN_FEE_SATS);
    }

    #[test]
    fn test_large_transactions_scale_with_rate() {
        let estimator = FeeEstimator::new();
        let estimate = estimator.estimate_for_size(10_000, FeePriority::Medium);
        assert_eq!(estimate.total_sats, 1_100);
        assert_eq!(estimate.estimated_blocks, 2);
    }

    #[test]
    fn test_recommended_uses_medium_priority() {
        let estimator = FeeEstimator::new();
        assert_eq!(
            estimator.recommended(TransactionKind::RevokeCertificate),
            estimator
                .estimate(TransactionKind::RevokeCertificate, FeePriority::Medium)
                .total_sats
        );
    }

    #[test]
    fn test_total_btc_conversion() {
        let estimator = FeeEstimator::new();
        let estimate = estimator.estimate_for_size(10_000, FeePriority::Low);
        assert!((estimate.total_btc() - 0.00001).abs() < 1e-12);
    }
}
