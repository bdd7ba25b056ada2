//! Coin selection for outgoing payments.
//!
//! Largest-first greedy selection: simple, deterministic, and it minimizes
//! the input count (and therefore the fee) for a given target. Fee-aware
//! funding re-runs the selection with the fee folded into the target until
//! the picked total covers both, since adding inputs raises the fee which
//! can in turn require more inputs.

use bitcoin::Amount;

use crate::error::WalletError;
use crate::types::Utxo;

/// Adding one input can force another selection pass; the requirement is
/// monotone so this converges almost immediately in practice.
const MAX_FUNDING_PASSES: usize = 3;

/// The outcome of a selection: which outputs to spend and their total.
#[derive(Debug, Clone)]
pub struct CoinSelection {
    pub utxos: Vec<Utxo>,
    pub total: Amount,
}

/// A selection together with the fee it was sized for.
#[derive(Debug, Clone)]
pub struct FundedSelection {
    pub utxos: Vec<Utxo>,
    pub total: Amount,
    pub fee: Amount,
}

/// Estimates the fee for a transaction shape. Kept as a trait so callers
/// can plug in script-type-aware estimators.
pub trait FeeModel {
    fn fee(&self, input_count: usize, output_count: usize) -> Amount;
}

/// Weight-based estimate assuming segwit v0 single-sig inputs: roughly 68
/// vbytes per input, 31 per output, 11 of fixed overhead.
#[derive(Debug, Clone, Copy)]
pub struct FlatVsizeFeeModel {
    pub sat_per_vbyte: u64,
}

impl FeeModel for FlatVsizeFeeModel {
    fn fee(&self, input_count: usize, output_count: usize) -> Amount {
        let vbytes = input_count as u64 * 68 + output_count as u64 * 31 + 11;
        Amount::from_sat(vbytes * self.sat_per_vbyte)
    }
}

/// Pick outputs covering `target`, largest first.
///
/// Returns the shortest largest-first prefix whose sum reaches the target.
/// When the pool cannot cover it, the error reports the pool's full sum as
/// the available amount.
pub fn select_coins(utxos: &[Utxo], target: Amount) -> Result<CoinSelection, WalletError> {
    let mut pool: Vec<&Utxo> = utxos.iter().collect();
    pool.sort_by(|a, b| b.value.cmp(&a.value));

    let mut selected = Vec::new();
    let mut total = Amount::ZERO;
    for utxo in pool {
        if total >= target {
            break;
        }
        total += utxo.value;
        selected.push(utxo.clone());
    }

    if total < target {
        return Err(WalletError::InsufficientFunds {
            available: total,
            required: target,
        });
    }
    Ok(CoinSelection {
        utxos: selected,
        total,
    })
}

/// Pick outputs covering `target` plus the fee for the resulting
/// transaction shape.
///
/// `output_count` is the number of payment outputs; one change output is
/// always assumed on top of it.
pub fn fund_payment(
    utxos: &[Utxo],
    target: Amount,
    output_count: usize,
    fee_model: &impl FeeModel,
) -> Result<FundedSelection, WalletError> {
    let mut required = target;
    let mut last_fee = Amount::ZERO;

    for _ in 0..MAX_FUNDING_PASSES {
        let selection = select_coins(utxos, required)?;
        let fee = fee_model.fee(selection.utxos.len(), output_count + 1);
        if selection.total >= target + fee {
            return Ok(FundedSelection {
                utxos: selection.utxos,
                total: selection.total,
                fee,
            });
        }
        required = target + fee;
        last_fee = fee;
    }

    Err(WalletError::InsufficientFunds {
        available: utxos.iter().map(|u| u.value).sum(),
        required: target + last_fee,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{addr_from_byte, txid_from_byte};

    fn pool(values: &[u64]) -> Vec<Utxo> {
        values
            .iter()
            .enumerate()
            .map(|(i, sats)| Utxo {
                txid: txid_from_byte(i as u8),
                vout: 0,
                value: Amount::from_sat(*sats),
                address: addr_from_byte(1),
                height: Some(100 + i as u32),
            })
            .collect()
    }

    fn sats(selection: &[Utxo]) -> Vec<u64> {
        selection.iter().map(|u| u.value.to_sat()).collect()
    }

    #[test]
    fn picks_largest_first_until_covered() {
        let utxos = pool(&[20_000, 50_000, 30_000]);
        let selection =
            select_coins(&utxos, Amount::from_sat(60_000)).expect("pool covers target");

        assert_eq!(sats(&selection.utxos), vec![50_000, 30_000]);
        assert_eq!(selection.total, Amount::from_sat(80_000));
    }

    #[test]
    fn selection_is_a_minimal_largest_first_prefix() {
        let utxos = pool(&[5_000, 40_000, 1_000, 25_000, 10_000]);
        for target in [1u64, 5_000, 40_001, 55_000, 81_000] {
            let selection =
                select_coins(&utxos, Amount::from_sat(target)).expect("pool covers target");
            let picked = sats(&selection.utxos);
            assert_eq!(picked, vec![40_000, 25_000, 10_000, 5_000, 1_000][..picked.len()]);
            // Dropping the last pick must dip below the target.
            let without_last: u64 = picked[..picked.len() - 1].iter().sum();
            assert!(without_last < target);
        }
    }

    #[test]
    fn insufficient_pool_reports_full_sum_as_available() {
        let utxos = pool(&[20_000, 30_000]);
        let err = select_coins(&utxos, Amount::from_sat(60_000))
            .expect_err("pool cannot cover target");
        assert!(matches!(
            err,
            WalletError::InsufficientFunds { available, required }
                if available == Amount::from_sat(50_000)
                    && required == Amount::from_sat(60_000)
        ));
    }

    #[test]
    fn zero_target_selects_nothing() {
        let utxos = pool(&[10_000]);
        let selection = select_coins(&utxos, Amount::ZERO).expect("trivially covered");
        assert!(selection.utxos.is_empty());
        assert_eq!(selection.total, Amount::ZERO);
    }

    #[test]
    fn funding_covers_target_plus_fee() {
        let utxos = pool(&[50_000, 30_000, 20_000]);
        let model = FlatVsizeFeeModel { sat_per_vbyte: 10 };

        let funded = fund_payment(&utxos, Amount::from_sat(60_000), 1, &model)
            .expect("pool covers target plus fee");
        let fee = model.fee(funded.utxos.len(), 2);
        assert_eq!(funded.fee, fee);
        assert!(funded.total >= Amount::from_sat(60_000) + fee);
        assert_eq!(sats(&funded.utxos), vec![50_000, 30_000]);
    }

    #[test]
    fn funding_adds_an_input_when_the_fee_tips_the_balance() {
        // 2 inputs, 2 outputs at 10 sat/vB: fee 2090. The first pass picks
        // 50k+30k for an 80 000 target, which cannot also pay the fee; the
        // second pass must pull in the third output.
        let utxos = pool(&[50_000, 30_000, 20_000]);
        let model = FlatVsizeFeeModel { sat_per_vbyte: 10 };

        let funded = fund_payment(&utxos, Amount::from_sat(80_000), 1, &model)
            .expect("third output covers the fee");
        assert_eq!(sats(&funded.utxos), vec![50_000, 30_000, 20_000]);
        assert!(funded.total >= Amount::from_sat(80_000) + funded.fee);
    }

    #[test]
    fn funding_fails_when_fee_cannot_be_covered() {
        let utxos = pool(&[60_000]);
        let model = FlatVsizeFeeModel { sat_per_vbyte: 10 };

        let err = fund_payment(&utxos, Amount::from_sat(60_000), 1, &model)
            .expect_err("pool covers target but never the fee");
        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
    }

    #[test]
    fn flat_vsize_model_scales_with_shape() {
        let model = FlatVsizeFeeModel { sat_per_vbyte: 2 };
        assert_eq!(model.fee(1, 2), Amount::from_sat((68 + 62 + 11) * 2));
        assert!(model.fee(3, 2) > model.fee(1, 2));
    }
}
