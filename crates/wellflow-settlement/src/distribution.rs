//! Proportional revenue distribution.
//!
//! Given a gross revenue figure and the share register for a well, computes
//! each holder's payout: `percentage = balance / total_supply`,
//! `amount = gross * percentage` rounded **half-up to 6 decimal places**
//! ([`constants::PAYOUT_SCALE`]).
//!
//! Per-holder rounding can leave the sum a few minimal units away from the
//! gross amount, so the residual is reconciled: a shortfall goes to the last
//! holder with a non-zero balance, an overshoot is deducted from lines that
//! can absorb it without going below zero. The distributed total always
//! equals the gross exactly and no amount is ever negative. Both invariants
//! are checked before returning.

use rust_decimal::{Decimal, RoundingStrategy};

use wellflow_anchor::ShareRegister;
use wellflow_types::{AccountId, Result, WellflowError, constants};

/// One holder's computed line in a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributionLine {
    pub account: AccountId,
    /// Fraction of total supply held, in `[0, 1]`.
    pub percentage: Decimal,
    /// Currency amount owed, at payout precision (plus or minus any
    /// reconciliation residual). Never negative.
    pub amount: Decimal,
}

/// Compute the per-holder distribution of `gross`.
///
/// # Errors
/// - [`WellflowError::ZeroSupply`] if the register's total supply is zero
/// - [`WellflowError::Validation`] for a negative gross amount, a negative
///   balance, or holdings that do not sum to the total supply
pub fn compute_distribution(gross: Decimal, register: &ShareRegister) -> Result<Vec<DistributionLine>> {
    if gross < Decimal::ZERO {
        return Err(WellflowError::Validation {
            reason: format!("gross revenue {gross} is negative"),
        });
    }
    if register.total_supply == Decimal::ZERO {
        return Err(WellflowError::ZeroSupply);
    }
    if register.total_supply < Decimal::ZERO {
        return Err(WellflowError::Validation {
            reason: format!("total supply {} is negative", register.total_supply),
        });
    }
    let held: Decimal = register.holdings.iter().map(|h| h.balance).sum();
    if held != register.total_supply {
        return Err(WellflowError::Validation {
            reason: format!(
                "holdings sum {held} does not match total supply {}",
                register.total_supply
            ),
        });
    }

    let mut lines = Vec::with_capacity(register.holdings.len());
    for holding in &register.holdings {
        if holding.balance < Decimal::ZERO {
            return Err(WellflowError::Validation {
                reason: format!("holder {} has negative balance", holding.account),
            });
        }
        let percentage = holding.balance / register.total_supply;
        let amount = (gross * percentage).round_dp_with_strategy(
            constants::PAYOUT_SCALE,
            RoundingStrategy::MidpointAwayFromZero,
        );
        lines.push(DistributionLine {
            account: holding.account,
            percentage,
            amount,
        });
    }

    // Reconcile the rounding residual so the distributed total equals the
    // gross exactly. A shortfall goes to the last holder with a non-zero
    // balance. An overshoot cannot simply be deducted there: that holder's
    // own share may have rounded to zero, and no amount may go negative, so
    // it is deducted walking the lines in reverse, taking from each only
    // what it can absorb.
    let distributed: Decimal = lines.iter().map(|l| l.amount).sum();
    let mut residual = gross - distributed;
    if residual > Decimal::ZERO {
        let last = lines
            .iter_mut()
            .rev()
            .find(|l| l.percentage > Decimal::ZERO)
            .ok_or(WellflowError::ZeroSupply)?;
        last.amount += residual;
    } else if residual < Decimal::ZERO {
        for line in lines.iter_mut().rev() {
            if residual == Decimal::ZERO {
                break;
            }
            let take = line.amount.min(-residual);
            line.amount -= take;
            residual += take;
        }
        // The overshoot came out of the lines, so they can always absorb it.
        debug_assert_eq!(residual, Decimal::ZERO, "overshoot not fully absorbed");
    }

    debug_assert_eq!(
        lines.iter().map(|l| l.amount).sum::<Decimal>(),
        gross,
        "distribution must sum to gross exactly"
    );
    debug_assert!(
        lines.iter().all(|l| l.amount >= Decimal::ZERO),
        "distribution must never produce a negative amount"
    );
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wellflow_anchor::Holding;

    fn register(balances: &[i64]) -> (Vec<AccountId>, ShareRegister) {
        let accounts: Vec<AccountId> = balances.iter().map(|_| AccountId::new()).collect();
        let holdings = accounts
            .iter()
            .zip(balances)
            .map(|(account, b)| Holding {
                account: *account,
                balance: Decimal::new(*b, 0),
            })
            .collect();
        let total_supply = Decimal::new(balances.iter().sum(), 0);
        (
            accounts,
            ShareRegister {
                holdings,
                total_supply,
            },
        )
    }

    #[test]
    fn seventy_thirty_split_of_one_hundred() {
        let (accounts, reg) = register(&[700, 300]);
        let lines = compute_distribution(Decimal::new(100_00, 2), &reg).unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].account, accounts[0]);
        assert_eq!(lines[0].amount, Decimal::new(70_00, 2));
        assert_eq!(lines[1].amount, Decimal::new(30_00, 2));
        let total: Decimal = lines.iter().map(|l| l.amount).sum();
        assert_eq!(total, Decimal::new(100_00, 2));
    }

    #[test]
    fn zero_supply_rejected() {
        let reg = ShareRegister {
            holdings: vec![],
            total_supply: Decimal::ZERO,
        };
        let err = compute_distribution(Decimal::new(100, 0), &reg).unwrap_err();
        assert!(matches!(err, WellflowError::ZeroSupply));
    }

    #[test]
    fn negative_gross_rejected() {
        let (_, reg) = register(&[1000]);
        let err = compute_distribution(Decimal::new(-1, 0), &reg).unwrap_err();
        assert!(matches!(err, WellflowError::Validation { .. }));
    }

    #[test]
    fn holdings_must_sum_to_supply() {
        let (_, mut reg) = register(&[600, 300]);
        reg.total_supply = Decimal::new(1000, 0);
        let err = compute_distribution(Decimal::new(100, 0), &reg).unwrap_err();
        assert!(matches!(err, WellflowError::Validation { .. }));
    }

    #[test]
    fn residual_reconciled_onto_last_holder() {
        // 100 / 3: each third rounds to 33.333333; the residual 0.000001
        // lands on the last holder.
        let (_, reg) = register(&[1, 1, 1]);
        let gross = Decimal::new(100, 0);
        let lines = compute_distribution(gross, &reg).unwrap();

        let total: Decimal = lines.iter().map(|l| l.amount).sum();
        assert_eq!(total, gross, "sum must equal gross exactly");
        assert_eq!(lines[0].amount, lines[1].amount);
        assert_ne!(lines[1].amount, lines[2].amount);
    }

    #[test]
    fn all_amounts_non_negative() {
        let (_, reg) = register(&[999_999, 1]);
        let lines = compute_distribution(Decimal::new(1, 2), &reg).unwrap();
        for line in &lines {
            assert!(line.amount >= Decimal::ZERO, "amount {} < 0", line.amount);
        }
        let total: Decimal = lines.iter().map(|l| l.amount).sum();
        assert_eq!(total, Decimal::new(1, 2));
    }

    #[test]
    fn zero_balance_holder_gets_nothing_and_no_residual() {
        let (accounts, reg) = register(&[1, 1, 0]);
        let gross = Decimal::new(100, 0);
        let lines = compute_distribution(gross, &reg).unwrap();

        // The residual must land on a holder with a non-zero balance, not
        // the trailing zero-balance account.
        let zero_line = lines.iter().find(|l| l.account == accounts[2]).unwrap();
        assert_eq!(zero_line.amount, Decimal::ZERO);
        let total: Decimal = lines.iter().map(|l| l.amount).sum();
        assert_eq!(total, gross);
    }

    #[test]
    fn overshoot_never_drives_an_amount_below_zero() {
        // Three holders round half a minimal unit up each while the trailing
        // holder's own share rounds to zero, so the rounded sum overshoots
        // the gross. The overshoot must come out of a line that can absorb
        // it, not the zero-amount tail holder.
        let (_, reg) = register(&[15, 15, 15, 9_999_951, 4]);
        let gross = Decimal::ONE;
        let lines = compute_distribution(gross, &reg).unwrap();

        for line in &lines {
            assert!(line.amount >= Decimal::ZERO, "amount {} < 0", line.amount);
        }
        let total: Decimal = lines.iter().map(|l| l.amount).sum();
        assert_eq!(total, gross);

        // The small holders keep their rounded 0.000002; the tail holder
        // stays at zero; the majority line absorbs the overshoot.
        assert_eq!(lines[0].amount, Decimal::new(2, 6));
        assert_eq!(lines[4].amount, Decimal::ZERO);
        assert_eq!(lines[3].amount, Decimal::new(999_994, 6));
    }

    #[test]
    fn rounding_is_half_up_at_six_places() {
        // balance 1 of 1_600_000 at gross 1: 0.000000625 rounds up to 0.000001.
        let (_, reg) = register(&[1, 1_599_999]);
        let lines = compute_distribution(Decimal::ONE, &reg).unwrap();
        assert_eq!(lines[0].amount, Decimal::new(1, 6));
    }

    #[test]
    fn single_holder_takes_everything() {
        let (_, reg) = register(&[42]);
        let gross = Decimal::new(1234_567890, 6);
        let lines = compute_distribution(gross, &reg).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].amount, gross);
        assert_eq!(lines[0].percentage, Decimal::ONE);
    }
}
