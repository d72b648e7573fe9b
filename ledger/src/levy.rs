//! Periodic levy.
//!
//! Each run transfers `rate_per_mille / 1000` of every wallet's balance to the
//! system wallet as a system-issued transaction. The nonce is derived from the
//! run time, so repeating a run for the same instant is a no-op per wallet.

use tally_store::LedgerStore;
use tally_types::{Amount, Timestamp, TxId, WalletId};

use crate::{LedgerError, TransferBuilder};

pub const LEVY_REASON: &str = "levy deduction";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevyPolicy {
    pub rate_per_mille: u64,
    pub system_wallet: WalletId,
}

impl LevyPolicy {
    pub fn levy_for(&self, balance: Amount) -> Amount {
        balance.per_mille(self.rate_per_mille)
    }

    pub fn nonce_for(now: Timestamp) -> String {
        format!("levy-{}", now.as_secs())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevyEntry {
    pub wallet: WalletId,
    pub balance: Amount,
    pub levy: Amount,
    pub tx_id: TxId,
}

/// Mint the levy transactions for `now`. Only newly created transactions are
/// returned. A wallet whose transfer fails is logged and skipped.
pub fn mint_levies(
    store: &dyn LedgerStore,
    builder: &TransferBuilder,
    policy: &LevyPolicy,
    now: Timestamp,
) -> Result<Vec<LevyEntry>, LedgerError> {
    let balances = {
        let txn = store.read_txn()?;
        if txn.get_wallet(&policy.system_wallet)?.is_none() {
            return Err(LedgerError::NotFound(format!(
                "system wallet {}",
                policy.system_wallet
            )));
        }
        let mut balances = Vec::new();
        for wallet in txn.wallets()? {
            if wallet.id == policy.system_wallet {
                continue;
            }
            balances.push((wallet.id, txn.balance(&wallet.id)?));
        }
        balances
    };

    let nonce = LevyPolicy::nonce_for(now);
    let mut entries = Vec::new();
    for (wallet, balance) in balances {
        let levy = policy.levy_for(balance);
        if levy.is_zero() {
            continue;
        }
        match builder.submit_system(&wallet, &policy.system_wallet, levy, &nonce, LEVY_REASON, now) {
            Ok(outcome) if outcome.replayed => {
                tracing::debug!(wallet = %wallet, nonce = %nonce, "levy already applied");
            }
            Ok(outcome) => entries.push(LevyEntry {
                wallet,
                balance,
                levy,
                tx_id: outcome.tx.id,
            }),
            Err(e) => {
                tracing::warn!(wallet = %wallet, error = %e, "levy failed, skipping wallet");
            }
        }
    }

    tracing::info!(
        levied = entries.len(),
        total = %entries.iter().map(|e| e.levy).sum::<Amount>(),
        "levy run finished"
    );
    Ok(entries)
}
