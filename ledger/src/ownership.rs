//! Wallet ownership checks.

use std::sync::Arc;

use tally_store::LedgerStore;
use tally_types::WalletId;

use crate::LedgerError;

/// Decides whether an authenticated principal may spend from a wallet.
pub trait OwnershipCheck: Send + Sync {
    fn ensure_owner(&self, wallet: &WalletId, principal: &str) -> Result<(), LedgerError>;
}

/// Ownership as recorded in the wallet registry.
pub struct StoreOwnership {
    store: Arc<dyn LedgerStore>,
}

impl StoreOwnership {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }
}

impl OwnershipCheck for StoreOwnership {
    fn ensure_owner(&self, wallet: &WalletId, principal: &str) -> Result<(), LedgerError> {
        let txn = self.store.read_txn()?;
        let record = txn
            .get_wallet(wallet)?
            .ok_or_else(|| LedgerError::NotFound(format!("wallet {wallet}")))?;
        if record.owner != principal {
            return Err(LedgerError::Authorization {
                wallet: *wallet,
                principal: principal.to_string(),
            });
        }
        Ok(())
    }
}
