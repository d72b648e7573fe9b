//! Wallet registry: registration and external funding.

use tally_crypto::{derive_wallet_id, parse_public_key};
use tally_store::{LedgerStore, UtxoRecord, WalletRecord};
use tally_types::{Amount, Timestamp, WalletId};

use crate::ids;
use crate::LedgerError;

/// Register a wallet for `owner` under its SEC1 public key.
///
/// The wallet id is derived from the public key, so registering the same key
/// twice is rejected.
pub fn register_wallet(
    store: &dyn LedgerStore,
    owner: &str,
    public_key: &[u8],
    encrypted_private_key: Vec<u8>,
    now: Timestamp,
) -> Result<WalletRecord, LedgerError> {
    if owner.trim().is_empty() {
        return Err(LedgerError::Validation("owner is required".into()));
    }
    parse_public_key(public_key)
        .map_err(|e| LedgerError::Validation(format!("public key: {e}")))?;

    let record = WalletRecord {
        id: derive_wallet_id(public_key),
        owner: owner.to_string(),
        public_key: public_key.to_vec(),
        encrypted_private_key,
        created_at: now,
    };

    let mut txn = store.write_txn()?;
    if txn.get_wallet(&record.id)?.is_some() {
        return Err(LedgerError::Validation(format!(
            "wallet {} is already registered",
            record.id
        )));
    }
    txn.put_wallet(&record)?;
    txn.commit()?;

    tracing::info!(wallet = %record.id, owner, "wallet registered");
    Ok(record)
}

/// Credit `wallet` with a fresh unspent output that no transaction produced.
pub fn fund_wallet(
    store: &dyn LedgerStore,
    wallet: &WalletId,
    amount: Amount,
    now: Timestamp,
) -> Result<UtxoRecord, LedgerError> {
    if amount.is_zero() {
        return Err(LedgerError::Validation("amount must be positive".into()));
    }
    let mut txn = store.write_txn()?;
    if txn.get_wallet(wallet)?.is_none() {
        return Err(LedgerError::NotFound(format!("wallet {wallet}")));
    }
    let seq = txn.next_sequence()?;
    let utxo = UtxoRecord {
        id: ids::funding_utxo_id(wallet, seq),
        wallet: *wallet,
        amount,
        spent: false,
        source_tx: None,
        output_index: 0,
        created_at: now,
        seq,
    };
    txn.put_utxo(&utxo)?;
    txn.commit()?;

    tracing::info!(wallet = %wallet, amount = %amount, "wallet funded");
    Ok(utxo)
}
