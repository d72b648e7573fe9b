//! Fixtures shared by the unit tests.

use std::sync::Arc;

use tally_crypto::{keypair_from_seed, sign_payload, WalletKeys};
use tally_nullables::NullStore;
use tally_store::LedgerStore;
use tally_types::{Amount, Timestamp, WalletId};

use crate::dto::TransferRequest;
use crate::transfer::canonical_payload;
use crate::{fund_wallet, register_wallet, StoreOwnership, TransferBuilder};

pub(crate) const REQUEST_TIME: &str = "2024-01-02T03:04:05Z";

pub(crate) struct TestWallet {
    pub id: WalletId,
    pub keys: WalletKeys,
}

pub(crate) struct TestLedger {
    pub store: Arc<NullStore>,
}

impl TestLedger {
    pub fn new() -> Self {
        Self {
            store: Arc::new(NullStore::new()),
        }
    }

    /// Register a wallet with a deterministic key derived from `seed`.
    pub fn wallet(&self, owner: &str, seed: u8) -> TestWallet {
        let keys = keypair_from_seed(&[seed; 32]).unwrap();
        let record = register_wallet(
            self.store.as_ref(),
            owner,
            &keys.public_key,
            Vec::new(),
            Timestamp::EPOCH,
        )
        .unwrap();
        TestWallet {
            id: record.id,
            keys,
        }
    }

    pub fn fund(&self, wallet: &TestWallet, amount: u64) {
        fund_wallet(
            self.store.as_ref(),
            &wallet.id,
            Amount::new(amount),
            Timestamp::new(1),
        )
        .unwrap();
    }

    pub fn balance(&self, wallet: &TestWallet) -> u64 {
        self.store
            .read_txn()
            .unwrap()
            .balance(&wallet.id)
            .unwrap()
            .raw()
    }

    pub fn builder(&self) -> TransferBuilder {
        TransferBuilder::new(
            self.store.clone(),
            Arc::new(StoreOwnership::new(self.store.clone())),
        )
    }
}

/// A transfer request signed by `from`'s key.
pub(crate) fn signed_request(
    from: &TestWallet,
    to: &TestWallet,
    amount: i64,
    fee: Option<i64>,
    nonce: &str,
) -> TransferRequest {
    let note = "rent";
    let payload = canonical_payload(
        &from.id.to_hex(),
        &to.id.to_hex(),
        amount,
        REQUEST_TIME,
        note,
    );
    let sig = sign_payload(&from.keys.signing_key, payload.as_bytes());
    TransferRequest {
        from: from.id.to_hex(),
        to: to.id.to_hex(),
        amount,
        fee,
        nonce: nonce.to_string(),
        timestamp: REQUEST_TIME.to_string(),
        note: note.to_string(),
        signature_r: sig.r_hex(),
        signature_s: sig.s_hex(),
    }
}
