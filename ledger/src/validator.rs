//! Full-chain validation.
//!
//! Walks every block in height order and recomputes what the miner committed
//! to: the genesis sentinel, the previous-hash link, contiguous heights, the
//! Merkle root over the block's transactions, the header hash and its
//! difficulty. User-signed transactions have their signature re-verified
//! against the sender's registered key. Every mismatch is collected; only a
//! store failure aborts the walk.

use std::sync::Arc;

use tally_crypto::verify_signature;
use tally_store::{BlockRecord, LedgerStore, ReadTxn, TransactionRecord};
use tally_types::{BlockHash, Provenance, TxId};

use crate::header::BlockHeader;
use crate::merkle::tx_merkle_root;
use crate::transfer::canonical_payload;
use crate::LedgerError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub checked_blocks: u64,
    pub errors: Vec<String>,
    pub last_height: Option<u64>,
    pub last_hash: Option<BlockHash>,
    pub user_transactions: u64,
    pub system_transactions: u64,
}

pub struct ChainValidator {
    store: Arc<dyn LedgerStore>,
}

impl ChainValidator {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn validate(&self) -> Result<ValidationReport, LedgerError> {
        let txn = self.store.read_txn()?;
        let blocks = txn.blocks()?;

        let mut report = ValidationReport {
            valid: true,
            checked_blocks: 0,
            errors: Vec::new(),
            last_height: None,
            last_hash: None,
            user_transactions: 0,
            system_transactions: 0,
        };

        let mut prev: Option<&BlockRecord> = None;
        for (position, block) in blocks.iter().enumerate() {
            let h = block.height;
            if h != position as u64 {
                report
                    .errors
                    .push(format!("block at position {position} has height {h}"));
            }
            match prev {
                None if !block.prev_hash.is_zero() => report.errors.push(format!(
                    "genesis block prev_hash should be '0', got '{}'",
                    block.prev_hash.to_link_string()
                )),
                Some(p) if block.prev_hash != p.hash => {
                    report.errors.push(format!("block {h} prev_hash mismatch"))
                }
                _ => {}
            }

            let txs = txn.block_transactions(&block.id)?;
            let ids: Vec<TxId> = txs.iter().map(|t| t.id).collect();
            if tx_merkle_root(&ids) != block.merkle_root {
                report.errors.push(format!("block {h} merkle root mismatch"));
            }

            let header = BlockHeader {
                height: block.height,
                prev_hash: block.prev_hash,
                timestamp: block.timestamp,
                merkle_root: block.merkle_root.clone(),
                tx_ids: ids,
            };
            match header.hash(block.nonce) {
                Ok(hash) if hash == block.hash => {}
                Ok(_) => report.errors.push(format!("block {h} hash mismatch")),
                Err(e) => report.errors.push(format!("block {h} header unreadable: {e}")),
            }
            if !block.hash.meets_difficulty(block.difficulty) {
                report.errors.push(format!(
                    "block {h} hash does not meet difficulty {}",
                    block.difficulty
                ));
            }

            for tx in &txs {
                if tx.provenance.is_system() {
                    report.system_transactions += 1;
                } else {
                    report.user_transactions += 1;
                    if !signature_holds(&*txn, tx)? {
                        report
                            .errors
                            .push(format!("block {h} transaction {} signature invalid", tx.id));
                    }
                }
            }

            report.checked_blocks += 1;
            prev = Some(block);
        }

        report.last_height = blocks.last().map(|b| b.height);
        report.last_hash = blocks.last().map(|b| b.hash);
        report.valid = report.errors.is_empty();

        if report.valid {
            tracing::debug!(blocks = report.checked_blocks, "chain valid");
        } else {
            tracing::warn!(
                blocks = report.checked_blocks,
                errors = report.errors.len(),
                "chain validation found errors"
            );
        }
        Ok(report)
    }
}

fn signature_holds<T: ReadTxn + ?Sized>(
    txn: &T,
    tx: &TransactionRecord,
) -> Result<bool, LedgerError> {
    let Provenance::UserSigned { signature } = &tx.provenance else {
        return Ok(true);
    };
    let Some(sender) = txn.get_wallet(&tx.from)? else {
        return Ok(false);
    };
    let payload = canonical_payload(
        &tx.from.to_hex(),
        &tx.to.to_hex(),
        tx.amount.raw() as i64,
        &tx.timestamp,
        &tx.note,
    );
    Ok(verify_signature(&sender.public_key, payload.as_bytes(), signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{signed_request, TestLedger};
    use crate::BlockMiner;
    use tally_types::{Amount, Timestamp};
    use tally_work::CancelToken;

    const NOW: Timestamp = Timestamp::new(1_704_164_645);

    /// Two sealed blocks of one user transfer each, plus one system transfer in the second.
    fn sealed_chain() -> TestLedger {
        let ledger = TestLedger::new();
        let alice = ledger.wallet("alice", 1);
        let bob = ledger.wallet("bob", 2);
        ledger.fund(&alice, 5_000);
        let builder = ledger.builder();
        let miner = BlockMiner::new(ledger.store.clone(), 2).unwrap();
        let token = CancelToken::new();

        let t1 = builder
            .submit("alice", &signed_request(&alice, &bob, 100, None, "n-1"), NOW)
            .unwrap();
        miner.seal(&[t1.tx.id], 1, NOW, &token).unwrap();

        let t2 = builder
            .submit("alice", &signed_request(&alice, &bob, 200, None, "n-2"), NOW)
            .unwrap();
        let t3 = builder
            .submit_system(&bob.id, &alice.id, Amount::new(5), "levy-1", "levy deduction", NOW)
            .unwrap();
        miner.seal(&[t2.tx.id, t3.tx.id], 2, NOW, &token).unwrap();
        ledger
    }

    fn validate(ledger: &TestLedger) -> ValidationReport {
        ChainValidator::new(ledger.store.clone()).validate().unwrap()
    }

    #[test]
    fn empty_chain_is_valid() {
        let report = validate(&TestLedger::new());
        assert!(report.valid);
        assert_eq!(report.checked_blocks, 0);
        assert_eq!(report.last_height, None);
        assert_eq!(report.last_hash, None);
    }

    #[test]
    fn untouched_chain_is_valid() {
        let ledger = sealed_chain();
        let report = validate(&ledger);
        assert!(report.valid, "{:?}", report.errors);
        assert_eq!(report.checked_blocks, 2);
        assert_eq!(report.last_height, Some(1));
        assert_eq!(report.user_transactions, 2);
        assert_eq!(report.system_transactions, 1);
        let tip = ledger.store.read_txn().unwrap().latest_block().unwrap().unwrap();
        assert_eq!(report.last_hash, Some(tip.hash));
    }

    #[test]
    fn rewritten_merkle_root_is_reported() {
        let ledger = sealed_chain();
        assert!(ledger.store.tamper_block(0, |b| b.merkle_root = "deadbeef".into()));
        let report = validate(&ledger);
        assert!(!report.valid);
        assert!(report.errors.contains(&"block 0 merkle root mismatch".to_string()));
        assert!(report.errors.contains(&"block 0 hash mismatch".to_string()));
    }

    #[test]
    fn broken_link_is_reported() {
        let ledger = sealed_chain();
        ledger.store.tamper_block(1, |b| b.prev_hash = BlockHash::new([0x77; 32]));
        let report = validate(&ledger);
        assert!(report.errors.contains(&"block 1 prev_hash mismatch".to_string()));
    }

    #[test]
    fn genesis_sentinel_is_checked() {
        let ledger = sealed_chain();
        ledger.store.tamper_block(0, |b| b.prev_hash = BlockHash::new([0x11; 32]));
        let report = validate(&ledger);
        let expected = format!(
            "genesis block prev_hash should be '0', got '{}'",
            "11".repeat(32)
        );
        assert!(report.errors.contains(&expected));
    }

    #[test]
    fn altered_nonce_fails_hash_and_difficulty() {
        let ledger = sealed_chain();
        ledger.store.tamper_block(1, |b| {
            b.nonce += 1;
            b.hash = BlockHash::new([0xff; 32]);
        });
        let report = validate(&ledger);
        assert!(report.errors.contains(&"block 1 hash mismatch".to_string()));
        assert!(report
            .errors
            .contains(&"block 1 hash does not meet difficulty 2".to_string()));
    }

    #[test]
    fn altered_transaction_amount_is_reported() {
        let ledger = sealed_chain();
        let first = ledger.store.read_txn().unwrap().blocks().unwrap()[0].clone();
        let tx = ledger
            .store
            .read_txn()
            .unwrap()
            .block_transactions(&first.id)
            .unwrap()[0]
            .clone();
        ledger
            .store
            .tamper_transaction(&tx.id, |t| t.amount = Amount::new(4_000));
        let report = validate(&ledger);
        assert_eq!(
            report.errors,
            vec![format!("block 0 transaction {} signature invalid", tx.id)]
        );
    }
}
