//! Block sealing.
//!
//! Only one seal runs at a time. The miner reads the tip, searches for a nonce
//! outside any store transaction, then reopens a write scope that re-checks
//! the tip and the pending status of every transaction before appending the
//! block. A tip that moved in between fails the seal with
//! [`LedgerError::StaleTip`] instead of forking the chain.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tally_store::{BlockRecord, LedgerStore, TransactionRecord};
use tally_types::{BlockHash, Timestamp, TxId, TxStatus};
use tally_work::{CancelToken, WorkGenerator, MAX_DIFFICULTY};

use crate::header::BlockHeader;
use crate::ids;
use crate::merkle::tx_merkle_root;
use crate::LedgerError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedBlock {
    pub block: BlockRecord,
    /// Sealed transactions in creation order.
    pub tx_ids: Vec<TxId>,
    pub elapsed_ms: u64,
}

pub struct BlockMiner {
    store: Arc<dyn LedgerStore>,
    generator: WorkGenerator,
    seal_lock: Mutex<()>,
    /// Token of the seal holding `seal_lock`, if any.
    active: Mutex<Option<CancelToken>>,
}

/// Publishes a seal's token for as long as the seal holds `seal_lock`.
struct ActiveSeal<'a> {
    slot: &'a Mutex<Option<CancelToken>>,
}

impl<'a> ActiveSeal<'a> {
    fn publish(slot: &'a Mutex<Option<CancelToken>>, token: &CancelToken) -> Self {
        if let Ok(mut guard) = slot.lock() {
            *guard = Some(token.clone());
        }
        Self { slot }
    }
}

impl Drop for ActiveSeal<'_> {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = None;
        }
    }
}

impl BlockMiner {
    pub fn new(store: Arc<dyn LedgerStore>, work_threads: usize) -> Result<Self, LedgerError> {
        Ok(Self {
            store,
            generator: WorkGenerator::new(work_threads)?,
            seal_lock: Mutex::new(()),
            active: Mutex::new(None),
        })
    }

    pub fn work_threads(&self) -> usize {
        self.generator.threads()
    }

    /// Whether a seal currently holds the miner.
    pub fn is_sealing(&self) -> bool {
        self.active.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Cancel the seal currently holding the miner, leaving queued seals alone.
    /// Returns whether a seal was running.
    pub fn cancel_active(&self) -> bool {
        match self.active.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(token) => {
                    token.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Seal the given pending transactions into a new block at the tip.
    pub fn seal(
        &self,
        tx_ids: &[TxId],
        difficulty: u32,
        now: Timestamp,
        cancel: &CancelToken,
    ) -> Result<SealedBlock, LedgerError> {
        if tx_ids.is_empty() {
            return Err(LedgerError::Validation("no transactions to seal".into()));
        }
        if difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::Validation(format!(
                "difficulty {difficulty} exceeds {MAX_DIFFICULTY}"
            )));
        }
        let mut seen = HashSet::with_capacity(tx_ids.len());
        if let Some(dup) = tx_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(LedgerError::Validation(format!(
                "transaction {dup} listed twice"
            )));
        }

        let _guard = self
            .seal_lock
            .lock()
            .map_err(|_| LedgerError::Internal("miner lock poisoned".into()))?;
        let _active = ActiveSeal::publish(&self.active, cancel);
        if cancel.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }

        let (tip, ordered) = {
            let txn = self.store.read_txn()?;
            let mut txs = Vec::with_capacity(tx_ids.len());
            for id in tx_ids {
                txs.push(load_pending(txn.get_transaction(id)?, id)?);
            }
            txs.sort_by_key(|tx| tx.seq);
            (txn.latest_block()?, txs)
        };

        let (height, prev_hash) = match &tip {
            Some(b) => (b.height + 1, b.hash),
            None => (0, BlockHash::ZERO),
        };
        let ids: Vec<TxId> = ordered.iter().map(|tx| tx.id).collect();
        let header = BlockHeader {
            height,
            prev_hash,
            timestamp: now,
            merkle_root: tx_merkle_root(&ids),
            tx_ids: ids,
        };
        let prefix = header.preimage_prefix()?;

        let started = Instant::now();
        let solution = self.generator.generate(prefix.as_bytes(), difficulty, cancel)?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let mut txn = self.store.write_txn()?;
        let current = txn.latest_block()?;
        if current.as_ref().map(|b| b.hash) != tip.as_ref().map(|b| b.hash) {
            return Err(LedgerError::StaleTip {
                expected: tip.map(|b| b.height),
                actual: current.map(|b| b.height),
            });
        }

        let block = BlockRecord {
            id: ids::block_id(height, &solution.hash),
            height,
            prev_hash,
            hash: solution.hash,
            nonce: solution.nonce,
            difficulty,
            merkle_root: header.merkle_root,
            timestamp: now,
        };
        txn.put_block(&block)?;
        for id in &header.tx_ids {
            let mut tx = load_pending(txn.get_transaction(id)?, id)?;
            tx.status = TxStatus::Committed;
            tx.block_id = Some(block.id);
            txn.put_transaction(&tx)?;
        }
        txn.commit()?;

        tracing::info!(
            height,
            hash = %block.hash,
            nonce = block.nonce,
            difficulty,
            tx_count = header.tx_ids.len(),
            elapsed_ms,
            "block sealed"
        );
        Ok(SealedBlock {
            block,
            tx_ids: header.tx_ids,
            elapsed_ms,
        })
    }
}

fn load_pending(
    tx: Option<TransactionRecord>,
    id: &TxId,
) -> Result<TransactionRecord, LedgerError> {
    let tx = tx.ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))?;
    if !tx.status.is_pending() {
        return Err(LedgerError::Validation(format!(
            "transaction {id} is already committed"
        )));
    }
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{signed_request, TestLedger};
    use std::time::Duration;

    const NOW: Timestamp = Timestamp::new(1_704_164_645);

    fn ledger_with_pending(count: usize) -> (TestLedger, Vec<TxId>) {
        let ledger = TestLedger::new();
        let alice = ledger.wallet("alice", 1);
        let bob = ledger.wallet("bob", 2);
        ledger.fund(&alice, 10_000);
        let builder = ledger.builder();
        let ids = (0..count)
            .map(|i| {
                let req = signed_request(&alice, &bob, 100, Some(1), &format!("n-{i}"));
                builder.submit("alice", &req, NOW).unwrap().tx.id
            })
            .collect();
        (ledger, ids)
    }

    #[test]
    fn genesis_block_links_to_zero_and_commits_txs() {
        let (ledger, ids) = ledger_with_pending(2);
        let miner = BlockMiner::new(ledger.store.clone(), 2).unwrap();
        let sealed = miner.seal(&ids, 0, NOW, &CancelToken::new()).unwrap();

        assert_eq!(sealed.block.height, 0);
        assert!(sealed.block.prev_hash.is_zero());
        assert_eq!(sealed.block.nonce, 0);
        assert_eq!(sealed.tx_ids, ids);

        let txn = ledger.store.read_txn().unwrap();
        assert!(txn.pending_transactions(0).unwrap().is_empty());
        for id in &ids {
            let tx = txn.get_transaction(id).unwrap().unwrap();
            assert_eq!(tx.status, TxStatus::Committed);
            assert_eq!(tx.block_id, Some(sealed.block.id));
        }
    }

    #[test]
    fn seal_orders_by_creation_and_finds_minimal_nonce() {
        let (ledger, ids) = ledger_with_pending(3);
        let miner = BlockMiner::new(ledger.store.clone(), 3).unwrap();
        let reversed: Vec<TxId> = ids.iter().rev().copied().collect();
        let sealed = miner.seal(&reversed, 2, NOW, &CancelToken::new()).unwrap();
        assert_eq!(sealed.tx_ids, ids);

        let header = BlockHeader {
            height: 0,
            prev_hash: BlockHash::ZERO,
            timestamp: NOW,
            merkle_root: tx_merkle_root(&ids),
            tx_ids: ids.clone(),
        };
        assert!(sealed.block.hash.to_hex().starts_with("00"));
        assert_eq!(sealed.block.hash, header.hash(sealed.block.nonce).unwrap());
        let minimal = (0..)
            .find(|n| header.hash(*n).unwrap().meets_difficulty(2))
            .unwrap();
        assert_eq!(sealed.block.nonce, minimal);
    }

    #[test]
    fn second_block_links_to_first() {
        let (ledger, ids) = ledger_with_pending(2);
        let miner = BlockMiner::new(ledger.store.clone(), 1).unwrap();
        let first = miner.seal(&ids[..1], 1, NOW, &CancelToken::new()).unwrap();
        let second = miner.seal(&ids[1..], 1, NOW, &CancelToken::new()).unwrap();
        assert_eq!(second.block.height, 1);
        assert_eq!(second.block.prev_hash, first.block.hash);
    }

    #[test]
    fn rejects_bad_batches() {
        let (ledger, ids) = ledger_with_pending(1);
        let miner = BlockMiner::new(ledger.store.clone(), 1).unwrap();
        let token = CancelToken::new();

        assert!(matches!(miner.seal(&[], 0, NOW, &token), Err(LedgerError::Validation(_))));
        assert!(matches!(
            miner.seal(&[ids[0], ids[0]], 0, NOW, &token),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            miner.seal(&ids, MAX_DIFFICULTY + 1, NOW, &token),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            miner.seal(&[TxId::new([3; 32])], 0, NOW, &token),
            Err(LedgerError::NotFound(_))
        ));

        miner.seal(&ids, 0, NOW, &token).unwrap();
        assert!(matches!(miner.seal(&ids, 0, NOW, &token), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn cancelled_seal_writes_nothing() {
        let (ledger, ids) = ledger_with_pending(1);
        let miner = BlockMiner::new(ledger.store.clone(), 1).unwrap();
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(miner.seal(&ids, 12, NOW, &token), Err(LedgerError::Cancelled)));

        let txn = ledger.store.read_txn().unwrap();
        assert!(txn.latest_block().unwrap().is_none());
        assert_eq!(txn.pending_transactions(0).unwrap().len(), 1);
    }

    #[test]
    fn cancelled_seal_at_zero_difficulty_writes_nothing() {
        let (ledger, ids) = ledger_with_pending(1);
        let miner = BlockMiner::new(ledger.store.clone(), 1).unwrap();
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(miner.seal(&ids, 0, NOW, &token), Err(LedgerError::Cancelled)));
        assert!(ledger.store.read_txn().unwrap().latest_block().unwrap().is_none());
    }

    #[test]
    fn cancel_active_hits_the_running_seal_not_the_queued_one() {
        let (ledger, ids) = ledger_with_pending(2);
        let miner = BlockMiner::new(ledger.store.clone(), 2).unwrap();
        assert!(!miner.cancel_active());

        let running_token = CancelToken::with_timeout(Duration::from_secs(30));
        let queued_token = CancelToken::new();
        std::thread::scope(|scope| {
            let running = scope.spawn(|| {
                let started = Instant::now();
                let result = miner.seal(&ids[..1], MAX_DIFFICULTY, NOW, &running_token);
                (result, started.elapsed())
            });
            while !miner.is_sealing() {
                std::thread::sleep(Duration::from_millis(5));
            }
            let queued = scope.spawn(|| miner.seal(&ids[1..], 0, NOW, &queued_token));
            std::thread::sleep(Duration::from_millis(150));

            assert!(miner.cancel_active());
            let (result, elapsed) = running.join().unwrap();
            assert!(matches!(result, Err(LedgerError::Cancelled)));
            assert!(elapsed < Duration::from_secs(10));

            let sealed = queued.join().unwrap().unwrap();
            assert!(!queued_token.is_cancelled());
            assert_eq!(sealed.block.height, 0);
            assert_eq!(sealed.tx_ids, ids[1..].to_vec());
        });
        assert!(!miner.is_sealing());
        assert!(!miner.cancel_active());
    }
}
