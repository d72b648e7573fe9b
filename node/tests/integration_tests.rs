//! Integration tests running the node on a real LMDB environment:
//! wallet registration → signed transfers → manual commit → levy tick →
//! validation → reopen and re-validate.

use std::sync::Arc;

use tally_crypto::{keypair_from_seed, sign_payload, WalletKeys};
use tally_ledger::canonical_payload;
use tally_ledger::dto::{CommitRequest, TransferRequest};
use tally_node::{LedgerNode, LevyConfig, LevyScheduler, NodeConfig};
use tally_types::Amount;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config(dir: &tempfile::TempDir, system: &WalletKeys) -> NodeConfig {
    NodeConfig {
        data_dir: dir.path().to_path_buf(),
        map_size_mb: 64,
        difficulty: 2,
        work_threads: 2,
        levy: LevyConfig {
            enabled: true,
            system_wallet: Some(system.wallet_id().to_hex()),
            ..LevyConfig::default()
        },
        ..NodeConfig::default()
    }
}

fn signed(from: &WalletKeys, to: &WalletKeys, amount: i64, nonce: &str) -> TransferRequest {
    let (f, t) = (from.wallet_id().to_hex(), to.wallet_id().to_hex());
    let ts = "2024-05-01T12:00:00Z";
    let note = "invoice 7";
    let sig = sign_payload(
        &from.signing_key,
        canonical_payload(&f, &t, amount, ts, note).as_bytes(),
    );
    TransferRequest {
        from: f,
        to: t,
        amount,
        fee: None,
        nonce: nonce.into(),
        timestamp: ts.into(),
        note: note.into(),
        signature_r: sig.r_hex(),
        signature_s: sig.s_hex(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_pipeline_persists_across_restart() {
    let dir = tempfile::tempdir().expect("temp dir");
    let system = keypair_from_seed(&[9; 32]).unwrap();
    let alice = keypair_from_seed(&[1; 32]).unwrap();
    let bob = keypair_from_seed(&[2; 32]).unwrap();

    {
        let node = Arc::new(LedgerNode::open(config(&dir, &system)).expect("open node"));
        for (owner, keys) in [("system", &system), ("alice", &alice), ("bob", &bob)] {
            node.register_wallet(owner.into(), keys.public_key.clone(), vec![])
                .await
                .unwrap();
        }
        node.fund_wallet(alice.wallet_id(), Amount::new(2_000))
            .await
            .unwrap();

        let t1 = node
            .submit_transfer("alice".into(), signed(&alice, &bob, 600, "inv-1"))
            .await
            .unwrap();
        let t2 = node
            .submit_transfer("alice".into(), signed(&alice, &bob, 400, "inv-2"))
            .await
            .unwrap();

        let block = node.commit_pending(CommitRequest::default()).await.unwrap();
        assert_eq!(block.height, 0);
        assert_eq!(block.prev_hash, "0");
        assert_eq!(block.tx_ids, vec![t1.tx_id, t2.tx_id]);
        assert!(block.hash.starts_with("00"));

        let levy = LevyScheduler::new(node.clone()).unwrap().tick().await.unwrap();
        assert_eq!(levy.levies.len(), 2);
        let levy_block = levy.block.expect("levy block");
        assert_eq!(levy_block.height, 1);
        assert_eq!(levy_block.prev_hash, block.hash);

        let report = node.validate_chain().await.unwrap();
        assert!(report.valid, "{:?}", report.errors);
        assert_eq!(report.checked_blocks, 2);
        node.stop();
    }

    let node = LedgerNode::open(config(&dir, &system)).expect("reopen node");
    let report = node.validate_chain().await.unwrap();
    assert!(report.valid, "{:?}", report.errors);
    assert_eq!(report.last_height, 1);
    assert_eq!(node.metrics().chain_height.get(), 1);

    let bob_id = bob.wallet_id();
    let bob_balance = node
        .query(move |e| e.wallet_balance(&bob_id))
        .await
        .unwrap();
    // 1000 received, 2.5% levied
    assert_eq!(bob_balance.balance, 975);

    let history = node
        .query(move |e| e.wallet_transactions(&bob_id, 0))
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].provenance, "system_issued");
    assert_eq!(history[0].status, "committed");
}

#[tokio::test]
async fn replayed_nonce_is_not_applied_twice() {
    let dir = tempfile::tempdir().expect("temp dir");
    let system = keypair_from_seed(&[9; 32]).unwrap();
    let alice = keypair_from_seed(&[1; 32]).unwrap();
    let bob = keypair_from_seed(&[2; 32]).unwrap();
    let node = LedgerNode::open(config(&dir, &system)).unwrap();
    node.register_wallet("alice".into(), alice.public_key.clone(), vec![])
        .await
        .unwrap();
    node.register_wallet("bob".into(), bob.public_key.clone(), vec![])
        .await
        .unwrap();
    node.fund_wallet(alice.wallet_id(), Amount::new(600))
        .await
        .unwrap();

    let first = node
        .submit_transfer("alice".into(), signed(&alice, &bob, 500, "n-1"))
        .await
        .unwrap();
    let second = node
        .submit_transfer("alice".into(), signed(&alice, &bob, 500, "n-1"))
        .await
        .unwrap();
    assert_eq!(first, second);

    let alice_id = alice.wallet_id();
    let balance = node
        .query(move |e| e.wallet_balance(&alice_id))
        .await
        .unwrap();
    assert_eq!(balance.balance, 95);
    assert_eq!(node.metrics().transfers_replayed.get(), 1);
}
