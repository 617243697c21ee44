//! End-to-end auction settlement over the public crate API.
//!
//! These tests exercise the crate the way a running node does: auctions
//! open, bids arrive, the queue drains into blocks, and closing an
//! auction settles the winner under whichever engine their earned
//! trust selects.
//!
//! Properties verified:
//! - **Lifecycle**: listing, bidding, draining, and settlement land on
//!   the chain in order, with each commit moving trust exactly once
//! - **Promotion**: repeated honest wins cross the trust threshold and
//!   flip the ledger to Proof-of-Reputation, after which settlement
//!   does no mining
//! - **Locality**: trust is a per-node judgment; adoption and relays
//!   move blocks between nodes, never scores

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock};

use tokio::sync::RwLock;

use meritnet::auction::{AuctionError, AuctionManager, Bid, PenaltyPolicy};
use meritnet::consensus::Consensus;
use meritnet::crypto::Keypair;
use meritnet::ledger::Blockchain;
use meritnet::reputation::ReputationEngine;

// ── Helpers ─────────────────────────────────────────────────────────────

/// RSA generation is slow, so every simulated node shares one cached
/// keypair; identities are told apart by name, not key
fn test_keypair() -> Arc<Keypair> {
    static KEYPAIR: OnceLock<Arc<Keypair>> = OnceLock::new();
    Arc::clone(KEYPAIR.get_or_init(|| Arc::new(Keypair::generate().expect("keygen"))))
}

struct TestNode {
    manager: AuctionManager,
    reputation: Arc<ReputationEngine>,
    chain: Arc<RwLock<Blockchain>>,
}

fn spawn_node(local_id: &str) -> TestNode {
    let reputation = Arc::new(ReputationEngine::default());
    let chain = Arc::new(RwLock::new(Blockchain::new(Arc::clone(&reputation))));
    let manager = AuctionManager::new(
        Arc::clone(&chain),
        Arc::clone(&reputation),
        test_keypair(),
        local_id.to_string(),
        PenaltyPolicy::default(),
    );
    TestNode {
        manager,
        reputation,
        chain,
    }
}

fn approx(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-6, "expected {b}, got {a}");
}

// ── Lifecycle ───────────────────────────────────────────────────────────

/// The full path from listing to settlement: bids queue as signed
/// transactions, the production loop drains them into a mined block,
/// and closing commits a settlement block for the highest bid.
#[tokio::test]
async fn test_auction_lifecycle_settles_on_chain() {
    let node = spawn_node("seller");
    node.manager.open_auction("lot-1", "walnut desk", 50.0).await;

    node.manager
        .submit_bid(Bid::new("lot-1", "alice", 60.0, 0.5))
        .await
        .unwrap();
    node.manager
        .submit_bid(Bid::new("lot-1", "bob", 75.0, 0.5))
        .await
        .unwrap();

    // Drain the queue the way the node's production loop does
    let cancel = Arc::new(AtomicBool::new(false));
    let block = node
        .manager
        .flush_pending(&cancel)
        .await
        .unwrap()
        .expect("queued bids produce a block");
    assert_eq!(block.transactions.len(), 2);

    // Each committed bid rewards its sender exactly once
    approx(node.reputation.trust_score("alice"), 0.55);
    approx(node.reputation.trust_score("bob"), 0.55);

    assert!(node.manager.close_auction("lot-1").await.unwrap());
    {
        let chain = node.chain.read().await;
        assert_eq!(chain.len(), 3);
        let settlement = &chain.tip().transactions[0];
        assert_eq!(settlement.sender_id, "bob");
        assert!(settlement.payload.contains("\"amount\":75.00"));
    }
    approx(node.reputation.trust_score("bob"), 0.60);

    // The chain agrees on the winner
    let winner = node
        .manager
        .confirmed_winner("lot-1")
        .await
        .expect("confirmed winner");
    assert_eq!(winner.bidder_id, "bob");
    approx(winner.amount, 75.0);
}

// ── Promotion to Proof-of-Reputation ────────────────────────────────────

/// Four settled wins carry a bidder from neutral trust to the
/// threshold; the commit that crosses it flips the engine, and the
/// next settlement is accepted on reputation alone, without mining.
#[tokio::test]
async fn test_repeated_wins_promote_to_reputation_engine() {
    let node = spawn_node("seller");

    for round in 1..=4 {
        let id = format!("lot-{round}");
        node.manager
            .open_auction(id.clone(), "crate of parts", 10.0)
            .await;
        let trust = node.reputation.trust_score("champ");
        node.manager
            .place_bid(Bid::new(id.clone(), "champ", 10.0 + f64::from(round), trust))
            .await
            .unwrap();
        assert!(node.manager.close_auction(&id).await.unwrap());
    }

    assert!(node.reputation.trust_score("champ") >= 0.7);
    assert_eq!(
        node.chain.read().await.active_consensus(),
        Consensus::ProofOfReputation
    );

    // The fifth settlement needs no nonce search: the winner's earned
    // trust is the proof
    node.manager
        .open_auction("lot-5", "crate of parts", 10.0)
        .await;
    let trust = node.reputation.trust_score("champ");
    node.manager
        .place_bid(Bid::new("lot-5", "champ", 99.0, trust))
        .await
        .unwrap();
    assert!(node.manager.close_auction("lot-5").await.unwrap());

    let chain = node.chain.read().await;
    assert_eq!(chain.len(), 6);
    assert_eq!(chain.tip().nonce, 0);
    assert_eq!(chain.tip().transactions[0].sender_id, "champ");
    approx(node.reputation.trust_score("champ"), 0.75);
}

// ── Cross-node behavior ─────────────────────────────────────────────────

/// A joining node adopts the peer's history wholesale, after which
/// relayed blocks commit on both nodes with the same tip, and the
/// gossip echo of an already-known block moves nothing.
#[tokio::test]
async fn test_block_relay_converges_nodes() {
    let a = spawn_node("node-a");
    let b = spawn_node("node-b");

    // Fresh ledgers start from their own genesis, so sync precedes relay
    {
        let blocks = a.chain.read().await.blocks().to_vec();
        b.chain.write().await.replace_chain(blocks).unwrap();
    }

    a.manager.open_auction("lot-1", "kettle", 5.0).await;
    a.manager
        .submit_bid(Bid::new("lot-1", "alice", 8.0, 0.5))
        .await
        .unwrap();
    let cancel = Arc::new(AtomicBool::new(false));
    let block = a
        .manager
        .flush_pending(&cancel)
        .await
        .unwrap()
        .expect("queued bid produces a block");

    b.manager.receive_block(block.clone()).await.unwrap();
    assert_eq!(
        b.chain.read().await.tip().hash,
        a.chain.read().await.tip().hash
    );
    approx(b.reputation.trust_score("alice"), 0.55);

    // The echo is ignored and rewards nothing twice
    b.manager.receive_block(block).await.unwrap();
    assert_eq!(b.chain.read().await.len(), 2);
    approx(b.reputation.trust_score("alice"), 0.55);
}

/// Adopting a finished history converges the ledger but not the
/// scores: reputation only moves for blocks a node itself commits.
#[tokio::test]
async fn test_adoption_moves_blocks_not_trust() {
    let a = spawn_node("node-a");
    let b = spawn_node("node-b");

    a.manager.open_auction("lot-1", "radio", 5.0).await;
    a.manager
        .submit_bid(Bid::new("lot-1", "alice", 9.0, 0.5))
        .await
        .unwrap();
    let cancel = Arc::new(AtomicBool::new(false));
    a.manager
        .flush_pending(&cancel)
        .await
        .unwrap()
        .expect("queued bid produces a block");
    approx(a.reputation.trust_score("alice"), 0.55);

    let blocks = a.chain.read().await.blocks().to_vec();
    b.chain.write().await.replace_chain(blocks).unwrap();

    assert_eq!(b.chain.read().await.len(), 2);
    approx(b.reputation.trust_score("alice"), 0.5);
}

/// A forged relay is judged where it lands: the receiving node marks
/// the claimed sender down, while other nodes keep their own view.
#[tokio::test]
async fn test_forged_relay_is_judged_locally() {
    let a = spawn_node("node-a");
    let b = spawn_node("node-b");

    a.manager.open_auction("lot-1", "lamp", 5.0).await;
    let mut tx = a
        .manager
        .submit_bid(Bid::new("lot-1", "mallory", 9.0, 0.5))
        .await
        .unwrap();
    tx.payload = "AuctionID:lot-1;Amount:900.00;TrustScore:0.99".into();

    let result = b.manager.receive_transaction(tx).await;
    assert!(matches!(result, Err(AuctionError::ForgedSignature(_))));

    approx(b.reputation.trust_score("mallory"), 0.35);
    approx(a.reputation.trust_score("mallory"), 0.5);
}
