//! Auction coordination and block production around the ledger.

use std::cmp::Ordering;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{Auction, AuctionError, Bid, PenaltyPolicy};
use crate::consensus::Consensus;
use crate::crypto::Keypair;
use crate::ledger::{AppendError, Blockchain};
use crate::reputation::ReputationEngine;
use crate::types::{Block, Transaction};
use crate::TRUST_THRESHOLD;

/// Coordinates the auction book, the pending-transaction queue, and
/// settlement into the shared ledger.
///
/// The manager drives every trust consequence of auction activity: it
/// applies the [`PenaltyPolicy`] around rejected bids, forged
/// transactions, and refused blocks, while the ledger's own append
/// pipeline handles the one canonical reward for committed
/// transactions.
pub struct AuctionManager {
    chain: Arc<RwLock<Blockchain>>,
    reputation: Arc<ReputationEngine>,
    keypair: Arc<Keypair>,
    local_id: String,
    policy: PenaltyPolicy,
    auctions: Mutex<Vec<Auction>>,
    pending: Mutex<Vec<Transaction>>,
}

impl AuctionManager {
    /// Wire a manager around the shared services
    #[must_use]
    pub fn new(
        chain: Arc<RwLock<Blockchain>>,
        reputation: Arc<ReputationEngine>,
        keypair: Arc<Keypair>,
        local_id: String,
        policy: PenaltyPolicy,
    ) -> Self {
        Self {
            chain,
            reputation,
            keypair,
            local_id,
            policy,
            auctions: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// List an item for sale under the local identity.
    ///
    /// The seller earns the listing bonus at the magnitude of the
    /// currently active engine.
    pub async fn open_auction(
        &self,
        auction_id: impl Into<String>,
        item_name: impl Into<String>,
        min_bid: f64,
    ) -> Auction {
        let auction = Auction::new(auction_id, item_name, min_bid, self.local_id.clone());
        self.auctions
            .lock()
            .expect("auction book lock poisoned")
            .push(auction.clone());

        let engine = self.chain.read().await.active_consensus();
        let bonus = self.policy.listing_bonus.amount(engine);
        let trust = self.reputation.register_success_by(&self.local_id, bonus);
        info!(
            auction = %auction.auction_id,
            item = %auction.item_name,
            bonus,
            trust,
            "auction opened"
        );
        auction
    }

    /// Record an auction announced by another node. Already-known ids
    /// are ignored.
    pub fn register_remote_auction(&self, auction: Auction) {
        let mut auctions = self.auctions.lock().expect("auction book lock poisoned");
        if auctions.iter().any(|known| known.auction_id == auction.auction_id) {
            debug!(auction = %auction.auction_id, "auction already known, ignoring");
            return;
        }
        info!(
            auction = %auction.auction_id,
            seller = %auction.seller_id,
            "remote auction registered"
        );
        auctions.push(auction);
    }

    /// Mark an auction closed on a remote seller's announcement,
    /// without settling anything locally
    pub fn register_remote_close(&self, auction_id: &str) {
        let mut auctions = self.auctions.lock().expect("auction book lock poisoned");
        if let Some(auction) = auctions
            .iter_mut()
            .find(|known| known.auction_id == auction_id)
        {
            auction.finished = true;
            info!(auction = %auction_id, "auction closed by its seller");
        }
    }

    /// Accept a bid into the book.
    ///
    /// A rejected bid costs the bidder reputation at the magnitude the
    /// policy assigns for the reason, under the active engine.
    ///
    /// # Errors
    /// Returns why the bid was refused
    pub async fn place_bid(&self, bid: Bid) -> Result<(), AuctionError> {
        let engine = self.chain.read().await.active_consensus();
        match self.record_bid(&bid) {
            Ok(()) => {
                let trust = self.reputation.trust_score(&bid.bidder_id);
                info!(
                    auction = %bid.auction_id,
                    bidder = %bid.bidder_id,
                    amount = bid.amount,
                    trust,
                    "bid placed"
                );
                Ok(())
            }
            Err(err) => {
                let adjustment = match &err {
                    AuctionError::NotFound(_) => Some(self.policy.unknown_auction),
                    AuctionError::Closed(_) => Some(self.policy.closed_auction),
                    AuctionError::BidTooLow { .. } => Some(self.policy.low_bid),
                    _ => None,
                };
                if let Some(adjustment) = adjustment {
                    let penalty = adjustment.amount(engine);
                    let trust = self.reputation.register_failure_by(&bid.bidder_id, penalty);
                    warn!(
                        auction = %bid.auction_id,
                        bidder = %bid.bidder_id,
                        penalty,
                        trust,
                        %err,
                        "bid rejected"
                    );
                }
                Err(err)
            }
        }
    }

    /// The acceptance checks behind [`Self::place_bid`], in order: the
    /// auction must exist, still be open, and the amount must beat the
    /// current highest. An accepted bid joins the auction's bid list.
    fn record_bid(&self, bid: &Bid) -> Result<(), AuctionError> {
        let mut auctions = self.auctions.lock().expect("auction book lock poisoned");
        let auction = auctions
            .iter_mut()
            .find(|known| known.auction_id == bid.auction_id)
            .ok_or_else(|| AuctionError::NotFound(bid.auction_id.clone()))?;
        if auction.finished {
            return Err(AuctionError::Closed(bid.auction_id.clone()));
        }
        let highest = auction.highest_amount();
        if bid.amount <= highest {
            return Err(AuctionError::BidTooLow {
                amount: bid.amount,
                highest,
            });
        }
        auction.bids.push(bid.clone());
        Ok(())
    }

    /// Place a bid and queue its signed transaction for the next block.
    ///
    /// The transaction names the bidder as sender, carries the bid's
    /// placement timestamp, and is signed under the local key.
    ///
    /// # Errors
    /// Returns why the bid was refused; nothing is queued on rejection
    pub async fn submit_bid(&self, bid: Bid) -> Result<Transaction, AuctionError> {
        self.place_bid(bid.clone()).await?;

        let payload = format!(
            "AuctionID:{};Amount:{:.2};TrustScore:{:.2}",
            bid.auction_id, bid.amount, bid.trust_score
        );
        let tx = Transaction::signed_at(
            bid.bidder_id,
            payload,
            bid.timestamp,
            bid.trust_score,
            &self.keypair,
        );
        self.pending
            .lock()
            .expect("pending queue lock poisoned")
            .push(tx.clone());
        debug!(sender = %tx.sender_id, "bid transaction queued");
        Ok(tx)
    }

    /// Close an auction and settle its winning bid into a block.
    ///
    /// Only the seller closes its own auctions; remote closures arrive
    /// through [`Self::register_remote_close`]. Returns `Ok(false)`
    /// when the auction drew no bids and there is nothing to settle.
    /// The auction stays closed even if settlement is rejected.
    ///
    /// # Errors
    /// Returns why the closure or the settlement was refused
    pub async fn close_auction(&self, auction_id: &str) -> Result<bool, AuctionError> {
        let winning = {
            let mut auctions = self.auctions.lock().expect("auction book lock poisoned");
            let auction = auctions
                .iter_mut()
                .find(|known| known.auction_id == auction_id)
                .ok_or_else(|| AuctionError::NotFound(auction_id.to_owned()))?;
            if auction.finished {
                return Err(AuctionError::Closed(auction_id.to_owned()));
            }
            if auction.seller_id != self.local_id {
                return Err(AuctionError::NotSeller(auction_id.to_owned()));
            }
            auction.finished = true;
            auction.winning_bid().cloned()
        };

        let Some(winning) = winning else {
            info!(auction = %auction_id, "auction closed without bids, nothing to settle");
            return Ok(false);
        };
        info!(
            auction = %auction_id,
            winner = %winning.bidder_id,
            amount = winning.amount,
            "auction closed, settling winning bid"
        );
        self.settle(&winning).await?;
        Ok(true)
    }

    /// Validate and commit a block received from a peer.
    ///
    /// Blocks already on the chain are ignored. A refused block costs
    /// the first carried sender the invalid-block penalty, except when
    /// the producer signature itself fails: an unverifiable producer
    /// leaves the claimed sender unauthenticated, so no penalty target
    /// exists.
    ///
    /// # Errors
    /// Returns the append pipeline's rejection
    pub async fn receive_block(&self, block: Block) -> Result<(), AuctionError> {
        let first_sender = block.transactions.first().map(|tx| tx.sender_id.clone());
        let outcome = {
            let mut chain = self.chain.write().await;
            if chain.contains_block(&block.hash) {
                debug!(hash = %block.hash, "block already on chain, ignoring");
                return Ok(());
            }
            chain.append(block)
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(err) => {
                if !matches!(err, AppendError::BlockSignature(_)) {
                    if let Some(sender) = first_sender {
                        let engine = self.chain.read().await.active_consensus();
                        let penalty = self.policy.invalid_block.amount(engine);
                        let trust = self.reputation.register_failure_by(&sender, penalty);
                        warn!(sender = %sender, penalty, trust, %err, "received block refused");
                    }
                }
                Err(AuctionError::Rejected(err))
            }
        }
    }

    /// Validate a transaction received from a peer and commit it in a
    /// freshly produced block.
    ///
    /// Already-committed and already-processed transactions are ignored
    /// with `Ok(None)`. A forged signature costs the claimed sender the
    /// flat forgery penalty; a block the active engine refuses costs
    /// the sender the rejected-block penalty.
    ///
    /// # Errors
    /// Returns the forgery or the append pipeline's rejection
    pub async fn receive_transaction(
        &self,
        tx: Transaction,
    ) -> Result<Option<Block>, AuctionError> {
        {
            let chain = self.chain.read().await;
            if chain.contains_transaction(&tx) || self.reputation.is_processed(&tx.identity()) {
                debug!(sender = %tx.sender_id, "transaction already settled, ignoring");
                return Ok(None);
            }
        }

        if tx.verify().is_err() {
            let trust = self
                .reputation
                .register_failure_by(&tx.sender_id, self.policy.forged_signature);
            warn!(sender = %tx.sender_id, trust, "transaction signature does not verify");
            return Err(AuctionError::ForgedSignature(tx.sender_id));
        }

        let sender = tx.sender_id.clone();
        match self.produce_and_append(vec![tx]).await {
            Ok(block) => {
                info!(hash = %block.hash, sender = %sender, "received transaction committed");
                Ok(Some(block))
            }
            Err(err) => {
                if matches!(err, AppendError::Consensus(_)) {
                    let engine = self.chain.read().await.active_consensus();
                    let penalty = self.policy.rejected_block.amount(engine);
                    let trust = self.reputation.register_failure_by(&sender, penalty);
                    warn!(sender = %sender, penalty, trust, "produced block refused by consensus");
                }
                Err(AuctionError::Rejected(err))
            }
        }
    }

    /// Drain the queued transactions for block production
    #[must_use]
    pub fn take_pending(&self) -> Vec<Transaction> {
        std::mem::take(&mut *self.pending.lock().expect("pending queue lock poisoned"))
    }

    /// Drain the queue and commit it as a single block under the
    /// active engine.
    ///
    /// `Ok(None)` means there was nothing to do or `cancel` stopped
    /// the search; cancelled transactions go back to the front of the
    /// queue for the next drain.
    ///
    /// # Errors
    /// Returns the pipeline rejection when the produced block is refused
    pub async fn flush_pending(
        &self,
        cancel: &Arc<AtomicBool>,
    ) -> Result<Option<Block>, AuctionError> {
        let pending = self.take_pending();
        if pending.is_empty() {
            return Ok(None);
        }
        info!(
            transactions = pending.len(),
            "producing block from queued transactions"
        );
        match self.commit_with_retry(pending.clone(), cancel).await {
            Ok(Some(block)) => Ok(Some(block)),
            Ok(None) => {
                self.requeue_front(pending);
                Ok(None)
            }
            Err(err) => Err(AuctionError::Rejected(err)),
        }
    }

    fn requeue_front(&self, mut transactions: Vec<Transaction>) {
        let mut queue = self.pending.lock().expect("pending queue lock poisoned");
        transactions.append(&mut queue);
        *queue = transactions;
    }

    /// Snapshot of every known auction
    #[must_use]
    pub fn auctions(&self) -> Vec<Auction> {
        self.auctions
            .lock()
            .expect("auction book lock poisoned")
            .clone()
    }

    /// Snapshot of the auctions still taking bids
    #[must_use]
    pub fn open_auctions(&self) -> Vec<Auction> {
        self.auctions
            .lock()
            .expect("auction book lock poisoned")
            .iter()
            .filter(|auction| !auction.finished)
            .cloned()
            .collect()
    }

    /// Bids for an auction that actually reached the chain, rebuilt
    /// from committed bid transactions
    pub async fn confirmed_bids(&self, auction_id: &str) -> Vec<Bid> {
        let chain = self.chain.read().await;
        chain
            .blocks()
            .iter()
            .flat_map(|block| &block.transactions)
            .filter_map(parse_bid_payload)
            .filter(|bid| bid.auction_id == auction_id)
            .collect()
    }

    /// The highest chain-confirmed bid for an auction
    pub async fn confirmed_winner(&self, auction_id: &str) -> Option<Bid> {
        self.confirmed_bids(auction_id)
            .await
            .into_iter()
            .max_by(|a, b| a.amount.partial_cmp(&b.amount).unwrap_or(Ordering::Equal))
    }

    /// Produce and commit the settlement block for a winning bid.
    ///
    /// The winner's ledger-side trust picks the engine first: a proven
    /// winner settles under Proof-of-Reputation without mining, anyone
    /// else settles under Proof-of-Work. A settlement the active engine
    /// refuses costs the winner reputation under Proof-of-Reputation,
    /// where the claimed trust was the proof.
    async fn settle(&self, winning: &Bid) -> Result<(), AuctionError> {
        let payload = format!(
            "{{\"auctionId\":\"{}\",\"amount\":{:.2},\"trustScore\":{:.2}}}",
            winning.auction_id, winning.amount, winning.trust_score
        );
        let tx = Transaction::signed(
            winning.bidder_id.clone(),
            payload,
            winning.trust_score,
            &self.keypair,
        );

        let trust = self.reputation.trust_score(&winning.bidder_id);
        {
            let mut chain = self.chain.write().await;
            if trust >= TRUST_THRESHOLD {
                chain.set_consensus(Consensus::ProofOfReputation);
            } else {
                chain.set_consensus(Consensus::ProofOfWork);
            }
        }

        match self.produce_and_append(vec![tx]).await {
            Ok(block) => {
                info!(hash = %block.hash, winner = %winning.bidder_id, "settlement committed");
                Ok(())
            }
            Err(err) => {
                let engine = self.chain.read().await.active_consensus();
                if engine == Consensus::ProofOfReputation {
                    let trust = self.reputation.register_failure(&winning.bidder_id);
                    warn!(
                        winner = %winning.bidder_id,
                        trust,
                        "settlement refused under Proof-of-Reputation"
                    );
                }
                Err(AuctionError::Rejected(err))
            }
        }
    }

    /// Produce a block on the current tip and append it, re-deriving
    /// once if another block won the tip in between
    async fn produce_and_append(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<Block, AppendError> {
        self.commit_with_retry(transactions, &Arc::new(AtomicBool::new(false)))
            .await
            .map(|block| block.expect("uncancelled production always yields a block"))
    }

    /// Produce on the current tip under `cancel`, then append. A stale
    /// tip is retried once against the new tip; a cancelled search
    /// reports `Ok(None)`.
    ///
    /// Production runs on the blocking pool under a read guard, so
    /// mining never stalls the async dispatch path and the tip cannot
    /// move mid-search. The race window is between dropping the read
    /// guard and taking the write guard.
    async fn commit_with_retry(
        &self,
        transactions: Vec<Transaction>,
        cancel: &Arc<AtomicBool>,
    ) -> Result<Option<Block>, AppendError> {
        let Some(candidate) = self
            .produce_cancellable(transactions.clone(), Arc::clone(cancel))
            .await
        else {
            return Ok(None);
        };
        let first = {
            let mut chain = self.chain.write().await;
            chain.append(candidate.clone())
        };
        match first {
            Ok(()) => Ok(Some(candidate)),
            Err(AppendError::Linkage) => {
                warn!("chain advanced during production, re-deriving against the new tip");
                let Some(rebuilt) = self
                    .produce_cancellable(transactions, Arc::clone(cancel))
                    .await
                else {
                    return Ok(None);
                };
                let mut chain = self.chain.write().await;
                chain.append(rebuilt.clone()).map(|()| Some(rebuilt))
            }
            Err(err) => Err(err),
        }
    }

    async fn produce_cancellable(
        &self,
        transactions: Vec<Transaction>,
        cancel: Arc<AtomicBool>,
    ) -> Option<Block> {
        let guard = Arc::clone(&self.chain).read_owned().await;
        let keypair = Arc::clone(&self.keypair);
        tokio::task::spawn_blocking(move || {
            guard
                .active_consensus()
                .produce_with_cancel(transactions, &guard, &keypair, &cancel)
        })
        .await
        .expect("block production task panicked")
    }
}

/// Rebuild a [`Bid`] from a committed bid transaction payload
/// (`AuctionID:…;Amount:…;TrustScore:…`). Settlement and other
/// payloads parse as `None`. Decimal commas are tolerated, matching
/// peers that format under a comma locale.
fn parse_bid_payload(tx: &Transaction) -> Option<Bid> {
    let mut auction_id = None;
    let mut amount = None;
    let mut trust_score = None;
    for part in tx.payload.split(';') {
        let (key, value) = part.split_once(':')?;
        match key {
            "AuctionID" => auction_id = Some(value.to_owned()),
            "Amount" => amount = value.replace(',', ".").parse().ok(),
            "TrustScore" => trust_score = value.replace(',', ".").parse().ok(),
            _ => return None,
        }
    }
    Some(Bid {
        auction_id: auction_id?,
        bidder_id: tx.sender_id.clone(),
        amount: amount?,
        timestamp: tx.timestamp,
        trust_score: trust_score?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Signature;
    use std::sync::OnceLock;
    use tokio_test::block_on;

    fn test_keypair() -> Arc<Keypair> {
        static KEYPAIR: OnceLock<Arc<Keypair>> = OnceLock::new();
        Arc::clone(KEYPAIR.get_or_init(|| Arc::new(Keypair::generate().expect("keygen"))))
    }

    fn services() -> (
        AuctionManager,
        Arc<ReputationEngine>,
        Arc<RwLock<Blockchain>>,
    ) {
        let reputation = Arc::new(ReputationEngine::default());
        let chain = Arc::new(RwLock::new(Blockchain::new(Arc::clone(&reputation))));
        let manager = AuctionManager::new(
            Arc::clone(&chain),
            Arc::clone(&reputation),
            test_keypair(),
            "seller-node".into(),
            PenaltyPolicy::default(),
        );
        (manager, reputation, chain)
    }

    #[test]
    fn test_open_auction_rewards_seller() {
        block_on(async {
            let (manager, reputation, _) = services();
            let auction = manager.open_auction("a-1", "lamp", 10.0).await;

            assert_eq!(auction.seller_id, "seller-node");
            assert_eq!(manager.auctions().len(), 1);
            // Listing bonus at the Proof-of-Work magnitude
            assert_eq!(reputation.trust_score("seller-node"), 0.52);
        });
    }

    #[test]
    fn test_remote_auction_registration_is_idempotent() {
        let (manager, reputation, _) = services();
        let auction = Auction::new("a-1", "rug", 5.0, "other-seller");

        manager.register_remote_auction(auction.clone());
        manager.register_remote_auction(auction);

        assert_eq!(manager.auctions().len(), 1);
        assert_eq!(reputation.trust_score("other-seller"), 0.5);
    }

    #[test]
    fn test_bid_on_unknown_auction_penalized() {
        block_on(async {
            let (manager, reputation, _) = services();
            let result = manager.place_bid(Bid::new("ghost", "alice", 10.0, 0.5)).await;

            assert!(matches!(result, Err(AuctionError::NotFound(_))));
            assert_eq!(reputation.trust_score("alice"), 0.47);
        });
    }

    #[test]
    fn test_bid_on_closed_auction_penalized() {
        block_on(async {
            let (manager, reputation, _) = services();
            manager.open_auction("a-1", "lamp", 10.0).await;
            manager.register_remote_close("a-1");

            let result = manager.place_bid(Bid::new("a-1", "alice", 12.0, 0.5)).await;
            assert!(matches!(result, Err(AuctionError::Closed(_))));
            assert_eq!(reputation.trust_score("alice"), 0.48);
        });
    }

    #[test]
    fn test_bid_must_beat_floor_and_highest() {
        block_on(async {
            let (manager, reputation, _) = services();
            manager.open_auction("a-1", "lamp", 10.0).await;

            // Matching the floor is not enough
            let at_floor = manager.place_bid(Bid::new("a-1", "alice", 10.0, 0.5)).await;
            assert!(matches!(
                at_floor,
                Err(AuctionError::BidTooLow { highest, .. }) if highest == 10.0
            ));
            assert_eq!(reputation.trust_score("alice"), 0.48);

            manager
                .place_bid(Bid::new("a-1", "alice", 12.0, 0.5))
                .await
                .unwrap();

            let too_low = manager.place_bid(Bid::new("a-1", "bob", 11.0, 0.5)).await;
            assert!(matches!(
                too_low,
                Err(AuctionError::BidTooLow { highest, .. }) if highest == 12.0
            ));
        });
    }

    #[test]
    fn test_accepted_bids_join_the_book() {
        block_on(async {
            let (manager, _, _) = services();
            manager.open_auction("a-1", "lamp", 10.0).await;

            manager
                .place_bid(Bid::new("a-1", "alice", 12.0, 0.5))
                .await
                .unwrap();
            manager
                .place_bid(Bid::new("a-1", "bob", 14.0, 0.5))
                .await
                .unwrap();

            let book = manager.auctions();
            let bidders: Vec<&str> = book[0]
                .bids
                .iter()
                .map(|bid| bid.bidder_id.as_str())
                .collect();
            assert_eq!(bidders, vec!["alice", "bob"]);
            assert_eq!(book[0].highest_amount(), 14.0);

            // A refused bid leaves the book untouched
            assert!(manager
                .place_bid(Bid::new("a-1", "carol", 13.0, 0.5))
                .await
                .is_err());
            assert_eq!(manager.auctions()[0].bids.len(), 2);
        });
    }

    #[test]
    fn test_submit_bid_queues_signed_transaction() {
        block_on(async {
            let (manager, _, _) = services();
            manager.open_auction("a-1", "lamp", 10.0).await;

            let bid = Bid::new("a-1", "alice", 12.0, 0.5);
            let tx = manager.submit_bid(bid.clone()).await.unwrap();

            assert_eq!(tx.sender_id, "alice");
            assert_eq!(tx.payload, "AuctionID:a-1;Amount:12.00;TrustScore:0.50");
            assert_eq!(tx.timestamp, bid.timestamp);
            assert!(tx.verify().is_ok());

            assert_eq!(manager.take_pending().len(), 1);
            assert!(manager.take_pending().is_empty());
        });
    }

    #[test]
    fn test_rejected_bid_queues_nothing() {
        block_on(async {
            let (manager, _, _) = services();
            let result = manager.submit_bid(Bid::new("ghost", "alice", 10.0, 0.5)).await;

            assert!(result.is_err());
            assert!(manager.take_pending().is_empty());
        });
    }

    #[test]
    fn test_flush_pending_commits_queue() {
        block_on(async {
            let (manager, _, chain) = services();
            manager.open_auction("a-1", "lamp", 10.0).await;
            manager
                .submit_bid(Bid::new("a-1", "alice", 12.0, 0.5))
                .await
                .unwrap();

            let cancel = Arc::new(AtomicBool::new(false));
            let block = manager.flush_pending(&cancel).await.unwrap().unwrap();
            assert_eq!(block.transactions.len(), 1);
            assert_eq!(chain.read().await.len(), 2);

            // Empty queue flushes to nothing
            assert!(manager.flush_pending(&cancel).await.unwrap().is_none());
        });
    }

    #[test]
    fn test_cancelled_flush_requeues_transactions() {
        block_on(async {
            let (manager, _, chain) = services();
            manager.open_auction("a-1", "lamp", 10.0).await;
            manager
                .submit_bid(Bid::new("a-1", "alice", 12.0, 0.5))
                .await
                .unwrap();

            let cancel = Arc::new(AtomicBool::new(true));
            assert!(manager.flush_pending(&cancel).await.unwrap().is_none());
            assert_eq!(chain.read().await.len(), 1);
            // The drained transaction is back for the next attempt
            assert_eq!(manager.take_pending().len(), 1);
        });
    }

    #[test]
    fn test_close_auction_settles_winner() {
        block_on(async {
            let (manager, reputation, chain) = services();
            manager.open_auction("a-1", "lamp", 10.0).await;
            manager
                .place_bid(Bid::new("a-1", "alice", 12.0, 0.5))
                .await
                .unwrap();

            let settled = manager.close_auction("a-1").await.unwrap();
            assert!(settled);

            let chain = chain.read().await;
            assert_eq!(chain.len(), 2);
            let settlement = &chain.tip().transactions[0];
            assert_eq!(settlement.sender_id, "alice");
            assert_eq!(
                settlement.payload,
                "{\"auctionId\":\"a-1\",\"amount\":12.00,\"trustScore\":0.50}"
            );
            assert_eq!(reputation.trust_score("alice"), 0.55);
            assert!(manager.auctions()[0].finished);
        });
    }

    #[test]
    fn test_close_auction_without_bids_settles_nothing() {
        block_on(async {
            let (manager, _, chain) = services();
            manager.open_auction("a-1", "lamp", 10.0).await;

            let settled = manager.close_auction("a-1").await.unwrap();
            assert!(!settled);
            assert_eq!(chain.read().await.len(), 1);

            // Closing twice is refused
            assert!(matches!(
                manager.close_auction("a-1").await,
                Err(AuctionError::Closed(_))
            ));
        });
    }

    #[test]
    fn test_close_is_seller_only() {
        block_on(async {
            let (manager, _, _) = services();
            manager.register_remote_auction(Auction::new("a-1", "rug", 5.0, "other-seller"));

            assert!(matches!(
                manager.close_auction("a-1").await,
                Err(AuctionError::NotSeller(_))
            ));
            assert!(matches!(
                manager.close_auction("ghost").await,
                Err(AuctionError::NotFound(_))
            ));
        });
    }

    #[test]
    fn test_trusted_winner_settles_without_mining() {
        block_on(async {
            let (manager, reputation, chain) = services();
            reputation.register_success_by("alice", 0.25); // 0.75

            manager.open_auction("a-1", "lamp", 10.0).await;
            manager
                .place_bid(Bid::new("a-1", "alice", 12.0, 0.75))
                .await
                .unwrap();

            assert!(manager.close_auction("a-1").await.unwrap());

            let chain = chain.read().await;
            assert_eq!(chain.active_consensus(), Consensus::ProofOfReputation);
            assert_eq!(chain.tip().nonce, 0);
            assert_eq!(reputation.trust_score("alice"), 0.80);
        });
    }

    #[test]
    fn test_receive_block_commits_and_rewards() {
        block_on(async {
            let (manager, reputation, chain) = services();
            let tx = Transaction::signed("peer".into(), "payload".into(), 0.5, &test_keypair());
            let block = {
                let guard = chain.read().await;
                Consensus::ProofOfWork.produce_next(vec![tx], &guard, &test_keypair())
            };

            manager.receive_block(block.clone()).await.unwrap();
            assert_eq!(chain.read().await.len(), 2);
            assert_eq!(reputation.trust_score("peer"), 0.55);

            // A gossip echo of the committed block changes nothing
            manager.receive_block(block).await.unwrap();
            assert_eq!(chain.read().await.len(), 2);
            assert_eq!(reputation.trust_score("peer"), 0.55);
        });
    }

    #[test]
    fn test_receive_block_penalizes_relayed_junk() {
        block_on(async {
            let (manager, reputation, chain) = services();
            chain.write().await.set_consensus(Consensus::ProofOfReputation);

            // Structurally sound, but the producer's trust claim falls
            // short of the active engine's threshold
            let tx = Transaction::signed("peer".into(), "payload".into(), 0.5, &test_keypair());
            let mut block = Block::new(chain.read().await.tip().hash.clone(), vec![tx]);
            block.sign_with(&test_keypair());

            let result = manager.receive_block(block).await;
            assert!(matches!(
                result,
                Err(AuctionError::Rejected(AppendError::Consensus(_)))
            ));
            assert_eq!(reputation.trust_score("peer"), 0.40);
        });
    }

    #[test]
    fn test_receive_block_skips_penalty_without_producer() {
        block_on(async {
            let (manager, reputation, chain) = services();
            let tx = Transaction::signed("peer".into(), "payload".into(), 0.5, &test_keypair());
            let mut block = Block::new(chain.read().await.tip().hash.clone(), vec![tx]);
            block.mine(crate::POW_DIFFICULTY);

            let result = manager.receive_block(block).await;
            assert!(matches!(
                result,
                Err(AuctionError::Rejected(AppendError::BlockSignature(_)))
            ));
            assert_eq!(reputation.trust_score("peer"), 0.5);
        });
    }

    #[test]
    fn test_receive_transaction_commits() {
        block_on(async {
            let (manager, reputation, chain) = services();
            let tx = Transaction::signed("peer".into(), "pay 5".into(), 0.5, &test_keypair());

            let committed = manager.receive_transaction(tx.clone()).await.unwrap();
            assert!(committed.is_some());
            assert_eq!(chain.read().await.len(), 2);
            assert_eq!(reputation.trust_score("peer"), 0.55);

            // Re-observing the same transaction is a no-op
            let again = manager.receive_transaction(tx).await.unwrap();
            assert!(again.is_none());
            assert_eq!(reputation.trust_score("peer"), 0.55);
        });
    }

    #[test]
    fn test_receive_transaction_penalizes_forgery() {
        block_on(async {
            let (manager, reputation, _) = services();
            let mut tx = Transaction::signed("mallory".into(), "pay 5".into(), 0.5, &test_keypair());
            tx.payload = "pay 5000".into();

            let result = manager.receive_transaction(tx).await;
            assert!(matches!(result, Err(AuctionError::ForgedSignature(_))));
            assert_eq!(reputation.trust_score("mallory"), 0.35);
        });
    }

    #[test]
    fn test_receive_transaction_consensus_rejection() {
        block_on(async {
            let (manager, reputation, chain) = services();
            chain.write().await.set_consensus(Consensus::ProofOfReputation);

            // Unproven sender under Proof-of-Reputation
            let tx = Transaction::signed("carol".into(), "pay 5".into(), 0.5, &test_keypair());
            let result = manager.receive_transaction(tx).await;

            assert!(matches!(
                result,
                Err(AuctionError::Rejected(AppendError::Consensus(_)))
            ));
            assert_eq!(reputation.trust_score("carol"), 0.40);
        });
    }

    #[test]
    fn test_confirmed_bids_rebuilt_from_chain() {
        block_on(async {
            let (manager, _, chain) = services();
            manager.open_auction("a-1", "lamp", 10.0).await;
            manager
                .submit_bid(Bid::new("a-1", "alice", 12.0, 0.5))
                .await
                .unwrap();
            manager
                .submit_bid(Bid::new("a-1", "bob", 15.0, 0.5))
                .await
                .unwrap();

            let pending = manager.take_pending();
            let block = {
                let guard = chain.read().await;
                Consensus::ProofOfWork.produce_next(pending, &guard, &test_keypair())
            };
            chain.write().await.append(block).unwrap();

            let confirmed = manager.confirmed_bids("a-1").await;
            assert_eq!(confirmed.len(), 2);

            let winner = manager.confirmed_winner("a-1").await.unwrap();
            assert_eq!(winner.bidder_id, "bob");
            assert_eq!(winner.amount, 15.0);

            assert!(manager.confirmed_bids("other").await.is_empty());
        });
    }

    #[test]
    fn test_bid_payload_parser() {
        let tx = |payload: &str| {
            Transaction::new("alice".into(), payload.into(), 7, Signature::from_bytes(&[1]))
        };

        let bid = parse_bid_payload(&tx("AuctionID:a-1;Amount:12.50;TrustScore:0.80")).unwrap();
        assert_eq!(bid.auction_id, "a-1");
        assert_eq!(bid.bidder_id, "alice");
        assert_eq!(bid.amount, 12.5);
        assert_eq!(bid.trust_score, 0.8);
        assert_eq!(bid.timestamp, 7);

        // Comma-locale peers
        let localized =
            parse_bid_payload(&tx("AuctionID:a-1;Amount:12,50;TrustScore:0,80")).unwrap();
        assert_eq!(localized.amount, 12.5);

        // Settlements and free-form payloads are not bids
        assert!(parse_bid_payload(&tx(
            "{\"auctionId\":\"a-1\",\"amount\":12.00,\"trustScore\":0.50}"
        ))
        .is_none());
        assert!(parse_bid_payload(&tx("hello")).is_none());
        assert!(parse_bid_payload(&tx("AuctionID:a-1;Amount:oops;TrustScore:0.5")).is_none());
    }
}
