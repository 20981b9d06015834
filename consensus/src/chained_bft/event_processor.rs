// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{
    chained_bft::{
        block_storage::{BlockStore, VoteReceptionResult},
        liveness::{
            leader_election::LeaderElection,
            pacemaker::Pacemaker,
            pending_timeouts::TimeoutReceptionResult,
        },
        network::NetworkSender,
        ConsensusError,
    },
    counters,
};
use anyhow::ensure;
use chainbft_crypto::{Identifier, KeyStore};
use consensus_types::{
    block::Block,
    common::{NodeId, View},
    msg::ConsensusMsg,
    quorum_cert::QuorumCert,
    timeout::Timeout,
    timeout_certificate::TimeoutCert,
    transaction::Transaction,
    vote::Vote,
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// The safety driver. Applies blocks, votes, certificates and timeouts to
/// the replica state in arrival order; the replica event loop is the
/// single caller, which serializes every mutation.
///
/// Monotone state: `cur_view` (via the pacemaker), `high_qc.view`,
/// `last_voted_view`, `preferred_view`. Any observation that would move
/// one of them backwards is dropped.
pub struct EventProcessor {
    node_id: NodeId,
    block_store: Arc<BlockStore>,
    pacemaker: Pacemaker,
    election: Arc<dyn LeaderElection>,
    keys: Arc<KeyStore>,
    network: NetworkSender,
    last_voted_view: View,
    preferred_view: View,
    last_proposed_view: View,
    high_qc: QuorumCert,
    /// Orphans keyed by the view of the parent they await.
    buffered_blocks: HashMap<View, Block>,
    /// Certificates that arrived ahead of their block.
    buffered_qcs: HashMap<Identifier, QuorumCert>,
    committed_tx: mpsc::Sender<Block>,
    forked_tx: Option<mpsc::Sender<Block>>,
}

impl EventProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node_id: NodeId,
        block_store: Arc<BlockStore>,
        pacemaker: Pacemaker,
        election: Arc<dyn LeaderElection>,
        keys: Arc<KeyStore>,
        network: NetworkSender,
        committed_tx: mpsc::Sender<Block>,
        forked_tx: Option<mpsc::Sender<Block>>,
    ) -> Self {
        EventProcessor {
            node_id,
            block_store,
            pacemaker,
            election,
            keys,
            network,
            last_voted_view: 0,
            preferred_view: 0,
            last_proposed_view: 0,
            high_qc: QuorumCert::genesis(),
            buffered_blocks: HashMap::new(),
            buffered_qcs: HashMap::new(),
            committed_tx,
            forked_tx,
        }
    }

    /// Single exhaustive dispatch over the closed message union.
    pub async fn process_message(&mut self, msg: ConsensusMsg) {
        match msg {
            ConsensusMsg::Proposal(block) => self.process_block(block).await,
            ConsensusMsg::Vote(vote) => self.process_vote(vote).await,
            ConsensusMsg::Certificate(qc) => self.process_certificate(qc).await,
            ConsensusMsg::Timeout(tmo) => self.process_remote_timeout(tmo).await,
            ConsensusMsg::TimeoutCert(tc) => self.process_tc(&tc),
            // Transactions are classified away by the receive task; one
            // landing here is a routing bug, not a protocol event.
            stray @ (ConsensusMsg::Transaction(_) | ConsensusMsg::TransactionReply(_)) => {
                error!(
                    "[{}] {} reached the dispatch queue",
                    self.node_id,
                    stray.name()
                );
            }
        }
    }

    /// Stores the proposal, votes for at most one block per view, and
    /// sends the vote to the aggregator of the next view.
    pub async fn process_block(&mut self, block: Block) {
        debug!(
            "[{}] is processing block from {}, view: {}, id: {}",
            self.node_id,
            block.proposer(),
            block.view(),
            block.id().short_str()
        );

        // The proposer field is an unauthenticated claim; the signature is
        // checked on every path, self-delivered proposals included.
        if !self
            .keys
            .verify(block.sig(), block.id().as_bytes(), block.proposer().id())
        {
            warn!(
                "[{}] proposal from {} carries an invalid signature",
                self.node_id,
                block.proposer()
            );
            return;
        }

        // A block whose parent has not arrived waits under the parent's
        // view; processing the parent drains it.
        if !self.block_store.block_exists(&block.qc().block_id()) {
            debug!(
                "[{}] parent of block {} is missing, buffering",
                self.node_id,
                block.id().short_str()
            );
            self.buffered_blocks.insert(block.qc().view(), block);
            return;
        }

        self.block_store.insert_block(block.clone());

        if let Some(qc) = self.buffered_qcs.remove(&block.id()) {
            self.process_certificate(qc).await;
        }

        // `last_voted_view` is monotone: at most one vote per view.
        if block.view() > self.last_voted_view {
            self.last_voted_view = block.view();
            match Vote::new(block.view(), self.node_id, block.id(), &self.keys) {
                Ok(vote) => {
                    let aggregator = self.election.leader_for(block.view() + 1);
                    if aggregator == self.node_id {
                        debug!(
                            "[{}] vote is sent to itself, id: {}",
                            self.node_id,
                            vote.block_id().short_str()
                        );
                        self.process_vote(vote).await;
                    } else {
                        debug!(
                            "[{}] vote is sent to {}, id: {}",
                            self.node_id,
                            aggregator,
                            vote.block_id().short_str()
                        );
                        self.network.send(aggregator, ConsensusMsg::Vote(vote)).await;
                    }
                }
                Err(e) => error!("[{}] cannot sign a vote: {}", self.node_id, e),
            }
        }

        if let Some(orphan) = self.buffered_blocks.remove(&block.view()) {
            Box::pin(self.process_block(orphan)).await;
        }
    }

    /// Any replica may run vote aggregation; only the leader of
    /// `vote.view + 1` ever collects a supermajority.
    pub async fn process_vote(&mut self, vote: Vote) {
        debug!(
            "[{}] is processing the vote, block id: {}",
            self.node_id,
            vote.block_id().short_str()
        );

        // The voter field is an unauthenticated claim; a forged vote must
        // never count toward a quorum, so every vote is verified.
        if !self
            .keys
            .verify(vote.signature(), vote.block_id().as_bytes(), vote.voter().id())
        {
            warn!(
                "[{}] {}",
                self.node_id,
                ConsensusError::InvalidVote(vote.voter().id())
            );
            return;
        }

        match self.block_store.insert_vote(&vote) {
            VoteReceptionResult::NewQuorumCertificate(mut qc) => {
                qc.set_leader(self.node_id);
                self.process_certificate(qc).await;
            }
            VoteReceptionResult::VoteAdded(count) => {
                debug!(
                    "[{}] not sufficient votes to build a QC, block id: {}, count: {}",
                    self.node_id,
                    vote.block_id().short_str(),
                    count
                );
            }
            VoteReceptionResult::DuplicateVote | VoteReceptionResult::QcAlreadyFormed => {
                debug!(
                    "[{}] vote for {} is dropped",
                    self.node_id,
                    vote.block_id().short_str()
                );
            }
        }
    }

    /// Applies a quorum certificate: advances the view, raises the
    /// high-QC, and evaluates the three-chain commit rule.
    pub async fn process_certificate(&mut self, qc: QuorumCert) {
        debug!(
            "[{}] is processing a QC, view: {}, block id: {}",
            self.node_id,
            qc.view(),
            qc.block_id().short_str()
        );

        if qc.view() < self.pacemaker.cur_view() {
            debug!(
                "[{}] {}",
                self.node_id,
                ConsensusError::StaleView(qc.view(), self.pacemaker.cur_view())
            );
            return;
        }
        if qc.leader() != self.node_id && !qc.is_genesis() {
            let signers: Vec<u64> = qc.signers().iter().map(|s| s.id()).collect();
            if !self
                .keys
                .verify_quorum(qc.agg_sig(), qc.block_id().as_bytes(), &signers)
            {
                warn!(
                    "[{}] received a quorum with invalid signatures: {}",
                    self.node_id,
                    ConsensusError::InvalidQuorum(qc.block_id())
                );
                return;
            }
        }

        // Certificates can outrun their block; park them until it arrives.
        if !self.block_store.block_exists(&qc.block_id()) {
            debug!(
                "[{}] QC for missing block {} is buffered",
                self.node_id,
                qc.block_id().short_str()
            );
            self.buffered_qcs.insert(qc.block_id(), qc);
            return;
        }

        self.pacemaker.advance_view(qc.view());
        self.update_high_qc(qc.clone());
        self.update_preferred_view(&qc);
        if qc.view() < 3 {
            return;
        }

        let committable = match self.commit_rule(&qc) {
            Ok(Some(block)) => block,
            Ok(None) => return,
            Err(e) => {
                debug!("[{}] cannot commit any block: {}", self.node_id, e);
                return;
            }
        };
        match self
            .block_store
            .commit_block(committable.id(), self.pacemaker.cur_view())
        {
            Ok((committed, forked)) => {
                for block in committed {
                    debug!("[{}] committed {}", self.node_id, block);
                    counters::LAST_COMMITTED_VIEW.set(block.view() as i64);
                    counters::COMMITTED_BLOCKS_COUNT.inc();
                    if self.committed_tx.send((*block).clone()).await.is_err() {
                        warn!("[{}] committed sink is closed", self.node_id);
                    }
                }
                for block in forked {
                    counters::FORKED_BLOCKS_COUNT.inc();
                    if let Some(tx) = &self.forked_tx {
                        if tx.send((*block).clone()).await.is_err() {
                            warn!("[{}] forked sink is closed", self.node_id);
                        }
                    }
                }
            }
            Err(e) => error!("[{}] cannot commit blocks, {}", self.node_id, e),
        }
    }

    /// Three-chain rule: a QC over B at view v commits G = parent(parent(B))
    /// iff the three views are consecutive.
    fn commit_rule(&self, qc: &QuorumCert) -> anyhow::Result<Option<Arc<Block>>> {
        let parent = self.block_store.get_parent(&qc.block_id())?;
        let grandparent = self.block_store.get_parent(&parent.id())?;
        if grandparent.view() + 1 == parent.view() && parent.view() + 1 == qc.view() {
            Ok(Some(grandparent))
        } else {
            Ok(None)
        }
    }

    fn update_high_qc(&mut self, qc: QuorumCert) {
        if qc.view() > self.high_qc.view() {
            self.high_qc = qc;
        }
    }

    /// Tracks the two-chain head: the parent of the newest certified
    /// block. Bookkeeping only; the voting rule is `last_voted_view`.
    fn update_preferred_view(&mut self, qc: &QuorumCert) {
        if qc.view() <= 2 {
            return;
        }
        if let Ok(parent) = self.block_store.get_parent(&qc.block_id()) {
            if parent.view() > self.preferred_view {
                self.preferred_view = parent.view();
            }
        }
    }

    /// Catches the replica up from the carried high-QC, then feeds the
    /// timeout to the accumulator.
    pub async fn process_remote_timeout(&mut self, tmo: Timeout) {
        debug!(
            "[{}] is processing tmo from {}",
            self.node_id,
            tmo.node_id()
        );
        self.process_certificate(tmo.high_qc().clone()).await;
        match self.pacemaker.process_remote_timeout(&tmo) {
            TimeoutReceptionResult::NewTimeoutCertificate(tc) => {
                debug!(
                    "[{}] a tc is built for view {}",
                    self.node_id,
                    tc.view()
                );
                self.process_tc(&tc);
            }
            TimeoutReceptionResult::TimeoutAdded(_)
            | TimeoutReceptionResult::DuplicateTimeout
            | TimeoutReceptionResult::TcAlreadyFormed => {}
        }
    }

    /// The view timer ran out: give up on `view`, tell everyone, and count
    /// our own voice toward the certificate.
    pub async fn process_local_timeout(&mut self, view: View) {
        warn!("[{}] timed out at view {}", self.node_id, view);
        counters::TIMEOUT_COUNT.inc();
        self.pacemaker.advance_view(view);
        let tmo = Timeout::new(view + 1, self.node_id, self.high_qc.clone());
        self.network
            .broadcast(ConsensusMsg::Timeout(tmo.clone()))
            .await;
        self.process_remote_timeout(tmo).await;
    }

    /// A certificate that a supermajority gave up on the previous view:
    /// enter the certified view if we are not already there.
    pub fn process_tc(&mut self, tc: &TimeoutCert) {
        if tc.view() <= self.pacemaker.cur_view() {
            return;
        }
        self.pacemaker.advance_view(tc.view() - 1);
    }

    /// Builds the proposal for `view`, always extending the high-QC; no
    /// lower-view fork is ever chosen. At most one block per view.
    pub fn make_proposal(&mut self, view: View, payload: Vec<Transaction>) -> anyhow::Result<Block> {
        ensure!(
            view > self.last_proposed_view,
            "already proposed in view {}",
            self.last_proposed_view
        );
        let qc = self.high_qc.clone();
        let prev_id = qc.block_id();
        let block = Block::new(view, qc, prev_id, payload, self.node_id, &self.keys)?;
        self.last_proposed_view = view;
        counters::PROPOSALS_COUNT.inc();
        Ok(block)
    }

    /// One-line health summary for the admin surface.
    pub fn chain_status(&self) -> String {
        format!(
            "[{}] The current view is: {}, chain growth rate is: {:.3}, ave block interval is: {:?}",
            self.node_id,
            self.pacemaker.cur_view(),
            self.block_store.chain_growth(),
            self.block_store.block_intervals()
        )
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn cur_view(&self) -> View {
        self.pacemaker.cur_view()
    }

    pub fn high_qc(&self) -> &QuorumCert {
        &self.high_qc
    }

    pub fn last_voted_view(&self) -> View {
        self.last_voted_view
    }

    pub fn preferred_view(&self) -> View {
        self.preferred_view
    }

    pub fn block_store(&self) -> &Arc<BlockStore> {
        &self.block_store
    }

    pub fn is_leader(&self, view: View) -> bool {
        self.election.is_leader(self.node_id, view)
    }

    /// Spawns the pacemaker's view timer; see [`Pacemaker::spawn_timer`].
    pub fn spawn_timer(&self, timeout_tx: mpsc::Sender<View>) -> tokio::task::JoinHandle<()> {
        self.pacemaker.spawn_timer(timeout_tx)
    }
}
