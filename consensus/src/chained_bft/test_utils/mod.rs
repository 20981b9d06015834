// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::chained_bft::{
    block_storage::BlockStore,
    event_processor::EventProcessor,
    liveness::{
        leader_election::{LeaderElection, RotatingLeader},
        pacemaker::Pacemaker,
    },
    network::NetworkSender,
};
use chainbft_crypto::{KeyStore, SignatureScheme};
use consensus_types::{
    block::Block,
    common::{NodeId, View},
    msg::ConsensusMsg,
    quorum_cert::QuorumCert,
    transaction::Transaction,
    vote::Vote,
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::mpsc;

pub fn key_store(n: usize) -> Arc<KeyStore> {
    Arc::new(KeyStore::generate(SignatureScheme::EcdsaP256, n).unwrap())
}

/// Installs a subscriber so failing tests print the replica logs; later
/// calls are no-ops.
pub fn setup_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// A certificate over `block` carrying valid signatures from the whole
/// fleet.
pub fn gen_qc(keys: &KeyStore, block: &Block) -> QuorumCert {
    if block.is_genesis() {
        return QuorumCert::genesis();
    }
    let signers: Vec<NodeId> = (1..=keys.fleet_size() as u64).map(NodeId::new).collect();
    let agg_sig = signers
        .iter()
        .map(|signer| keys.sign(block.id().as_bytes(), signer.id()).unwrap())
        .collect();
    QuorumCert::new(block.view(), block.id(), signers, agg_sig)
}

/// A block at `view` extending `parent`, proposed and signed by the
/// rotating leader of `view`, with its parent certified by the full fleet.
pub fn gen_block(keys: &KeyStore, parent: &Block, view: View, payload: Vec<Transaction>) -> Block {
    let election = RotatingLeader::new(keys.fleet_size() as u64);
    let qc = gen_qc(keys, parent);
    Block::new(view, qc, parent.id(), payload, election.leader_for(view), keys).unwrap()
}

pub fn gen_vote(keys: &KeyStore, voter: u64, block: &Block) -> Vote {
    Vote::new(block.view(), NodeId::new(voter), block.id(), keys).unwrap()
}

/// Builds chains inside a block store without a driver in the loop.
pub struct TreeInserter {
    keys: Arc<KeyStore>,
    store: BlockStore,
}

impl TreeInserter {
    pub fn new(keys: Arc<KeyStore>, store: BlockStore) -> Self {
        TreeInserter { keys, store }
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn make_block(&mut self, parent: &Block, view: View, payload: Vec<Transaction>) -> Block {
        gen_block(&self.keys, parent, view, payload)
    }

    pub fn insert_block(
        &mut self,
        parent: &Block,
        view: View,
        payload: Vec<Transaction>,
    ) -> Arc<Block> {
        let block = self.make_block(parent, view, payload);
        self.store.insert_block(block.clone());
        self.store.get_block(&block.id()).unwrap()
    }

    /// A sibling with a marker payload, for building forks at a shared
    /// view without colliding ids.
    pub fn insert_block_with_payload_marker(
        &mut self,
        parent: &Block,
        view: View,
        marker: &str,
    ) -> Arc<Block> {
        self.insert_block(parent, view, vec![Transaction::new(marker, vec![])])
    }
}

/// Auxiliary struct that sets up a single driver with captured outbound
/// channels, so tests can feed events directly and observe everything the
/// node sends and commits.
pub struct NodeSetup {
    pub event_processor: EventProcessor,
    pub keys: Arc<KeyStore>,
    pub committed_rx: mpsc::Receiver<Block>,
    pub forked_rx: mpsc::Receiver<Block>,
    pub new_view_rx: mpsc::UnboundedReceiver<View>,
    pub peer_rx: HashMap<NodeId, mpsc::Receiver<ConsensusMsg>>,
}

impl NodeSetup {
    pub fn new(node_id: u64, n: usize, election: Arc<dyn LeaderElection>) -> Self {
        let keys = key_store(n);
        let mut peers = HashMap::new();
        let mut peer_rx = HashMap::new();
        for peer in 1..=n as u64 {
            let (tx, rx) = mpsc::channel(64);
            peers.insert(NodeId::new(peer), tx);
            peer_rx.insert(NodeId::new(peer), rx);
        }
        let (new_view_tx, new_view_rx) = mpsc::unbounded_channel();
        let (committed_tx, committed_rx) = mpsc::channel(64);
        let (forked_tx, forked_rx) = mpsc::channel(64);
        let pacemaker = Pacemaker::new(n, Duration::from_secs(60), new_view_tx);
        let event_processor = EventProcessor::new(
            NodeId::new(node_id),
            Arc::new(BlockStore::new(n)),
            pacemaker,
            election,
            keys.clone(),
            NetworkSender::new(NodeId::new(node_id), peers),
            committed_tx,
            Some(forked_tx),
        );
        NodeSetup {
            event_processor,
            keys,
            committed_rx,
            forked_rx,
            new_view_rx,
            peer_rx,
        }
    }

    /// Next protocol message this node sent to `peer`, if any is queued.
    pub fn sent_to(&mut self, peer: u64) -> Option<ConsensusMsg> {
        self.peer_rx
            .get_mut(&NodeId::new(peer))
            .and_then(|rx| rx.try_recv().ok())
    }

    /// Next committed block, if any is queued.
    pub fn next_committed(&mut self) -> Option<Block> {
        self.committed_rx.try_recv().ok()
    }
}
