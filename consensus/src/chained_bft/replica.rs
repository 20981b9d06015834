// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::chained_bft::{
    block_storage::BlockStore,
    event_processor::EventProcessor,
    liveness::{leader_election::RotatingLeader, pacemaker::Pacemaker},
    network::{ForwardTable, NetworkSender, NetworkTask},
};
use chainbft_config::{ByzantineStrategy, NodeConfig};
use chainbft_crypto::KeyStore;
use consensus_types::{
    block::Block,
    common::{NodeId, View},
    msg::ConsensusMsg,
    transaction::Transaction,
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[cfg(test)]
#[path = "replica_test.rs"]
mod replica_test;

/// One replica: the safety driver plus the tasks that feed it.
///
/// The event loop is the single consumer of the dispatch queue, the
/// pacemaker's new-view events, and the timer; that loop serializes every
/// touch of the driver state. The receive task classifies raw inbound
/// traffic, and the transaction queue fills the proposer's payload buffer.
pub struct Replica {
    node_id: NodeId,
    event_processor: EventProcessor,
    network_task: Option<NetworkTask>,
    dispatch_rx: mpsc::Receiver<ConsensusMsg>,
    txn_rx: mpsc::Receiver<Transaction>,
    new_view_rx: mpsc::UnboundedReceiver<View>,
    timeout_tx: mpsc::Sender<View>,
    timeout_rx: mpsc::Receiver<View>,
    network: NetworkSender,
    forwards: ForwardTable,
    payload_buf: Vec<Transaction>,
}

impl Replica {
    /// Builds a replica from configuration. `inbound_rx` is the stream the
    /// socket layer feeds; `peers` maps every fleet member to its inbound
    /// channel; committed (and optionally forked) blocks go to the sinks.
    pub fn new(
        node_id: NodeId,
        config: &NodeConfig,
        inbound_rx: mpsc::Receiver<ConsensusMsg>,
        peers: HashMap<NodeId, mpsc::Sender<ConsensusMsg>>,
        committed_tx: mpsc::Sender<Block>,
        forked_tx: Option<mpsc::Sender<Block>>,
    ) -> anyhow::Result<Self> {
        let n = config.consensus.n;
        let keys = Arc::new(KeyStore::generate(config.consensus.signature_scheme, n)?);
        let buffer = config.network.chan_buffer_size;

        let (dispatch_tx, dispatch_rx) = mpsc::channel(buffer);
        let (txn_tx, txn_rx) = mpsc::channel(buffer);
        let (new_view_tx, new_view_rx) = mpsc::unbounded_channel();
        let (timeout_tx, timeout_rx) = mpsc::channel(16);

        let network = NetworkSender::new(node_id, peers);
        let forwards = ForwardTable::default();
        let silent = config.is_byzantine(node_id.id())
            && matches!(config.test.strategy, ByzantineStrategy::Silence);
        let network_task = NetworkTask::new(
            node_id,
            inbound_rx,
            dispatch_tx,
            txn_tx,
            forwards.clone(),
            None,
            silent,
        );

        let pacemaker = Pacemaker::new(
            n,
            Duration::from_millis(config.consensus.pacemaker_timeout_ms),
            new_view_tx,
        );
        let event_processor = EventProcessor::new(
            node_id,
            Arc::new(BlockStore::new(n)),
            pacemaker,
            Arc::new(RotatingLeader::new(n as u64)),
            keys,
            network.clone(),
            committed_tx,
            forked_tx,
        );

        Ok(Replica {
            node_id,
            event_processor,
            network_task: Some(network_task),
            dispatch_rx,
            txn_rx,
            new_view_rx,
            timeout_tx,
            timeout_rx,
            network,
            forwards,
            payload_buf: vec![],
        })
    }

    /// Records a client transaction as forwarded and hands it to `peer`.
    /// The matching reply resolves the bookkeeping in the receive task.
    pub async fn forward(&mut self, peer: NodeId, mut txn: Transaction) {
        txn.forwarder = Some(self.node_id);
        self.forwards.record(txn.clone());
        self.network.send(peer, ConsensusMsg::Transaction(txn)).await;
    }

    /// Runs the replica until its inbound stream closes, then drains the
    /// queued events and exits. Nothing is persisted.
    pub async fn start(mut self) {
        info!("[{}] replica starting", self.node_id);
        let network_task = self
            .network_task
            .take()
            .expect("start may only be called once");
        tokio::spawn(network_task.start());
        let _timer = self.event_processor.spawn_timer(self.timeout_tx.clone());

        // The pacemaker opens in view 1; its leader proposes right away.
        self.process_new_view(1).await;

        loop {
            tokio::select! {
                Some(view) = self.new_view_rx.recv() => {
                    self.process_new_view(view).await;
                }
                maybe_msg = self.dispatch_rx.recv() => match maybe_msg {
                    Some(msg) => self.event_processor.process_message(msg).await,
                    None => break,
                },
                Some(view) = self.timeout_rx.recv() => {
                    self.event_processor.process_local_timeout(view).await;
                }
                Some(txn) = self.txn_rx.recv() => {
                    self.payload_buf.push(txn);
                }
            }
        }
        info!(
            "[{}] replica shutting down; {}",
            self.node_id,
            self.event_processor.chain_status()
        );
    }

    /// Entering a view we lead: drain the payload buffer into a proposal
    /// extending the high-QC, broadcast it, and process it ourselves.
    async fn process_new_view(&mut self, view: View) {
        if !self.event_processor.is_leader(view) {
            return;
        }
        let payload = std::mem::take(&mut self.payload_buf);
        match self.event_processor.make_proposal(view, payload) {
            Ok(block) => {
                self.network
                    .broadcast(ConsensusMsg::Proposal(block.clone()))
                    .await;
                self.event_processor.process_block(block).await;
            }
            Err(e) => warn!("[{}] no proposal for view {}: {}", self.node_id, view, e),
        }
    }
}
