// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use consensus_types::{
    common::NodeId,
    msg::ConsensusMsg,
    transaction::{Transaction, TransactionReply},
};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Sender half of the replica's network seam: unicast and broadcast over
/// per-peer bounded channels. Self-addressed traffic never goes through
/// here; the driver self-delivers directly.
#[derive(Clone)]
pub struct NetworkSender {
    node_id: NodeId,
    peers: HashMap<NodeId, mpsc::Sender<ConsensusMsg>>,
}

impl NetworkSender {
    pub fn new(node_id: NodeId, peers: HashMap<NodeId, mpsc::Sender<ConsensusMsg>>) -> Self {
        NetworkSender { node_id, peers }
    }

    pub async fn send(&self, peer: NodeId, msg: ConsensusMsg) {
        let Some(tx) = self.peers.get(&peer) else {
            warn!("[{}] no channel for peer {}", self.node_id, peer);
            return;
        };
        if tx.send(msg).await.is_err() {
            debug!("[{}] peer {} is gone", self.node_id, peer);
        }
    }

    /// Delivers to every peer except self.
    pub async fn broadcast(&self, msg: ConsensusMsg) {
        for (&peer, tx) in &self.peers {
            if peer == self.node_id {
                continue;
            }
            if tx.send(msg.clone()).await.is_err() {
                debug!("[{}] peer {} is gone", self.node_id, peer);
            }
        }
    }
}

/// Bookkeeping for transactions forwarded on a client's behalf; replies
/// are matched back by transaction id.
#[derive(Clone, Default)]
pub struct ForwardTable {
    inner: Arc<Mutex<HashMap<String, Transaction>>>,
}

impl ForwardTable {
    pub fn record(&self, txn: Transaction) {
        self.inner.lock().unwrap().insert(txn.id.clone(), txn);
    }

    pub fn resolve(&self, id: &str) -> Option<Transaction> {
        self.inner.lock().unwrap().remove(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

/// The receive task. Drains inbound messages and classifies them:
/// transactions to the proposer's payload queue, replies to the forwarding
/// bookkeeping, everything else to the dispatch queue in arrival order.
pub struct NetworkTask {
    node_id: NodeId,
    inbound_rx: mpsc::Receiver<ConsensusMsg>,
    dispatch_tx: mpsc::Sender<ConsensusMsg>,
    txn_tx: mpsc::Sender<Transaction>,
    forwards: ForwardTable,
    reply_tx: Option<mpsc::Sender<TransactionReply>>,
    /// Byzantine silence strategy: drop everything on the floor.
    silent: bool,
}

impl NetworkTask {
    pub fn new(
        node_id: NodeId,
        inbound_rx: mpsc::Receiver<ConsensusMsg>,
        dispatch_tx: mpsc::Sender<ConsensusMsg>,
        txn_tx: mpsc::Sender<Transaction>,
        forwards: ForwardTable,
        reply_tx: Option<mpsc::Sender<TransactionReply>>,
        silent: bool,
    ) -> Self {
        NetworkTask {
            node_id,
            inbound_rx,
            dispatch_tx,
            txn_tx,
            forwards,
            reply_tx,
            silent,
        }
    }

    pub async fn start(mut self) {
        while let Some(msg) = self.inbound_rx.recv().await {
            if self.silent {
                continue;
            }
            match msg {
                ConsensusMsg::Transaction(txn) => {
                    // Under saturation the newest transactions are shed;
                    // protocol messages are never dropped.
                    if let Err(e) = self.txn_tx.try_send(txn) {
                        debug!("[{}] transaction queue full, shedding: {}", self.node_id, e);
                    }
                }
                ConsensusMsg::TransactionReply(reply) => match self.forwards.resolve(&reply.id) {
                    Some(txn) => {
                        debug!(
                            "[{}] reply for forwarded transaction {}",
                            self.node_id, txn.id
                        );
                        if let Some(tx) = &self.reply_tx {
                            let _ = tx.send(reply).await;
                        }
                    }
                    None => debug!("[{}] reply {} matches no forward", self.node_id, reply.id),
                },
                protocol_msg => {
                    if self.dispatch_tx.send(protocol_msg).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}
