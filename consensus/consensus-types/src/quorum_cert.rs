// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::common::{NodeId, View};
use chainbft_crypto::{AggSig, Identifier};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Certifies that a supermajority of replicas voted for `block_id` at
/// `view`. `signers` and `agg_sig` pair up positionally; the order is
/// whatever the aggregating leader observed and need not be canonical
/// across replicas.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuorumCert {
    leader: NodeId,
    view: View,
    block_id: Identifier,
    signers: Vec<NodeId>,
    agg_sig: AggSig,
}

impl QuorumCert {
    /// A certificate fresh out of the vote aggregator; the leader stamp is
    /// applied by the replica that built it.
    pub fn new(view: View, block_id: Identifier, signers: Vec<NodeId>, agg_sig: AggSig) -> Self {
        QuorumCert {
            leader: NodeId::new(0),
            view,
            block_id,
            signers,
            agg_sig,
        }
    }

    /// The self-referential certificate carried by the genesis block.
    pub fn genesis() -> Self {
        QuorumCert::new(0, Identifier::zero(), vec![], vec![])
    }

    pub fn is_genesis(&self) -> bool {
        self.view == 0 && self.block_id.is_zero()
    }

    pub fn leader(&self) -> NodeId {
        self.leader
    }

    pub fn set_leader(&mut self, leader: NodeId) {
        self.leader = leader;
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn block_id(&self) -> Identifier {
        self.block_id
    }

    pub fn signers(&self) -> &[NodeId] {
        &self.signers
    }

    pub fn agg_sig(&self) -> &AggSig {
        &self.agg_sig
    }
}

impl fmt::Display for QuorumCert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QC(view: {}, block: {}, signers: {})",
            self.view,
            self.block_id.short_str(),
            self.signers.len()
        )
    }
}
