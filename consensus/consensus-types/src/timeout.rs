// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{
    common::{NodeId, View},
    quorum_cert::QuorumCert,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A replica's request to abandon `view - 1` and enter `view`, carrying
/// its high-QC so lagging peers catch up from the gossip.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeout {
    view: View,
    node_id: NodeId,
    high_qc: QuorumCert,
}

impl Timeout {
    pub fn new(view: View, node_id: NodeId, high_qc: QuorumCert) -> Self {
        Timeout {
            view,
            node_id,
            high_qc,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn high_qc(&self) -> &QuorumCert {
        &self.high_qc
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Timeout(view: {}, node: {}, high_qc view: {})",
            self.view,
            self.node_id,
            self.high_qc.view()
        )
    }
}
