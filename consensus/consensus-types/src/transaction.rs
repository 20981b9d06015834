// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::common::NodeId;
use serde::{Deserialize, Serialize};

/// An opaque client command. Only the id contributes to block hashing; the
/// body is carried for the execution layer and never inspected by the core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub command: Vec<u8>,
    /// Replica that forwarded the transaction on behalf of a client, when
    /// it did not arrive directly.
    pub forwarder: Option<NodeId>,
}

impl Transaction {
    pub fn new(id: impl Into<String>, command: Vec<u8>) -> Self {
        Transaction {
            id: id.into(),
            command,
            forwarder: None,
        }
    }
}

/// Reply for a forwarded transaction, routed back to the forwarding
/// replica's bookkeeping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReply {
    pub id: String,
    pub value: Vec<u8>,
}
