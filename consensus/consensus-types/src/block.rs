// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{
    common::{NodeId, View},
    quorum_cert::QuorumCert,
    transaction::Transaction,
};
use chainbft_crypto::{make_id, CryptoError, Identifier, KeyStore, Signature};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The linkable unit of the chain.
///
/// The parent link is the certified block of `qc`; `prev_id` caches it.
/// The id is a content hash over `{view, qc, proposer, payload ids,
/// prev_id}` — payload bodies deliberately do not contribute, only their
/// transaction ids.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    view: View,
    qc: QuorumCert,
    proposer: NodeId,
    payload: Vec<Transaction>,
    prev_id: Identifier,
    id: Identifier,
    sig: Signature,
}

/// The id preimage. Kept separate so the contributing fields are fixed by
/// construction.
#[derive(Serialize)]
struct RawBlock<'a> {
    view: View,
    qc: &'a QuorumCert,
    proposer: NodeId,
    payload: Vec<&'a str>,
    prev_id: Identifier,
}

impl Block {
    /// Builds and signs a proposal.
    pub fn new(
        view: View,
        qc: QuorumCert,
        prev_id: Identifier,
        payload: Vec<Transaction>,
        proposer: NodeId,
        keys: &KeyStore,
    ) -> Result<Self, CryptoError> {
        let id = Self::compute_id(view, &qc, proposer, &payload, prev_id);
        let sig = keys.sign(id.as_bytes(), proposer.id())?;
        Ok(Block {
            view,
            qc,
            proposer,
            payload,
            prev_id,
            id,
            sig,
        })
    }

    /// The distinguished root of every replica's store: view 0, empty
    /// payload, self-referential certificate, zero id.
    pub fn genesis() -> Self {
        Block {
            view: 0,
            qc: QuorumCert::genesis(),
            proposer: NodeId::new(0),
            payload: vec![],
            prev_id: Identifier::zero(),
            id: Identifier::zero(),
            sig: Signature::default(),
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.view == 0 && self.id.is_zero()
    }

    fn compute_id(
        view: View,
        qc: &QuorumCert,
        proposer: NodeId,
        payload: &[Transaction],
        prev_id: Identifier,
    ) -> Identifier {
        let raw = RawBlock {
            view,
            qc,
            proposer,
            payload: payload.iter().map(|txn| txn.id.as_str()).collect(),
            prev_id,
        };
        make_id(&raw)
    }

    /// Recomputes the id from the contributing fields. Equal to [`id`] for
    /// any honestly constructed block.
    ///
    /// [`id`]: Block::id
    pub fn rehash(&self) -> Identifier {
        Self::compute_id(self.view, &self.qc, self.proposer, &self.payload, self.prev_id)
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn qc(&self) -> &QuorumCert {
        &self.qc
    }

    pub fn proposer(&self) -> NodeId {
        self.proposer
    }

    pub fn payload(&self) -> &[Transaction] {
        &self.payload
    }

    pub fn prev_id(&self) -> Identifier {
        self.prev_id
    }

    pub fn id(&self) -> Identifier {
        self.id
    }

    pub fn sig(&self) -> &Signature {
        &self.sig
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block(view: {}, id: {}, parent: {}, proposer: {}, txns: {})",
            self.view,
            self.id.short_str(),
            self.prev_id.short_str(),
            self.proposer,
            self.payload.len()
        )
    }
}
