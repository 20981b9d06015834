// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use super::{block_tree::BlockTree, pending_votes::VoteReceptionResult};
use crate::chained_bft::ConsensusError;
use chainbft_crypto::Identifier;
use consensus_types::{block::Block, common::View, vote::Vote};
use std::{
    sync::{Arc, RwLock},
    time::Duration,
};

#[cfg(test)]
#[path = "block_store_test.rs"]
mod block_store_test;

/// Responsible for maintaining all the blocks of payload and the
/// dependencies of those blocks (parent links and per-block vote state).
/// It is expected to be accessed concurrently by multiple tasks and is
/// thread-safe.
///
/// Example tree structure based on parent links.
///                         ╭--> A3
/// Genesis--> B1--> B2--> B3--> B4
///             ╰--> C2--> C3
///
/// Exactly one block per (view, id); distinct ids may share a view when a
/// proposer equivocates, and at most one of them is ever committable.
pub struct BlockStore {
    inner: Arc<RwLock<BlockTree>>,
}

impl BlockStore {
    pub fn new(n: usize) -> Self {
        BlockStore {
            inner: Arc::new(RwLock::new(BlockTree::new(n))),
        }
    }

    /// Inserts a block, linking it under the block certified by its QC.
    /// Duplicate inserts are a valid non-error case (a replica can receive
    /// the same proposal twice) and leave the store unchanged.
    pub fn insert_block(&self, block: Block) {
        self.inner.write().unwrap().insert_block(block)
    }

    pub fn block_exists(&self, id: &Identifier) -> bool {
        self.inner.read().unwrap().block_exists(id)
    }

    pub fn get_block(&self, id: &Identifier) -> Option<Arc<Block>> {
        self.inner.read().unwrap().get_block(id)
    }

    /// The parent of the block named by `id`, through the id-keyed map.
    pub fn get_parent(&self, id: &Identifier) -> Result<Arc<Block>, ConsensusError> {
        self.inner.read().unwrap().get_parent(id)
    }

    /// Adds a vote for a block. The store does not require the block to be
    /// present locally: votes can outrun the proposal. A formed certificate
    /// is returned, not installed; the driver decides what to do with it.
    pub fn insert_vote(&self, vote: &Vote) -> VoteReceptionResult {
        self.inner.write().unwrap().insert_vote(vote)
    }

    /// Commits up to `id` and prunes forked siblings; see
    /// [`BlockTree::commit`].
    pub fn commit_block(
        &self,
        id: Identifier,
        cur_view: View,
    ) -> Result<(Vec<Arc<Block>>, Vec<Arc<Block>>), ConsensusError> {
        self.inner.write().unwrap().commit(id, cur_view)
    }

    pub fn root_id(&self) -> Identifier {
        self.inner.read().unwrap().root_id()
    }

    pub fn highest_committed(&self) -> View {
        self.inner.read().unwrap().highest_committed()
    }

    pub fn chain_growth(&self) -> f64 {
        self.inner.read().unwrap().chain_growth()
    }

    pub fn block_intervals(&self) -> Option<Duration> {
        self.inner.read().unwrap().block_intervals()
    }
}

#[cfg(test)]
impl BlockStore {
    /// Number of blocks resident in the tree.
    pub(crate) fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    /// Number of child links in the tree.
    pub(crate) fn child_links(&self) -> usize {
        self.inner.read().unwrap().child_links()
    }
}
