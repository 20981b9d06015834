// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use super::pending_votes::{PendingVotes, VoteReceptionResult};
use crate::chained_bft::ConsensusError;
use chainbft_crypto::Identifier;
use consensus_types::{block::Block, common::View, vote::Vote};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::Arc,
    time::{Duration, Instant},
};

/// Number of commit timestamps retained for interval telemetry.
const COMMIT_WINDOW: usize = 100;

/// The in-memory DAG of blocks rooted at the committed frontier.
///
/// All cross-references are by [`Identifier`], resolved through the owning
/// `blocks` map; nothing holds a parent pointer directly. Distinct ids may
/// share a view (an equivocating proposer); at most one of them ever
/// reaches the committed chain.
pub struct BlockTree {
    blocks: HashMap<Identifier, Arc<Block>>,
    children: HashMap<Identifier, Vec<Identifier>>,
    pending_votes: PendingVotes,
    /// Last committed block; the root of the surviving subtree.
    root_id: Identifier,
    highest_committed: View,
    committed_count: u64,
    /// Highest current view reported by the driver at commit time; the
    /// denominator of the chain growth rate.
    latest_view: View,
    commit_times: VecDeque<Instant>,
}

impl BlockTree {
    pub fn new(n: usize) -> Self {
        let genesis = Arc::new(Block::genesis());
        let mut blocks = HashMap::new();
        blocks.insert(genesis.id(), genesis.clone());
        BlockTree {
            blocks,
            children: HashMap::new(),
            pending_votes: PendingVotes::new(n),
            root_id: genesis.id(),
            highest_committed: 0,
            committed_count: 0,
            latest_view: 0,
            commit_times: VecDeque::new(),
        }
    }

    /// Inserts a block and links it under its parent. Idempotent on the id.
    pub fn insert_block(&mut self, block: Block) {
        let id = block.id();
        if self.blocks.contains_key(&id) {
            return;
        }
        if !block.is_genesis() {
            self.children.entry(block.prev_id()).or_default().push(id);
        }
        self.blocks.insert(id, Arc::new(block));
    }

    pub fn block_exists(&self, id: &Identifier) -> bool {
        self.blocks.contains_key(id)
    }

    pub fn get_block(&self, id: &Identifier) -> Option<Arc<Block>> {
        self.blocks.get(id).cloned()
    }

    pub fn get_parent(&self, id: &Identifier) -> Result<Arc<Block>, ConsensusError> {
        let block = self
            .blocks
            .get(id)
            .ok_or(ConsensusError::UnknownBlock(*id))?;
        self.blocks
            .get(&block.prev_id())
            .cloned()
            .ok_or(ConsensusError::UnknownParent(*id))
    }

    pub fn insert_vote(&mut self, vote: &Vote) -> VoteReceptionResult {
        self.pending_votes.insert_vote(vote)
    }

    pub fn root_id(&self) -> Identifier {
        self.root_id
    }

    pub fn highest_committed(&self) -> View {
        self.highest_committed
    }

    /// Commits the block named by `id` and every uncommitted ancestor up to
    /// the previous frontier, then evicts forked siblings.
    ///
    /// Returns the committed chain in view order and the evicted blocks.
    /// Siblings at or below the new frontier that are not on the committed
    /// chain are forked; each is evicted together with its whole subtree.
    pub fn commit(
        &mut self,
        id: Identifier,
        cur_view: View,
    ) -> Result<(Vec<Arc<Block>>, Vec<Arc<Block>>), ConsensusError> {
        let target = self
            .blocks
            .get(&id)
            .cloned()
            .ok_or(ConsensusError::UnknownBlock(id))?;
        let new_frontier = target.view();
        if new_frontier <= self.highest_committed {
            return Ok((vec![], vec![]));
        }

        // Walk ancestors back to the previous frontier.
        let mut committed = vec![];
        let mut cursor = target;
        loop {
            if cursor.is_genesis() || cursor.view() <= self.highest_committed {
                break;
            }
            committed.push(cursor.clone());
            cursor = match self.blocks.get(&cursor.prev_id()) {
                Some(parent) => parent.clone(),
                None => break,
            };
        }
        committed.reverse();

        let committed_ids: HashSet<Identifier> = committed.iter().map(|b| b.id()).collect();

        // Fork siblings: stored blocks inside the newly committed view range
        // that are not on the committed chain.
        let fork_roots: Vec<Identifier> = self
            .blocks
            .values()
            .filter(|b| {
                b.view() > self.highest_committed
                    && b.view() <= new_frontier
                    && !committed_ids.contains(&b.id())
            })
            .map(|b| b.id())
            .collect();
        let mut forked = vec![];
        for fork_root in fork_roots {
            self.evict_subtree(fork_root, &mut forked);
        }
        forked.sort_by_key(|b| b.view());

        // Drop everything at or below the old frontier; the newly committed
        // block becomes the root of the surviving subtree.
        let old_root = self.root_id;
        for block in &committed {
            if block.view() < new_frontier {
                self.remove_block(block.id());
            }
        }
        self.remove_block(old_root);
        self.root_id = id;
        self.highest_committed = new_frontier;
        self.committed_count += committed.len() as u64;
        self.latest_view = self.latest_view.max(cur_view);
        let now = Instant::now();
        for _ in 0..committed.len() {
            if self.commit_times.len() == COMMIT_WINDOW {
                self.commit_times.pop_front();
            }
            self.commit_times.push_back(now);
        }

        Ok((committed, forked))
    }

    fn evict_subtree(&mut self, root: Identifier, evicted: &mut Vec<Arc<Block>>) {
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            let Some(block) = self.blocks.remove(&id) else {
                continue;
            };
            self.pending_votes.remove(&id);
            if let Some(children) = self.children.remove(&id) {
                queue.extend(children);
            }
            evicted.push(block);
        }
    }

    fn remove_block(&mut self, id: Identifier) {
        self.blocks.remove(&id);
        self.children.remove(&id);
        self.pending_votes.remove(&id);
    }

    /// Committed blocks per elapsed view.
    pub fn chain_growth(&self) -> f64 {
        if self.latest_view == 0 {
            return 0.0;
        }
        self.committed_count as f64 / self.latest_view as f64
    }

    /// Average wall-clock gap between recent commits.
    pub fn block_intervals(&self) -> Option<Duration> {
        if self.commit_times.len() < 2 {
            return None;
        }
        let span = *self.commit_times.back()? - *self.commit_times.front()?;
        Some(span / (self.commit_times.len() - 1) as u32)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[cfg(test)]
    pub fn child_links(&self) -> usize {
        self.children.values().map(Vec::len).sum()
    }
}
