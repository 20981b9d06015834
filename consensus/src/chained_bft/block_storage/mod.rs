// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

mod block_store;
mod block_tree;
mod pending_votes;

pub use block_store::BlockStore;
pub use pending_votes::{PendingVotes, VoteReceptionResult};
