// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! The protocol core: block storage and voting, the safety driver, and the
//! pacemaker, wired together by [`replica::Replica`].

use chainbft_crypto::Identifier;
use consensus_types::common::View;
use thiserror::Error;

pub mod block_storage;
pub mod event_processor;
pub mod liveness;
pub mod network;
pub mod replica;

#[cfg(test)]
pub mod test_utils;


/// Recoverable conditions surfaced by the core. Each is handled locally by
/// the driver; none unwinds.
#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("view {0} is below the current view {1}")]
    StaleView(View, View),
    #[error("block {0} is not in the store")]
    UnknownBlock(Identifier),
    #[error("parent of block {0} is not in the store")]
    UnknownParent(Identifier),
    #[error("quorum signature check failed for block {0}")]
    InvalidQuorum(Identifier),
    #[error("vote signature check failed for voter {0}")]
    InvalidVote(u64),
}
