// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! ChainBFT: a chained, leader-based BFT state-machine replication core.
//!
//! A fixed fleet of `n` replicas, up to `⌊(n-1)/3⌋` of them Byzantine,
//! produces a linearly extending chain of blocks. Leaders propose blocks
//! extending their high-QC, replicas vote to the next leader, quorum
//! certificates advance views, and the three-chain rule drives commits.
//! Timeout certificates recover liveness past silent or faulty leaders.

pub mod chained_bft;
pub mod counters;
