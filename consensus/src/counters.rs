// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

lazy_static! {
    /// The pacemaker's current view.
    pub static ref CURRENT_VIEW: IntGauge = register_int_gauge!(
        "chainbft_current_view",
        "Current view of the pacemaker"
    )
    .unwrap();

    /// View of the most recently committed block.
    pub static ref LAST_COMMITTED_VIEW: IntGauge = register_int_gauge!(
        "chainbft_last_committed_view",
        "View of the last committed block"
    )
    .unwrap();

    /// Count of committed blocks pushed to the sink.
    pub static ref COMMITTED_BLOCKS_COUNT: IntCounter = register_int_counter!(
        "chainbft_committed_blocks_count",
        "Number of committed blocks"
    )
    .unwrap();

    /// Count of forked blocks evicted while pruning.
    pub static ref FORKED_BLOCKS_COUNT: IntCounter = register_int_counter!(
        "chainbft_forked_blocks_count",
        "Number of forked blocks pruned from the store"
    )
    .unwrap();

    /// Count of locally fired view timeouts.
    pub static ref TIMEOUT_COUNT: IntCounter = register_int_counter!(
        "chainbft_timeout_count",
        "Number of local pacemaker timeouts"
    )
    .unwrap();

    /// Count of proposals built by this replica.
    pub static ref PROPOSALS_COUNT: IntCounter = register_int_counter!(
        "chainbft_proposals_count",
        "Number of proposals made"
    )
    .unwrap();
}
