// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use consensus_types::{
    common::{NodeId, View},
    timeout::Timeout,
    timeout_certificate::TimeoutCert,
};
use std::collections::HashMap;

/// Outcome of feeding one timeout message to the accumulator.
#[derive(Clone, Debug)]
pub enum TimeoutReceptionResult {
    /// The timeout was counted; the view now has this many distinct nodes.
    TimeoutAdded(usize),
    /// This timeout crossed the supermajority threshold.
    NewTimeoutCertificate(TimeoutCert),
    /// The node already timed out for this view; nothing changed.
    DuplicateTimeout,
    /// A certificate was already emitted for this view.
    TcAlreadyFormed,
}

/// Aggregates timeout messages per view and emits a timeout certificate
/// exactly once, on the first crossing of the supermajority threshold.
/// Same shape as the vote accumulator, keyed by view instead of block id.
pub struct PendingTimeouts {
    n: usize,
    timeouts: HashMap<View, HashMap<NodeId, Timeout>>,
}

impl PendingTimeouts {
    pub fn new(n: usize) -> Self {
        PendingTimeouts {
            n,
            timeouts: HashMap::new(),
        }
    }

    pub fn insert_timeout(&mut self, tmo: &Timeout) -> TimeoutReceptionResult {
        let view = tmo.view();
        if self.super_majority(view) {
            return TimeoutReceptionResult::TcAlreadyFormed;
        }
        let per_view = self.timeouts.entry(view).or_default();
        if per_view.contains_key(&tmo.node_id()) {
            return TimeoutReceptionResult::DuplicateTimeout;
        }
        per_view.insert(tmo.node_id(), tmo.clone());
        if self.super_majority(view) {
            let signers = self
                .timeouts
                .get(&view)
                .map(|per_view| per_view.keys().copied().collect())
                .unwrap_or_default();
            return TimeoutReceptionResult::NewTimeoutCertificate(TimeoutCert::new(view, signers));
        }
        TimeoutReceptionResult::TimeoutAdded(self.len(view))
    }

    fn super_majority(&self, view: View) -> bool {
        self.len(view) > self.n * 2 / 3
    }

    fn len(&self, view: View) -> usize {
        self.timeouts.get(&view).map_or(0, HashMap::len)
    }
}
