// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::common::{NodeId, View};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Certifies that a supermajority of replicas gave up on `view - 1` and
/// asked to enter `view`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutCert {
    view: View,
    signers: Vec<NodeId>,
}

impl TimeoutCert {
    pub fn new(view: View, signers: Vec<NodeId>) -> Self {
        TimeoutCert { view, signers }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn signers(&self) -> &[NodeId] {
        &self.signers
    }
}

impl fmt::Display for TimeoutCert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TC(view: {}, signers: {})", self.view, self.signers.len())
    }
}
