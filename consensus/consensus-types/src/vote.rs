// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::common::{NodeId, View};
use chainbft_crypto::{CryptoError, Identifier, KeyStore, Signature};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single replica's endorsement of a block, signed over the block id and
/// addressed to the aggregator of `view + 1`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    view: View,
    voter: NodeId,
    block_id: Identifier,
    signature: Signature,
}

impl Vote {
    pub fn new(
        view: View,
        voter: NodeId,
        block_id: Identifier,
        keys: &KeyStore,
    ) -> Result<Self, CryptoError> {
        let signature = keys.sign(block_id.as_bytes(), voter.id())?;
        Ok(Vote {
            view,
            voter,
            block_id,
            signature,
        })
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn voter(&self) -> NodeId {
        self.voter
    }

    pub fn block_id(&self) -> Identifier {
        self.block_id
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Vote(view: {}, voter: {}, block: {})",
            self.view,
            self.voter,
            self.block_id.short_str()
        )
    }
}
