// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Replica configuration.
//!
//! The structs here carry every option the core recognizes; parsing the
//! on-disk form and CLI flags is the launcher's business.

use chainbft_crypto::SignatureScheme;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    pub consensus: ConsensusConfig,
    pub network: NetworkConfig,
    pub test: TestConfig,
}

impl NodeConfig {
    /// Whether `node` is configured to misbehave in test mode.
    pub fn is_byzantine(&self, node: u64) -> bool {
        node <= self.test.byz_no
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ConsensusConfig {
    // Fleet size; the replica set {1..n} is fixed at launch
    pub n: usize,
    // Scheme used for block, vote and quorum signatures
    pub signature_scheme: SignatureScheme,
    // View timer; a leader that produces nothing within this window is
    // given up on via timeout certificates
    pub pacemaker_timeout_ms: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            n: 4,
            signature_scheme: SignatureScheme::EcdsaP256,
            pacemaker_timeout_ms: 1_000,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    // Capacity of the receive and transaction queues
    pub chan_buffer_size: usize,
    // Peer endpoint table, used only by the socket layer
    pub addrs: BTreeMap<u64, String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            chan_buffer_size: 1_024,
            addrs: BTreeMap::new(),
        }
    }
}

/// Byzantine behavior injection. Replicas numbered at or below `byz_no`
/// run the selected strategy.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct TestConfig {
    pub byz_no: u64,
    pub strategy: ByzantineStrategy,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ByzantineStrategy {
    // Drop all inbound traffic in the receive task
    #[default]
    Silence,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = NodeConfig::default();
        assert_eq!(config.consensus.n, 4);
        assert_eq!(config.consensus.signature_scheme, SignatureScheme::EcdsaP256);
        assert!(config.network.chan_buffer_size > 0);
        assert_eq!(config.test.byz_no, 0);
        assert!(!config.is_byzantine(1));
    }

    #[test]
    fn byzantine_threshold_is_inclusive() {
        let config = NodeConfig {
            test: TestConfig {
                byz_no: 2,
                strategy: ByzantineStrategy::Silence,
            },
            ..NodeConfig::default()
        };
        assert!(config.is_byzantine(1));
        assert!(config.is_byzantine(2));
        assert!(!config.is_byzantine(3));
    }

    #[test]
    fn recognized_options_deserialize() {
        let raw = r#"
            {
                "consensus": { "n": 7, "signature_scheme": "ECDSA_P256" },
                "network": { "chan_buffer_size": 64, "addrs": { "1": "127.0.0.1:7001" } },
                "test": { "byz_no": 1, "strategy": "silence" }
            }
        "#;
        let config: NodeConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.consensus.n, 7);
        assert_eq!(config.network.addrs.get(&1).unwrap(), "127.0.0.1:7001");
        assert_eq!(config.test.strategy, ByzantineStrategy::Silence);
    }
}
