// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use chainbft_crypto::{AggSig, Identifier};
use consensus_types::{common::NodeId, quorum_cert::QuorumCert, vote::Vote};
use std::collections::HashMap;

/// Outcome of feeding one vote to the accumulator.
#[derive(Clone, Debug)]
pub enum VoteReceptionResult {
    /// The vote was counted; the block now has this many distinct voters.
    VoteAdded(usize),
    /// This vote crossed the supermajority threshold.
    NewQuorumCertificate(QuorumCert),
    /// The voter already voted for this block; nothing changed.
    DuplicateVote,
    /// A certificate was already emitted for this block; late votes are
    /// dropped.
    QcAlreadyFormed,
}

/// Aggregates votes per block id and emits a quorum certificate exactly
/// once, on the first crossing of the supermajority threshold.
pub struct PendingVotes {
    n: usize,
    votes: HashMap<Identifier, HashMap<NodeId, Vote>>,
}

impl PendingVotes {
    pub fn new(n: usize) -> Self {
        PendingVotes {
            n,
            votes: HashMap::new(),
        }
    }

    pub fn insert_vote(&mut self, vote: &Vote) -> VoteReceptionResult {
        let block_id = vote.block_id();
        if self.super_majority(block_id) {
            return VoteReceptionResult::QcAlreadyFormed;
        }
        let per_block = self.votes.entry(block_id).or_default();
        if per_block.contains_key(&vote.voter()) {
            return VoteReceptionResult::DuplicateVote;
        }
        per_block.insert(vote.voter(), vote.clone());
        if self.super_majority(block_id) {
            let (signers, agg_sig) = self.collect_sigs(block_id);
            return VoteReceptionResult::NewQuorumCertificate(QuorumCert::new(
                vote.view(),
                block_id,
                signers,
                agg_sig,
            ));
        }
        VoteReceptionResult::VoteAdded(self.len(block_id))
    }

    /// Drops accumulated votes for a pruned block.
    pub fn remove(&mut self, block_id: &Identifier) {
        self.votes.remove(block_id);
    }

    fn super_majority(&self, block_id: Identifier) -> bool {
        self.len(block_id) > self.n * 2 / 3
    }

    fn len(&self, block_id: Identifier) -> usize {
        self.votes.get(&block_id).map_or(0, HashMap::len)
    }

    /// One traversal of the voter map yields both lists; their pairing is
    /// positional, their order is whatever this replica observed.
    fn collect_sigs(&self, block_id: Identifier) -> (Vec<NodeId>, AggSig) {
        let mut signers = vec![];
        let mut agg_sig = vec![];
        if let Some(per_block) = self.votes.get(&block_id) {
            for vote in per_block.values() {
                signers.push(vote.voter());
                agg_sig.push(vote.signature().clone());
            }
        }
        (signers, agg_sig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainbft_crypto::{KeyStore, SignatureScheme};

    fn vote(view: u64, voter: u64, block_id: Identifier, keys: &KeyStore) -> Vote {
        Vote::new(view, NodeId::new(voter), block_id, keys).unwrap()
    }

    #[test]
    fn quorum_forms_on_the_third_of_four_voters() {
        let keys = KeyStore::generate(SignatureScheme::EcdsaP256, 4).unwrap();
        let mut pending = PendingVotes::new(4);
        let block_id = chainbft_crypto::hash(b"block");

        assert!(matches!(
            pending.insert_vote(&vote(2, 1, block_id, &keys)),
            VoteReceptionResult::VoteAdded(1)
        ));
        assert!(matches!(
            pending.insert_vote(&vote(2, 2, block_id, &keys)),
            VoteReceptionResult::VoteAdded(2)
        ));
        let qc = match pending.insert_vote(&vote(2, 3, block_id, &keys)) {
            VoteReceptionResult::NewQuorumCertificate(qc) => qc,
            other => panic!("expected a certificate, got {:?}", other),
        };
        assert_eq!(qc.view(), 2);
        assert_eq!(qc.block_id(), block_id);
        assert_eq!(qc.signers().len(), 3);
        assert_eq!(qc.agg_sig().len(), 3);
        assert!(keys.verify_quorum(
            qc.agg_sig(),
            block_id.as_bytes(),
            &qc.signers().iter().map(|s| s.id()).collect::<Vec<_>>(),
        ));

        // The fourth vote must not mint a second certificate.
        assert!(matches!(
            pending.insert_vote(&vote(2, 4, block_id, &keys)),
            VoteReceptionResult::QcAlreadyFormed
        ));
    }

    #[test]
    fn duplicate_voter_is_counted_once() {
        let keys = KeyStore::generate(SignatureScheme::EcdsaP256, 4).unwrap();
        let mut pending = PendingVotes::new(4);
        let block_id = chainbft_crypto::hash(b"block");

        pending.insert_vote(&vote(1, 1, block_id, &keys));
        assert!(matches!(
            pending.insert_vote(&vote(1, 1, block_id, &keys)),
            VoteReceptionResult::DuplicateVote
        ));
        assert!(matches!(
            pending.insert_vote(&vote(1, 2, block_id, &keys)),
            VoteReceptionResult::VoteAdded(2)
        ));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Whatever order votes arrive in, and however often voters
            /// repeat themselves, at most one certificate is emitted per
            /// block id.
            #[test]
            fn at_most_one_certificate_per_block(
                votes in proptest::collection::vec((0u8..2, 1u64..=4), 1..40),
            ) {
                let keys = KeyStore::generate(SignatureScheme::EcdsaP256, 4).unwrap();
                let blocks = [chainbft_crypto::hash(b"a"), chainbft_crypto::hash(b"b")];
                let mut pending = PendingVotes::new(4);
                let mut emitted = [0usize; 2];
                for (which, voter) in votes {
                    let block_id = blocks[which as usize];
                    let vote = Vote::new(1, NodeId::new(voter), block_id, &keys).unwrap();
                    if let VoteReceptionResult::NewQuorumCertificate(qc) =
                        pending.insert_vote(&vote)
                    {
                        prop_assert!(qc.signers().len() > 4 * 2 / 3);
                        emitted[which as usize] += 1;
                    }
                }
                prop_assert!(emitted[0] <= 1);
                prop_assert!(emitted[1] <= 1);
            }
        }
    }

    #[test]
    fn votes_split_across_block_ids_do_not_mix() {
        let keys = KeyStore::generate(SignatureScheme::EcdsaP256, 4).unwrap();
        let mut pending = PendingVotes::new(4);
        let a = chainbft_crypto::hash(b"a");
        let b = chainbft_crypto::hash(b"b");

        pending.insert_vote(&vote(5, 1, a, &keys));
        pending.insert_vote(&vote(5, 2, b, &keys));
        pending.insert_vote(&vote(5, 3, a, &keys));
        // Two voters on `a`, one on `b`: no certificate on either side.
        assert!(matches!(
            pending.insert_vote(&vote(5, 4, b, &keys)),
            VoteReceptionResult::VoteAdded(2)
        ));
    }
}
