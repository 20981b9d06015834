// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::chained_bft::{
    block_storage::{BlockStore, VoteReceptionResult},
    test_utils::{key_store, TreeInserter},
    ConsensusError,
};
use chainbft_crypto::hash;
use consensus_types::{block::Block, common::NodeId, vote::Vote};

#[test]
fn insert_links_blocks_under_their_parent() {
    let keys = key_store(4);
    let store = BlockStore::new(4);
    let mut inserter = TreeInserter::new(keys, store);
    let genesis = Block::genesis();

    let b1 = inserter.insert_block(&genesis, 1, vec![]);
    let b2 = inserter.insert_block(&b1, 2, vec![]);

    assert_eq!(inserter.store().len(), 3);
    assert_eq!(inserter.store().child_links(), 2);
    assert_eq!(inserter.store().get_parent(&b2.id()).unwrap().id(), b1.id());
    assert_eq!(
        inserter.store().get_parent(&b1.id()).unwrap().id(),
        genesis.id()
    );
}

#[test]
fn duplicate_insert_is_idempotent() {
    let keys = key_store(4);
    let store = BlockStore::new(4);
    let mut inserter = TreeInserter::new(keys, store);
    let genesis = Block::genesis();

    let b1 = inserter.insert_block(&genesis, 1, vec![]);
    inserter.store().insert_block((*b1).clone());
    assert_eq!(inserter.store().len(), 2);
    assert_eq!(inserter.store().child_links(), 1);
}

#[test]
fn missing_blocks_and_parents_are_reported() {
    let keys = key_store(4);
    let store = BlockStore::new(4);
    let mut inserter = TreeInserter::new(keys, store);
    let genesis = Block::genesis();

    assert!(matches!(
        inserter.store().get_parent(&hash(b"nowhere")),
        Err(ConsensusError::UnknownBlock(_))
    ));

    // A child inserted ahead of its parent resolves the parent lookup to
    // UnknownParent until the gap is filled.
    let b1 = inserter.make_block(&genesis, 1, vec![]);
    let b2 = inserter.make_block(&b1, 2, vec![]);
    inserter.store().insert_block(b2.clone());
    assert!(matches!(
        inserter.store().get_parent(&b2.id()),
        Err(ConsensusError::UnknownParent(_))
    ));
    inserter.store().insert_block(b1);
    assert_eq!(inserter.store().get_parent(&b2.id()).unwrap().view(), 1);
}

#[test]
fn commit_walks_back_to_the_previous_frontier() {
    let keys = key_store(4);
    let store = BlockStore::new(4);
    let mut inserter = TreeInserter::new(keys, store);
    let genesis = Block::genesis();

    let b1 = inserter.insert_block(&genesis, 1, vec![]);
    let b2 = inserter.insert_block(&b1, 2, vec![]);
    let b3 = inserter.insert_block(&b2, 3, vec![]);
    let _b4 = inserter.insert_block(&b3, 4, vec![]);

    let (committed, forked) = inserter.store().commit_block(b1.id(), 4).unwrap();
    assert_eq!(
        committed.iter().map(|b| b.id()).collect::<Vec<_>>(),
        vec![b1.id()]
    );
    assert!(forked.is_empty());
    assert_eq!(inserter.store().root_id(), b1.id());
    assert_eq!(inserter.store().highest_committed(), 1);

    // The next commit emits exactly the gap, in view order.
    let (committed, _) = inserter.store().commit_block(b3.id(), 5).unwrap();
    assert_eq!(
        committed.iter().map(|b| b.view()).collect::<Vec<_>>(),
        vec![2, 3]
    );
    assert_eq!(inserter.store().highest_committed(), 3);

    // Re-committing at or below the frontier is a no-op.
    let (committed, forked) = inserter.store().commit_block(b3.id(), 6).unwrap();
    assert!(committed.is_empty() && forked.is_empty());
}

#[test]
fn commit_prunes_forked_subtrees() {
    let keys = key_store(4);
    let store = BlockStore::new(4);
    let mut inserter = TreeInserter::new(keys, store);
    let genesis = Block::genesis();

    // Genesis--> B1--> B2--> B3
    //             ╰--> C2--> C3
    let b1 = inserter.insert_block(&genesis, 1, vec![]);
    let b2 = inserter.insert_block(&b1, 2, vec![]);
    let b3 = inserter.insert_block(&b2, 3, vec![]);
    let c2 = inserter.insert_block_with_payload_marker(&b1, 2, "fork");
    let c3 = inserter.insert_block(&c2, 3, vec![]);

    let (committed, forked) = inserter.store().commit_block(b3.id(), 4).unwrap();
    assert_eq!(
        committed.iter().map(|b| b.id()).collect::<Vec<_>>(),
        vec![b1.id(), b2.id(), b3.id()]
    );
    let mut forked_ids: Vec<_> = forked.iter().map(|b| b.id()).collect();
    forked_ids.sort();
    let mut expected = vec![c2.id(), c3.id()];
    expected.sort();
    assert_eq!(forked_ids, expected);
    assert!(!inserter.store().block_exists(&c2.id()));
    assert!(!inserter.store().block_exists(&c3.id()));
    assert!(inserter.store().block_exists(&b3.id()));
}

#[test]
fn equivocating_blocks_share_a_view_but_not_an_id() {
    let keys = key_store(4);
    let store = BlockStore::new(4);
    let mut inserter = TreeInserter::new(keys, store);
    let genesis = Block::genesis();

    let b = inserter.insert_block(&genesis, 5, vec![]);
    let b_prime = inserter.insert_block_with_payload_marker(&genesis, 5, "other");
    assert_ne!(b.id(), b_prime.id());
    assert!(inserter.store().block_exists(&b.id()));
    assert!(inserter.store().block_exists(&b_prime.id()));
}

#[test]
fn vote_insertion_delegates_to_the_accumulator() {
    let keys = key_store(4);
    let store = BlockStore::new(4);
    let mut inserter = TreeInserter::new(keys.clone(), store);
    let genesis = Block::genesis();
    let b1 = inserter.insert_block(&genesis, 1, vec![]);

    for voter in 1..=2u64 {
        let vote = Vote::new(1, NodeId::new(voter), b1.id(), &keys).unwrap();
        assert!(matches!(
            inserter.store().insert_vote(&vote),
            VoteReceptionResult::VoteAdded(_)
        ));
    }
    let vote = Vote::new(1, NodeId::new(3), b1.id(), &keys).unwrap();
    assert!(matches!(
        inserter.store().insert_vote(&vote),
        VoteReceptionResult::NewQuorumCertificate(_)
    ));
}

#[test]
fn telemetry_tracks_commits() {
    let keys = key_store(4);
    let store = BlockStore::new(4);
    let mut inserter = TreeInserter::new(keys, store);
    let genesis = Block::genesis();

    assert_eq!(inserter.store().chain_growth(), 0.0);
    assert!(inserter.store().block_intervals().is_none());

    let b1 = inserter.insert_block(&genesis, 1, vec![]);
    let b2 = inserter.insert_block(&b1, 2, vec![]);
    inserter.store().commit_block(b1.id(), 4).unwrap();
    inserter.store().commit_block(b2.id(), 5).unwrap();

    assert!(inserter.store().chain_growth() > 0.0);
    assert!(inserter.store().block_intervals().is_some());
}
