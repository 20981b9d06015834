// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{
    block::Block,
    quorum_cert::QuorumCert,
    timeout::Timeout,
    timeout_certificate::TimeoutCert,
    transaction::{Transaction, TransactionReply},
    vote::Vote,
};
use serde::{Deserialize, Serialize};

/// Everything a replica can receive, as one closed union. Dispatch is a
/// single exhaustive match, so an unhandled message variant is a compile
/// error rather than a runtime fault.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusMsg {
    Proposal(Block),
    Vote(Vote),
    Certificate(QuorumCert),
    Timeout(Timeout),
    TimeoutCert(TimeoutCert),
    Transaction(Transaction),
    TransactionReply(TransactionReply),
}

impl ConsensusMsg {
    pub fn name(&self) -> &'static str {
        match self {
            ConsensusMsg::Proposal(_) => "proposal",
            ConsensusMsg::Vote(_) => "vote",
            ConsensusMsg::Certificate(_) => "certificate",
            ConsensusMsg::Timeout(_) => "timeout",
            ConsensusMsg::TimeoutCert(_) => "timeout_cert",
            ConsensusMsg::Transaction(_) => "transaction",
            ConsensusMsg::TransactionReply(_) => "transaction_reply",
        }
    }
}
