// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Message and certificate types exchanged by ChainBFT replicas.

pub mod block;
pub mod common;
pub mod msg;
pub mod quorum_cert;
pub mod timeout;
pub mod timeout_certificate;
pub mod transaction;
pub mod vote;
