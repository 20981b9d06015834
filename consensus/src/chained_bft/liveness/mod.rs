// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

pub mod leader_election;
pub mod pacemaker;
pub mod pending_timeouts;
