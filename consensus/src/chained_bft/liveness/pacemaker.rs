// Copyright (c) The ChainBFT Core Contributors
// SPDX-License-Identifier: Apache-2.0

use super::pending_timeouts::{PendingTimeouts, TimeoutReceptionResult};
use crate::counters;
use consensus_types::{common::View, timeout::Timeout};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::Instant,
};
use tracing::debug;

/// View bookkeeping and the local view timer.
///
/// `cur_view` is strictly non-decreasing: any certificate observation that
/// would move it backwards is ignored. Each advance re-arms the timer and
/// publishes a new-view event so the replica loop can propose when it
/// leads the entered view.
pub struct Pacemaker {
    cur_view: View,
    view_timeout: std::time::Duration,
    new_view_tx: mpsc::UnboundedSender<View>,
    timer_reset_tx: watch::Sender<(View, Instant)>,
    pending_timeouts: PendingTimeouts,
}

impl Pacemaker {
    pub fn new(
        n: usize,
        view_timeout: std::time::Duration,
        new_view_tx: mpsc::UnboundedSender<View>,
    ) -> Self {
        let (timer_reset_tx, _) = watch::channel((1, Instant::now() + view_timeout));
        Pacemaker {
            cur_view: 1,
            view_timeout,
            new_view_tx,
            timer_reset_tx,
            pending_timeouts: PendingTimeouts::new(n),
        }
    }

    pub fn cur_view(&self) -> View {
        self.cur_view
    }

    /// Enters `view + 1` if `view` is not behind the current view. Returns
    /// whether the view changed.
    pub fn advance_view(&mut self, view: View) -> bool {
        if view < self.cur_view {
            return false;
        }
        self.cur_view = view + 1;
        counters::CURRENT_VIEW.set(self.cur_view as i64);
        debug!("entering view {}", self.cur_view);
        let _ = self
            .timer_reset_tx
            .send((self.cur_view, Instant::now() + self.view_timeout));
        let _ = self.new_view_tx.send(self.cur_view);
        true
    }

    /// Feeds a remote timeout to the accumulator.
    pub fn process_remote_timeout(&mut self, tmo: &Timeout) -> TimeoutReceptionResult {
        self.pending_timeouts.insert_timeout(tmo)
    }

    /// Spawns the view timer. On expiry the expiring view is posted into
    /// `timeout_tx` (the driver queue) and the timer waits for the next
    /// re-arm. The task exits when the pacemaker or the receiver is gone.
    pub fn spawn_timer(&self, timeout_tx: mpsc::Sender<View>) -> JoinHandle<()> {
        let mut reset_rx = self.timer_reset_tx.subscribe();
        tokio::spawn(async move {
            loop {
                let (view, deadline) = *reset_rx.borrow_and_update();
                tokio::select! {
                    changed = reset_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    _ = tokio::time::sleep_until(deadline) => {
                        if timeout_tx.send(view).await.is_err() {
                            return;
                        }
                        // Fire once per armed deadline.
                        if reset_rx.changed().await.is_err() {
                            return;
                        }
                    }
                }
            }
        })
    }
}
