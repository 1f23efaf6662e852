//! Bookkeeping shared by the periodic pollers.
//!
//! A poller is mounted with a key describing every input its loop captured
//! (token, cadence, options). Changing any part of the key tears the loop
//! down and mounts a new one; each mount gets a fresh generation number that
//! the loop must match before it mutates shared state.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub(crate) struct RunningLoop<K> {
    pub key: K,
    pub cancel: CancellationToken,
    pub handle: JoinHandle<()>,
}

impl<K: PartialEq> RunningLoop<K> {
    /// `true` while the loop is alive and was started for `key`.
    pub fn serves(&self, key: &K) -> bool {
        self.key == *key && !self.handle.is_finished()
    }

    pub fn cancel(self) {
        self.cancel.cancel();
    }
}

/// Interval that fires immediately and never bursts after a slow tick.
pub(crate) fn ticker(period: Duration) -> Interval {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
