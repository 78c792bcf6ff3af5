/*
 *  Copyright 2025-2026 Mercantile Systems
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Wakeup channel between the command pipeline and the dispatcher.
//!
//! The dispatcher polls on an interval regardless; the signal only shortens
//! the latency between a commit and the next poll. Losing a notification is
//! harmless because the interval tick will find the records anyway.

use tokio::sync::Notify;

/// Notifies the dispatcher that new outbox records were committed.
///
/// Built on [`Notify`] with `notify_one` semantics: a nudge sent while the
/// dispatcher is mid-cycle is stored and wakes the next `notified().await`
/// immediately.
#[derive(Debug, Default)]
pub struct WorkSignal {
    notify: Notify,
}

impl WorkSignal {
    /// Creates a new signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wakes the dispatcher (or stores a permit if it is not waiting).
    pub fn notify(&self) {
        self.notify.notify_one();
    }

    /// Waits until the next nudge.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}
