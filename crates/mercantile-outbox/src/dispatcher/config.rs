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

//! Dispatcher configuration.

use std::time::Duration;

use rand::Rng;

/// Configuration for the outbox dispatcher.
///
/// # Example
///
/// ```rust,ignore
/// let config = DispatcherConfig::builder()
///     .poll_interval(Duration::from_millis(500))
///     .batch_size(100)
///     .max_attempts(8)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// How often to poll for due records when no nudge arrives.
    pub poll_interval: Duration,
    /// Maximum records claimed per cycle.
    pub batch_size: usize,
    /// How long a claim is honored before other dispatchers may re-claim
    /// the record. Must comfortably exceed the slowest expected consumer.
    pub claim_lease: Duration,
    /// Delivery attempts before a record is parked as dead.
    pub max_attempts: i32,
    /// Base delay for the first retry; doubles each attempt.
    pub retry_base: Duration,
    /// Upper bound on the retry delay.
    pub retry_cap: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 50,
            claim_lease: Duration::from_secs(30),
            max_attempts: 5,
            retry_base: Duration::from_secs(1),
            retry_cap: Duration::from_secs(60),
        }
    }
}

impl DispatcherConfig {
    /// Creates a builder with default values.
    pub fn builder() -> DispatcherConfigBuilder {
        DispatcherConfigBuilder {
            config: Self::default(),
        }
    }

    /// Retry delay before attempt number `attempt + 1`, given that `attempt`
    /// attempts have already failed.
    ///
    /// Exponential from `retry_base`, capped at `retry_cap`, with +/-50%
    /// jitter so a burst of failures does not retry in lockstep.
    pub fn retry_delay(&self, attempt: i32) -> Duration {
        let exp = attempt.saturating_sub(1).clamp(0, 31) as u32;
        let raw = self
            .retry_base
            .saturating_mul(2u32.saturating_pow(exp.min(20)));
        let capped = raw.min(self.retry_cap);
        let jitter = rand::thread_rng().gen_range(0.5..=1.5);
        capped.mul_f64(jitter)
    }
}

/// Builder for [`DispatcherConfig`].
#[derive(Debug, Clone)]
pub struct DispatcherConfigBuilder {
    config: DispatcherConfig,
}

impl DispatcherConfigBuilder {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn claim_lease(mut self, lease: Duration) -> Self {
        self.config.claim_lease = lease;
        self
    }

    pub fn max_attempts(mut self, attempts: i32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn retry_base(mut self, base: Duration) -> Self {
        self.config.retry_base = base;
        self
    }

    pub fn retry_cap(mut self, cap: Duration) -> Self {
        self.config.retry_cap = cap;
        self
    }

    pub fn build(self) -> DispatcherConfig {
        self.config
    }
}
