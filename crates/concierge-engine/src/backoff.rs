// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adaptive poll interval.

use std::time::Duration;

use concierge_config::model::PollProfile;

/// Poll delay that grows while polls come back empty and snaps back to the
/// base interval as soon as one finds something.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    base: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
}

impl PollBackoff {
    /// `max` is raised to `base` and `multiplier` to 1.0 if given smaller.
    pub fn new(base: Duration, max: Duration, multiplier: f64) -> Self {
        let multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        Self {
            base,
            max: max.max(base),
            multiplier,
            current: base,
        }
    }

    pub fn from_profile(profile: &PollProfile) -> Self {
        Self::new(
            profile.base_interval(),
            profile.max_interval(),
            profile.multiplier,
        )
    }

    /// Delay before the next poll.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Feeds back a poll result and returns the delay before the next poll.
    pub fn record(&mut self, found_new: bool) -> Duration {
        if found_new {
            self.current = self.base;
        } else {
            let grown = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.multiplier)
                .unwrap_or(self.max);
            self.current = grown.max(self.current).min(self.max);
        }
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.base;
    }
}
