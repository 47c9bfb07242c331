// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded busy-polling.

use embedded_hal::blocking::delay::DelayUs;

/// How long a poll may spin before giving up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two checks, in microseconds.
    pub step_us: u32,
    /// Number of checks before the poll times out.
    pub max_attempts: u32,
}

impl PollConfig {
    /// 1 µs steps, 100 000 checks: roughly 100 ms before giving up.
    pub const DEFAULT: Self = Self {
        step_us: 1,
        max_attempts: 100_000,
    };

    /// Upper bound on the time spent sleeping by one poll, in microseconds.
    pub fn budget_us(&self) -> u64 {
        u64::from(self.step_us) * u64::from(self.max_attempts.saturating_sub(1))
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The condition never became true within the configured attempts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PollTimeout;

/// Checks `ready` up to `config.max_attempts` times, sleeping
/// `config.step_us` between checks. No sleep follows the final check.
pub fn poll_until(
    config: &PollConfig,
    delay: &mut impl DelayUs<u32>,
    mut ready: impl FnMut() -> bool,
) -> Result<(), PollTimeout> {
    for attempt in 0..config.max_attempts {
        if ready() {
            return Ok(());
        }
        if attempt + 1 < config.max_attempts {
            delay.delay_us(config.step_us);
        }
    }
    Err(PollTimeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeDelay;

    #[test]
    fn ready_immediately_never_sleeps() {
        let mut delay = FakeDelay::default();
        let mut checks = 0;
        let r = poll_until(&PollConfig::DEFAULT, &mut delay, || {
            checks += 1;
            true
        });
        assert_eq!(r, Ok(()));
        assert_eq!(checks, 1);
        assert_eq!(delay.elapsed_us, 0);
    }

    #[test]
    fn ready_after_a_few_steps() {
        let mut delay = FakeDelay::default();
        let mut checks = 0;
        let r = poll_until(&PollConfig::DEFAULT, &mut delay, || {
            checks += 1;
            checks == 4
        });
        assert_eq!(r, Ok(()));
        assert_eq!(delay.elapsed_us, 3);
    }

    #[test]
    fn stuck_condition_times_out_within_budget() {
        let config = PollConfig::DEFAULT;
        let mut delay = FakeDelay::default();
        let mut checks = 0u32;
        let r = poll_until(&config, &mut delay, || {
            checks += 1;
            false
        });
        assert_eq!(r, Err(PollTimeout));
        assert_eq!(checks, 100_000);
        assert_eq!(delay.elapsed_us, config.budget_us());
        assert!(delay.elapsed_us < 100_000);
    }

    #[test]
    fn zero_attempts_fails_without_checking() {
        let config = PollConfig {
            step_us: 5,
            max_attempts: 0,
        };
        let mut delay = FakeDelay::default();
        let r = poll_until(&config, &mut delay, || panic!("checked"));
        assert_eq!(r, Err(PollTimeout));
        assert_eq!(delay.elapsed_us, 0);
    }
}
