// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Decides which samplers are due on each tick and samples them.

use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use tracing::{debug, trace};

use crate::color::ColorSource;
use crate::dispatch::Dispatcher;
use crate::mapping;
use crate::registry::Registry;
use crate::sampler::{Sampler, SamplerId};
use crate::session::Session;

/// How often the scheduler wakes up. Each sampler's own interval decides
/// whether it is sampled on a given tick.
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// Time-until-next-sample is displayed in steps of this many milliseconds.
const DISPLAY_STEP: u64 = 10;

/// A millisecond clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall clock milliseconds, advanced monotonically from the moment it was created.
pub struct SystemClock {
    origin: Instant,
    origin_ms: u64,
}

impl SystemClock {
    pub fn new() -> SystemClock {
        let origin_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since| since.as_millis() as u64)
            .unwrap_or_default();
        SystemClock {
            origin: Instant::now(),
            origin_ms,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        self.origin_ms + self.origin.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
pub mod test {
    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    };

    /// A clock that only moves when told to.
    #[derive(Clone, Default)]
    pub struct ManualClock {
        now: Arc<AtomicU64>,
    }

    impl ManualClock {
        pub fn new(start: u64) -> ManualClock {
            ManualClock {
                now: Arc::new(AtomicU64::new(start)),
            }
        }

        pub fn advance(&self, ms: u64) {
            self.now.fetch_add(ms, Ordering::Relaxed);
        }

        pub fn set(&self, ms: u64) {
            self.now.store(ms, Ordering::Relaxed);
        }
    }

    impl super::Clock for ManualClock {
        fn now(&self) -> u64 {
            self.now.load(Ordering::Relaxed)
        }
    }
}

/// Returns true once the sampler's polling interval has elapsed since its last sample.
pub fn is_due(sampler: &Sampler, now: u64) -> bool {
    now.saturating_sub(sampler.state.last_sample_time)
        >= u64::from(sampler.config.polling_interval)
}

/// Milliseconds until the sampler is next due, rounded down to the display step.
pub fn time_remaining(sampler: &Sampler, now: u64) -> u64 {
    let elapsed = now.saturating_sub(sampler.state.last_sample_time);
    let remaining = u64::from(sampler.config.polling_interval).saturating_sub(elapsed);
    remaining / DISPLAY_STEP * DISPLAY_STEP
}

/// Drives sampling. A late tick samples each due sampler once; missed
/// intervals are never caught up.
pub struct Scheduler {
    clock: Arc<dyn Clock>,
    period: Duration,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>, period: Duration) -> Scheduler {
        Scheduler { clock, period }
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// The interval between ticks.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Samples and dispatches every due sampler. Returns how many were sampled.
    pub fn tick(
        &self,
        registry: &mut Registry,
        source: &dyn ColorSource,
        dispatcher: &mut Dispatcher,
        session: &mut Session,
    ) -> usize {
        let now = self.now();
        let due: Vec<SamplerId> = registry
            .list()
            .iter()
            .filter(|sampler| is_due(sampler, now))
            .map(|sampler| sampler.id)
            .collect();

        let mut sampled = 0;
        for id in due {
            let Some(sampler) = registry.get_mut(id) else {
                continue;
            };

            let color = match source.sample(&sampler.region) {
                Ok(color) => color,
                Err(e) => {
                    // Retried on the next tick since the sample time stays put.
                    debug!(id, err = e.to_string(), "Unable to sample region.");
                    session.set_status(format!("Sampler {}: {}", id, e));
                    continue;
                }
            };

            sampler.state.color = color;
            sampler.state.midi_value = mapping::rgb_to_midi(color);
            sampler.state.last_sample_time = now;
            trace!(id, ?color, value = sampler.state.midi_value, "Sampled.");

            dispatcher.dispatch(id, registry, session, now);
            sampled += 1;
        }
        sampled
    }

    /// Updates each sampler's time-until-next-sample. Returns true if any changed.
    pub fn refresh_display(&self, registry: &mut Registry) -> bool {
        let now = self.now();
        let mut changed = false;
        for sampler in registry.samplers_mut() {
            let remaining = Some(time_remaining(sampler, now));
            if sampler.state.display_time_remaining != remaining {
                sampler.state.display_time_remaining = remaining;
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::test::ManualClock;
    use super::*;
    use crate::sampler::{Region, SamplerConfig, SamplerUpdate};

    fn sampler(polling_interval: u32, last_sample_time: u64) -> Sampler {
        let config = SamplerConfig::default()
            .apply(&SamplerUpdate {
                polling_interval: Some(polling_interval),
                ..Default::default()
            })
            .unwrap();
        let mut sampler = Sampler::new(1, Region::new(0, 0, 1, 1), config);
        sampler.state.last_sample_time = last_sample_time;
        sampler
    }

    #[test]
    fn test_is_due() {
        let sampler = sampler(50, 1000);
        assert!(!is_due(&sampler, 1000));
        assert!(!is_due(&sampler, 1049));
        assert!(is_due(&sampler, 1050));
        assert!(is_due(&sampler, 5000));
        // A clock behind the last sample never makes a sampler due.
        assert!(!is_due(&sampler, 900));
    }

    #[test]
    fn test_time_remaining() {
        let sampler = sampler(50, 1000);
        assert_eq!(50, time_remaining(&sampler, 1000));
        assert_eq!(40, time_remaining(&sampler, 1003));
        assert_eq!(0, time_remaining(&sampler, 1049));
        assert_eq!(0, time_remaining(&sampler, 2000));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100);
        let scheduler = Scheduler::new(Arc::new(clock.clone()), DEFAULT_TICK);
        assert_eq!(100, scheduler.now());
        clock.advance(25);
        assert_eq!(125, scheduler.now());
        clock.set(10);
        assert_eq!(10, scheduler.now());
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now();
        assert!(first > 0);
        assert!(clock.now() >= first);
    }

    #[test]
    fn test_refresh_display() {
        let clock = ManualClock::new(1000);
        let scheduler = Scheduler::new(Arc::new(clock.clone()), DEFAULT_TICK);
        let mut registry = Registry::new();
        let id = registry
            .create(Region::new(0, 0, 1, 1), SamplerConfig::default())
            .unwrap();
        registry.get_mut(id).unwrap().state.last_sample_time = 1000;

        assert!(scheduler.refresh_display(&mut registry));
        assert_eq!(
            Some(50),
            registry.get(id).unwrap().state.display_time_remaining
        );
        assert!(!scheduler.refresh_display(&mut registry));

        clock.advance(22);
        assert!(scheduler.refresh_display(&mut registry));
        assert_eq!(
            Some(20),
            registry.get(id).unwrap().state.display_time_remaining
        );
    }
}
