//! Periodic and deferred scheduling.
//!
//! [`Ticker`] is the interval service every periodic activity is driven by.
//! It wraps a repeating Bevy [`Timer`] so tests can fast-forward it with
//! arbitrary deltas. [`DelayQueue`] holds one-shot actions keyed by the time
//! they become due.

use std::time::Duration;

use bevy::prelude::*;

/// A stoppable repeating interval.
#[derive(Clone, Debug)]
pub struct Ticker {
    timer: Timer,
    running: bool,
}

impl Ticker {
    /// Create a running ticker firing every `period`.
    pub fn new(period: Duration) -> Self {
        Self {
            timer: Timer::new(period, TimerMode::Repeating),
            running: true,
        }
    }

    pub fn from_millis(period_ms: u64) -> Self {
        Self::new(Duration::from_millis(period_ms))
    }

    pub fn period(&self) -> Duration {
        self.timer.duration()
    }

    /// Advance by `delta`; returns how many times the interval elapsed.
    ///
    /// A stopped ticker never fires.
    pub fn tick(&mut self, delta: Duration) -> u32 {
        if !self.running {
            return 0;
        }
        self.timer.tick(delta);
        self.timer.times_finished_this_tick()
    }

    /// Advance and report whether the activity should run this frame.
    ///
    /// Multiple elapsed intervals collapse into a single run: activities never
    /// queue up behind a slow frame.
    pub fn should_run(&mut self, delta: Duration) -> bool {
        self.tick(delta) > 0
    }

    /// Resume firing. Restarting a running ticker is a no-op.
    pub fn start(&mut self) {
        if !self.running {
            self.timer.reset();
            self.running = true;
        }
    }

    /// Stop firing. Stopping a stopped ticker is a no-op.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// The three independent periodic activities of the engine.
#[derive(Resource, Clone, Debug)]
pub struct ActivitySchedule {
    /// Snapshot cache refresh (~100 ms)
    pub snapshot: Ticker,
    /// Conjunction prediction loop (~1 s)
    pub prediction: Ticker,
    /// Cascade status poll for display (~500 ms)
    pub status: Ticker,
}

impl ActivitySchedule {
    pub fn new(snapshot_ms: u64, prediction_ms: u64, status_ms: u64) -> Self {
        Self {
            snapshot: Ticker::from_millis(snapshot_ms),
            prediction: Ticker::from_millis(prediction_ms),
            status: Ticker::from_millis(status_ms),
        }
    }

    /// Stop every activity.
    pub fn stop_all(&mut self) {
        self.snapshot.stop();
        self.prediction.stop();
        self.status.stop();
    }
}

impl Default for ActivitySchedule {
    fn default() -> Self {
        Self::new(100, 1000, 500)
    }
}

/// Deferred one-shot actions ordered by due time.
#[derive(Clone, Debug)]
pub struct DelayQueue<T> {
    entries: Vec<(f64, T)>,
}

impl<T> Default for DelayQueue<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> DelayQueue<T> {
    /// Schedule `action` to become due at `due`.
    ///
    /// Actions with equal due times keep their insertion order.
    pub fn schedule(&mut self, due: f64, action: T) {
        let index = self.entries.partition_point(|(t, _)| *t <= due);
        self.entries.insert(index, (due, action));
    }

    /// Remove and return every action due at or before `now`, earliest first.
    pub fn drain_due(&mut self, now: f64) -> Vec<T> {
        let split = self.entries.partition_point(|(t, _)| *t <= now);
        self.entries.drain(..split).map(|(_, action)| action).collect()
    }

    /// Due time of the earliest pending action.
    pub fn next_due(&self) -> Option<f64> {
        self.entries.first().map(|(t, _)| *t)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, action)| action)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_fires_on_period() {
        let mut ticker = Ticker::from_millis(100);

        assert_eq!(ticker.tick(Duration::from_millis(60)), 0);
        assert_eq!(ticker.tick(Duration::from_millis(60)), 1);
        assert_eq!(ticker.tick(Duration::from_millis(250)), 2);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut ticker = Ticker::from_millis(100);
        ticker.stop();
        ticker.stop();

        assert!(!ticker.is_running());
        assert_eq!(ticker.tick(Duration::from_secs(10)), 0);

        ticker.start();
        assert!(ticker.should_run(Duration::from_millis(100)));
    }

    #[test]
    fn test_delay_queue_orders_by_due_time() {
        let mut queue = DelayQueue::default();
        queue.schedule(3.0, "c");
        queue.schedule(1.0, "a");
        queue.schedule(2.0, "b");
        queue.schedule(1.0, "a2");

        assert_eq!(queue.next_due(), Some(1.0));
        assert_eq!(queue.drain_due(1.5), vec!["a", "a2"]);
        assert_eq!(queue.drain_due(0.5), Vec::<&str>::new());
        assert_eq!(queue.drain_due(10.0), vec!["b", "c"]);
        assert!(queue.is_empty());
    }
}
