//! Exam clock: a pure one-second countdown plus a tokio driver for it.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

const FINAL_MINUTES_WARNING_SECONDS: u64 = 5 * 60;
const FINAL_MINUTES_RULE_ABOVE_SECONDS: u64 = 30 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CountdownEnd {
    TimeUp,
    EndedEarly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tick {
    Running { remaining_seconds: u64 },
    /// Returned by exactly one call over the countdown's lifetime.
    Finished(CountdownEnd),
    AlreadyFinished,
}

#[derive(Debug, Clone)]
pub(crate) struct Countdown {
    total_seconds: u64,
    remaining_seconds: u64,
    outcome: Option<CountdownEnd>,
}

impl Countdown {
    pub(crate) fn new(duration_minutes: u32) -> Self {
        let total_seconds = u64::from(duration_minutes) * 60;
        Self { total_seconds, remaining_seconds: total_seconds, outcome: None }
    }

    pub(crate) fn tick(&mut self) -> Tick {
        if self.is_finished() {
            return Tick::AlreadyFinished;
        }

        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.outcome = Some(CountdownEnd::TimeUp);
            return Tick::Finished(CountdownEnd::TimeUp);
        }

        Tick::Running { remaining_seconds: self.remaining_seconds }
    }

    /// Forces the terminal state. `None` when the countdown had already finished.
    pub(crate) fn end_now(&mut self) -> Option<CountdownEnd> {
        if self.is_finished() {
            return None;
        }

        self.outcome = Some(CountdownEnd::EndedEarly);
        self.outcome
    }

    pub(crate) fn total_seconds(&self) -> u64 {
        self.total_seconds
    }

    pub(crate) fn remaining_seconds(&self) -> u64 {
        self.remaining_seconds
    }

    pub(crate) fn outcome(&self) -> Option<CountdownEnd> {
        self.outcome
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.outcome().is_some()
    }

    /// Presentation hint: on for the last five minutes of tests longer than
    /// half an hour, otherwise for the last 10% of the total.
    pub(crate) fn is_warning(&self) -> bool {
        self.remaining_seconds <= self.warning_threshold_seconds()
    }

    pub(crate) fn warning_threshold_seconds(&self) -> u64 {
        if self.total_seconds > FINAL_MINUTES_RULE_ABOVE_SECONDS {
            FINAL_MINUTES_WARNING_SECONDS
        } else {
            self.total_seconds / 10
        }
    }

    pub(crate) fn percent_remaining(&self) -> f64 {
        if self.total_seconds == 0 {
            return 0.0;
        }
        self.remaining_seconds as f64 * 100.0 / self.total_seconds as f64
    }

    pub(crate) fn display(&self) -> String {
        format_time_remaining(self.remaining_seconds)
    }
}

/// `HH:MM:SS` from one hour up, `MM:SS` below.
pub(crate) fn format_time_remaining(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let rest = seconds % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{rest:02}")
    } else {
        format!("{minutes:02}:{rest:02}")
    }
}

struct Shared {
    countdown: Countdown,
    remaining: watch::Sender<u64>,
    finished: watch::Sender<Option<CountdownEnd>>,
}

impl Shared {
    fn settle(&mut self, end: CountdownEnd) {
        self.remaining.send_replace(self.countdown.remaining_seconds());
        self.finished.send_replace(Some(end));
    }
}

/// Runs a [`Countdown`] on a one-second interval. The end signal is published
/// once, by whichever of the ticker or [`CountdownHandle::end_now`] gets there first.
pub(crate) struct CountdownHandle {
    shared: Arc<Mutex<Shared>>,
    remaining: watch::Receiver<u64>,
    finished: watch::Receiver<Option<CountdownEnd>>,
    task: JoinHandle<()>,
}

impl CountdownHandle {
    pub(crate) fn spawn(countdown: Countdown) -> Self {
        let (remaining_tx, remaining) = watch::channel(countdown.remaining_seconds());
        let (finished_tx, finished) = watch::channel(None);
        let shared = Arc::new(Mutex::new(Shared {
            countdown,
            remaining: remaining_tx,
            finished: finished_tx,
        }));

        let task = tokio::spawn(run_ticker(shared.clone()));
        Self { shared, remaining, finished, task }
    }

    pub(crate) async fn end_now(&self) -> bool {
        let mut shared = self.shared.lock().await;
        match shared.countdown.end_now() {
            Some(end) => {
                shared.settle(end);
                self.task.abort();
                true
            }
            None => false,
        }
    }

    pub(crate) async fn snapshot(&self) -> Countdown {
        self.shared.lock().await.countdown.clone()
    }

    pub(crate) fn remaining(&self) -> watch::Receiver<u64> {
        self.remaining.clone()
    }

    /// Resolves once the countdown has reached its terminal state.
    pub(crate) async fn finished(&self) -> CountdownEnd {
        let mut finished = self.finished.clone();
        let end = match finished.wait_for(Option::is_some).await {
            Ok(end) => (*end).unwrap_or(CountdownEnd::EndedEarly),
            // The sender lives as long as `self`.
            Err(_) => CountdownEnd::EndedEarly,
        };
        end
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_ticker(shared: Arc<Mutex<Shared>>) {
    let mut ticker = interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let mut shared = shared.lock().await;
        match shared.countdown.tick() {
            Tick::Running { remaining_seconds } => {
                shared.remaining.send_replace(remaining_seconds);
            }
            Tick::Finished(end) => {
                tracing::debug!(?end, "Countdown reached zero");
                shared.settle(end);
                break;
            }
            Tick::AlreadyFinished => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_minute_finishes_once_after_sixty_ticks() {
        let mut countdown = Countdown::new(1);
        assert_eq!(countdown.remaining_seconds(), 60);

        let mut finished = 0;
        for _ in 0..60 {
            if let Tick::Finished(end) = countdown.tick() {
                assert_eq!(end, CountdownEnd::TimeUp);
                finished += 1;
            }
        }
        assert_eq!(finished, 1);
        assert_eq!(countdown.remaining_seconds(), 0);

        assert_eq!(countdown.tick(), Tick::AlreadyFinished);
        assert_eq!(countdown.end_now(), None);
        assert_eq!(countdown.outcome(), Some(CountdownEnd::TimeUp));
    }

    #[test]
    fn ending_early_freezes_the_clock() {
        let mut countdown = Countdown::new(1);
        for _ in 0..10 {
            countdown.tick();
        }

        assert_eq!(countdown.end_now(), Some(CountdownEnd::EndedEarly));
        assert!(countdown.is_finished());
        for _ in 0..100 {
            assert_eq!(countdown.tick(), Tick::AlreadyFinished);
        }
        assert_eq!(countdown.remaining_seconds(), 50);
        assert_eq!(countdown.end_now(), None);
    }

    fn warning_at(countdown: &mut Countdown, remaining: u64) -> bool {
        while countdown.remaining_seconds() > remaining {
            countdown.tick();
        }
        countdown.is_warning()
    }

    #[test]
    fn hour_long_test_warns_in_the_last_five_minutes() {
        let mut countdown = Countdown::new(60);
        assert!(!countdown.is_warning());
        assert!(!warning_at(&mut countdown, 360));
        assert!(!warning_at(&mut countdown, 301));
        assert!(warning_at(&mut countdown, 300));
        assert!(warning_at(&mut countdown, 1));
    }

    #[test]
    fn short_test_warns_in_the_last_tenth() {
        let mut countdown = Countdown::new(10);
        assert!(!warning_at(&mut countdown, 299));
        assert!(!warning_at(&mut countdown, 61));
        assert!(warning_at(&mut countdown, 60));
        assert!(warning_at(&mut countdown, 1));
    }

    #[test]
    fn forty_minute_test_warns_in_the_last_five_minutes() {
        let mut countdown = Countdown::new(40);
        assert!(!warning_at(&mut countdown, 301));
        assert!(warning_at(&mut countdown, 299));
        assert!(warning_at(&mut countdown, 240));
    }

    #[test]
    fn five_minute_rule_starts_above_half_an_hour() {
        assert_eq!(Countdown::new(5).warning_threshold_seconds(), 30);
        assert_eq!(Countdown::new(30).warning_threshold_seconds(), 180);
        assert_eq!(Countdown::new(31).warning_threshold_seconds(), 300);
        assert_eq!(Countdown::new(40).warning_threshold_seconds(), 300);
        assert_eq!(Countdown::new(60).warning_threshold_seconds(), 300);
        assert_eq!(Countdown::new(180).warning_threshold_seconds(), 300);
    }

    #[test]
    fn percent_remaining_tracks_ticks() {
        let mut countdown = Countdown::new(5);
        assert_eq!(countdown.percent_remaining(), 100.0);
        for _ in 0..150 {
            countdown.tick();
        }
        assert_eq!(countdown.percent_remaining(), 50.0);
    }

    #[test]
    fn format_switches_to_hours() {
        assert_eq!(format_time_remaining(0), "00:00");
        assert_eq!(format_time_remaining(59), "00:59");
        assert_eq!(format_time_remaining(300), "05:00");
        assert_eq!(format_time_remaining(3599), "59:59");
        assert_eq!(format_time_remaining(3600), "01:00:00");
        assert_eq!(format_time_remaining(10_800), "03:00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn driver_fires_time_up_after_the_full_duration() {
        let started = tokio::time::Instant::now();
        let handle = CountdownHandle::spawn(Countdown::new(1));

        assert_eq!(handle.finished().await, CountdownEnd::TimeUp);
        assert_eq!(started.elapsed(), Duration::from_secs(60));
        assert_eq!(*handle.remaining().borrow(), 0);
        assert!(!handle.end_now().await);
    }

    #[tokio::test(start_paused = true)]
    async fn driver_end_now_wins_and_stops_ticking() {
        let handle = CountdownHandle::spawn(Countdown::new(1));
        tokio::time::sleep(Duration::from_millis(10_500)).await;

        assert!(handle.end_now().await);
        assert!(!handle.end_now().await);
        assert_eq!(handle.finished().await, CountdownEnd::EndedEarly);

        tokio::time::sleep(Duration::from_secs(120)).await;
        let snapshot = handle.snapshot().await;
        assert_eq!(snapshot.remaining_seconds(), 50);
        assert_eq!(snapshot.outcome(), Some(CountdownEnd::EndedEarly));
        assert_eq!(*handle.remaining().borrow(), 50);
    }
}
