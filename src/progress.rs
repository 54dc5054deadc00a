//! Synthetic upload progress.
//!
//! The transport gives no byte-level upload progress, so while a request is in
//! flight the bar ramps by a fixed step per tick and stops at a ceiling below
//! 100. Only a settled, successful request moves it to 100.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

pub const COMPLETE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSettings {
    pub step: u8,
    pub ceiling: u8,
    pub tick: Duration,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            step: 10,
            ceiling: 90,
            tick: Duration::from_millis(200),
        }
    }
}

pub struct ProgressSimulator {
    settings: ProgressSettings,
    sender: watch::Sender<u8>,
}

impl ProgressSimulator {
    pub fn new(settings: ProgressSettings) -> Self {
        let settings = ProgressSettings {
            ceiling: settings.ceiling.min(COMPLETE - 1),
            ..settings
        };
        let (sender, _) = watch::channel(0);
        Self { settings, sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<u8> {
        self.sender.subscribe()
    }

    pub fn value(&self) -> u8 {
        *self.sender.borrow()
    }

    pub fn settings(&self) -> ProgressSettings {
        self.settings
    }

    /// One tick of the ramp. Never decreases and never reaches [`COMPLETE`].
    pub fn advance(&self) -> u8 {
        let ceiling = self.settings.ceiling;
        let step = self.settings.step;
        self.sender.send_modify(|value| {
            if *value < ceiling {
                *value = value.saturating_add(step).min(ceiling);
            }
        });
        self.value()
    }

    pub fn complete(&self) {
        self.sender.send_replace(COMPLETE);
    }

    pub fn reset(&self) {
        self.sender.send_replace(0);
    }

    /// Ramps from zero while `future` is pending. Leaves the value where the
    /// ramp stopped; callers decide between [`complete`](Self::complete) and
    /// [`reset`](Self::reset) once the request settles.
    pub async fn drive<F: Future>(&self, future: F) -> F::Output {
        self.reset();
        tokio::pin!(future);

        let tick = self.settings.tick.max(Duration::from_millis(1));
        let mut ticker = time::interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                output = &mut future => return output,
                _ = ticker.tick() => {
                    let value = self.advance();
                    debug!(progress = value, "upload progress tick");
                }
            }
        }
    }

    pub fn status_label(&self) -> String {
        let value = self.value();
        if value < COMPLETE {
            format!("Uploading... {value}%")
        } else {
            "Processing...".to_string()
        }
    }
}

impl Default for ProgressSimulator {
    fn default() -> Self {
        Self::new(ProgressSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_clamps_at_ceiling() {
        let progress = ProgressSimulator::new(ProgressSettings {
            step: 30,
            ceiling: 80,
            tick: Duration::from_millis(10),
        });

        assert_eq!(progress.advance(), 30);
        assert_eq!(progress.advance(), 60);
        assert_eq!(progress.advance(), 80);
        assert_eq!(progress.advance(), 80);
    }

    #[test]
    fn ceiling_is_kept_below_complete() {
        let progress = ProgressSimulator::new(ProgressSettings {
            step: 50,
            ceiling: 250,
            tick: Duration::from_millis(10),
        });

        for _ in 0..10 {
            progress.advance();
        }
        assert_eq!(progress.value(), 99);
        assert_eq!(progress.status_label(), "Uploading... 99%");
    }

    #[test]
    fn complete_and_reset() {
        let progress = ProgressSimulator::default();
        progress.advance();
        progress.complete();
        assert_eq!(progress.value(), COMPLETE);
        assert_eq!(progress.status_label(), "Processing...");

        progress.reset();
        assert_eq!(progress.value(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drive_ramps_until_future_settles() {
        let progress = ProgressSimulator::default();
        let receiver = progress.subscribe();

        let output = progress
            .drive(async {
                time::sleep(Duration::from_secs(10)).await;
                "done"
            })
            .await;

        assert_eq!(output, "done");
        assert_eq!(progress.value(), 90);
        assert_eq!(*receiver.borrow(), 90);
    }

    #[tokio::test(start_paused = true)]
    async fn drive_returns_immediately_for_ready_future() {
        let progress = ProgressSimulator::default();
        progress.complete();

        progress.drive(async {}).await;

        assert_eq!(progress.value(), 0);
    }
}
