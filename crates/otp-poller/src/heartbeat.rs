//! Coarse rental-list refresh, gated on waiting sessions.

use crate::orchestrator::Event;
use rental_store::RentalSession;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Emits [`Event::Heartbeat`] while at least one session is allocated or
/// waiting for its code, and stays silent otherwise.
pub struct Heartbeat {
    enabled: bool,
    period: Duration,
    events: mpsc::UnboundedSender<Event>,
    task: Option<JoinHandle<()>>,
}

impl Heartbeat {
    pub(crate) fn new(
        enabled: bool,
        period: Duration,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            enabled,
            period,
            events,
            task: None,
        }
    }

    /// Start or stop the refresh for the current sessions. Returns whether it runs.
    pub fn update(&mut self, sessions: &[RentalSession]) -> bool {
        let wanted = self.enabled && sessions.iter().any(|s| s.status.is_awaiting_otp());

        match (wanted, self.task.is_some()) {
            (true, false) => self.start(),
            (false, true) => self.stop(),
            _ => {}
        }
        wanted
    }

    fn start(&mut self) {
        let events = self.events.clone();
        let period = self.period;
        let first_beat = Instant::now() + period;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(first_beat, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if events.send(Event::Heartbeat).is_err() {
                    break;
                }
            }
        }));
        debug!("Heartbeat started ({:?})", period);
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Heartbeat stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}
