//! Per-session poll timers.

use crate::orchestrator::Event;
use chrono::{DateTime, Utc};
use rental_store::{RentalSession, SessionId};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Timers started and stopped by one reconcile pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Reconciled {
    pub started: Vec<SessionId>,
    pub stopped: Vec<SessionId>,
}

/// One repeating tick source per session that needs polling.
///
/// Timers only emit [`Event::Tick`]; the orchestrator decides whether a tick
/// turns into a check.
pub struct PollTimers {
    period: Duration,
    events: mpsc::UnboundedSender<Event>,
    timers: HashMap<SessionId, JoinHandle<()>>,
}

impl PollTimers {
    pub(crate) fn new(period: Duration, events: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            period,
            events,
            timers: HashMap::new(),
        }
    }

    /// Make the running timers match exactly the sessions that need a poll at `now`.
    pub fn reconcile(&mut self, sessions: &[RentalSession], now: DateTime<Utc>) -> Reconciled {
        let wanted: HashSet<&str> = sessions
            .iter()
            .filter(|s| s.needs_poll(now))
            .map(|s| s.session_id.as_str())
            .collect();

        let mut outcome = Reconciled::default();

        let stale: Vec<SessionId> = self
            .timers
            .keys()
            .filter(|id| !wanted.contains(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            self.stop(&id);
            outcome.stopped.push(id);
        }

        for id in wanted {
            if !self.timers.contains_key(id) {
                self.start(id);
                outcome.started.push(id.to_string());
            }
        }

        outcome.started.sort();
        outcome.stopped.sort();
        outcome
    }

    fn start(&mut self, session_id: &str) {
        let events = self.events.clone();
        let period = self.period;
        let id = session_id.to_string();
        let first_tick = Instant::now() + period;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if events.send(Event::Tick(id.clone())).is_err() {
                    break;
                }
            }
        });

        debug!(session_id, "Poll timer started ({:?})", period);
        self.timers.insert(session_id.to_string(), handle);
    }

    /// Stop one session's timer. Returns whether one was running.
    pub fn stop(&mut self, session_id: &str) -> bool {
        match self.timers.remove(session_id) {
            Some(handle) => {
                handle.abort();
                debug!(session_id, "Poll timer stopped");
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.timers.contains_key(session_id)
    }

    /// Ids with a running timer, sorted.
    pub fn active(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.timers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl Drop for PollTimers {
    fn drop(&mut self) {
        self.stop_all();
    }
}
