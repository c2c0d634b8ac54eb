//! Timed reveal of secret values.
//!
//! Revealing an id starts a hide timer. Revealing or toggling again replaces
//! the timer instead of stacking another one, and [`TimedReveal::teardown`]
//! cancels every pending timer.

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

struct Slot {
    revealed: bool,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

type Slots<K> = Mutex<HashMap<K, Slot>>;

fn lock<K>(slots: &Slots<K>) -> MutexGuard<'_, HashMap<K, Slot>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Per-id revealed flag with one auto-hide timer per id.
pub struct TimedReveal<K> {
    duration: Duration,
    slots: Arc<Slots<K>>,
}

impl<K> TimedReveal<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Show `id` and (re)start its hide timer.
    pub fn reveal(&self, id: K) {
        let mut slots = lock(&self.slots);
        let slot = slots.entry(id.clone()).or_insert(Slot {
            revealed: false,
            generation: 0,
            timer: None,
        });

        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        slot.revealed = true;
        slot.generation += 1;

        let generation = slot.generation;
        let weak: Weak<Slots<K>> = Arc::downgrade(&self.slots);
        let duration = self.duration;
        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let Some(slots) = weak.upgrade() else {
                return;
            };
            let mut slots = lock(&slots);
            if let Some(slot) = slots.get_mut(&id) {
                // A newer reveal owns the slot now.
                if slot.generation == generation {
                    slot.revealed = false;
                    slot.timer = None;
                }
            }
        }));
    }

    /// Hide `id` now and cancel its timer.
    pub fn hide(&self, id: &K) {
        let mut slots = lock(&self.slots);
        if let Some(slot) = slots.get_mut(id) {
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
            slot.revealed = false;
            slot.generation += 1;
        }
    }

    /// Flip `id`. Returns the new revealed state.
    pub fn toggle(&self, id: K) -> bool {
        if self.is_revealed(&id) {
            self.hide(&id);
            false
        } else {
            self.reveal(id);
            true
        }
    }

    pub fn is_revealed(&self, id: &K) -> bool {
        lock(&self.slots).get(id).is_some_and(|slot| slot.revealed)
    }

    /// Hide timers still pending.
    pub fn pending_timers(&self) -> usize {
        lock(&self.slots)
            .values()
            .filter(|slot| slot.timer.as_ref().is_some_and(|t| !t.is_finished()))
            .count()
    }

    /// Cancel every timer and hide everything.
    pub fn teardown(&self) {
        let mut slots = lock(&self.slots);
        for slot in slots.values_mut() {
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
            slot.revealed = false;
        }
    }
}

impl<K> Drop for TimedReveal<K> {
    fn drop(&mut self) {
        let mut slots = lock(&self.slots);
        for slot in slots.values_mut() {
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
        }
    }
}

/// An API key that renders masked unless revealed.
pub struct ApiKeySecret {
    key_id: String,
    secret: SecretString,
}

impl ApiKeySecret {
    pub fn new(key_id: impl Into<String>, secret: SecretString) -> Self {
        Self {
            key_id: key_id.into(),
            secret,
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Full key when revealed, otherwise only the last four characters.
    pub fn render(&self, revealed: bool) -> String {
        let key = self.secret.expose_secret();
        if revealed {
            return key.clone();
        }
        let chars: Vec<char> = key.chars().collect();
        let visible = if chars.len() > 8 { 4 } else { 0 };
        let hidden = chars.len() - visible;
        let tail: String = chars[hidden..].iter().collect();
        format!("{}{}", "*".repeat(hidden), tail)
    }
}

impl TimedReveal<String> {
    /// Render a key according to its current reveal state.
    pub fn render_key(&self, key: &ApiKeySecret) -> String {
        key.render(self.is_revealed(&key.key_id))
    }
}
