//! # Delayed Engine Messages
//!
//! The face has two recurring wake-ups, both self-rescheduling: each time a
//! message is handled the engine decides whether to post the next one. Delays
//! are computed from the wall clock so wake-ups stay aligned to period
//! boundaries and drift never accumulates.
//!
//! | Message | Period | Runs while |
//! |---|---|---|
//! | [`MessageKind::UpdateTime`] | 500 ms | visible and interactive |
//! | [`MessageKind::UpdateWeather`] | 24 h | after the first sync connection |
//!
//! Removing a message cancels it outright; a removed wake-up never fires.
//!
//! ## Generations
//! A wake-up that has already fired may still be waiting in the engine's
//! event channel when its kind is removed. Every message therefore carries
//! the generation of its kind at send time, and `remove_messages` advances
//! that generation. The engine drops any [`TimerMessage`] for which
//! [`Scheduler::is_current`] is false.

use crate::engine::EngineEvent;
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

/// Redraw cadence in interactive mode; twice a second so the colon blinks
pub const INTERACTIVE_UPDATE_RATE_MS: i64 = 500;

pub const DAY_IN_MILLIS: i64 = 24 * 60 * 60 * 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    UpdateTime,
    UpdateWeather,
}

/// One scheduled wake-up, as delivered back to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerMessage {
    pub kind: MessageKind,
    pub generation: u64,
}

impl fmt::Display for TimerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.kind, self.generation)
    }
}

/// Per-kind generation counters shared by both schedulers.
#[derive(Debug, Default)]
struct Generations(HashMap<MessageKind, u64>);

impl Generations {
    fn current(&self, kind: MessageKind) -> u64 {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    fn message(&self, kind: MessageKind) -> TimerMessage {
        TimerMessage {
            kind,
            generation: self.current(kind),
        }
    }

    fn advance(&mut self, kind: MessageKind) {
        *self.0.entry(kind).or_insert(0) += 1;
    }

    fn is_current(&self, message: TimerMessage) -> bool {
        message.generation == self.current(message.kind)
    }
}

/// Time until the next multiple of `period_ms`. Never zero: on a boundary the
/// next boundary is a full period away.
pub fn delay_to_next_boundary(now_millis: i64, period_ms: i64) -> Duration {
    let delay = period_ms - now_millis.rem_euclid(period_ms);
    Duration::from_millis(delay as u64)
}

/// Pending-message queue owned by one face.
pub trait Scheduler {
    fn send_delayed(&mut self, kind: MessageKind, delay: Duration);

    fn send_now(&mut self, kind: MessageKind) {
        self.send_delayed(kind, Duration::ZERO);
    }

    /// Cancel every pending message of `kind`, including ones already delivered
    /// but not yet handled.
    fn remove_messages(&mut self, kind: MessageKind);

    fn has_messages(&self, kind: MessageKind) -> bool;

    /// False for a message whose kind was removed after it was sent.
    fn is_current(&self, message: TimerMessage) -> bool;
}

/// Posts [`EngineEvent::Timer`] onto the engine's event channel after a
/// tokio sleep. Pending sleeps are aborted on removal and on drop.
pub struct TokioScheduler {
    events: UnboundedSender<EngineEvent>,
    pending: HashMap<MessageKind, Vec<JoinHandle<()>>>,
    generations: Generations,
}

impl TokioScheduler {
    pub fn new(events: UnboundedSender<EngineEvent>) -> Self {
        Self {
            events,
            pending: HashMap::new(),
            generations: Generations::default(),
        }
    }
}

impl Scheduler for TokioScheduler {
    fn send_delayed(&mut self, kind: MessageKind, delay: Duration) {
        let events = self.events.clone();
        let message = self.generations.message(kind);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the loop is shutting down
            let _ = events.send(EngineEvent::Timer(message));
        });
        let handles = self.pending.entry(kind).or_default();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    fn remove_messages(&mut self, kind: MessageKind) {
        self.generations.advance(kind);
        if let Some(handles) = self.pending.remove(&kind) {
            for handle in handles.iter().filter(|h| !h.is_finished()) {
                debug!("cancelling pending {:?}", kind);
                handle.abort();
            }
        }
    }

    fn has_messages(&self, kind: MessageKind) -> bool {
        self.pending
            .get(&kind)
            .is_some_and(|handles| handles.iter().any(|h| !h.is_finished()))
    }

    fn is_current(&self, message: TimerMessage) -> bool {
        self.generations.is_current(message)
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for handle in self.pending.values().flatten() {
            handle.abort();
        }
    }
}

/// Deterministic scheduler: messages sit in a queue until the caller fires
/// them with [`ManualScheduler::take_due`]. Used for replays and tests.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    queue: Vec<(TimerMessage, Duration)>,
    generations: Generations,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &[(TimerMessage, Duration)] {
        &self.queue
    }

    pub fn count(&self, kind: MessageKind) -> usize {
        self.queue.iter().filter(|(m, _)| m.kind == kind).count()
    }

    /// Delay of the earliest pending message of `kind`.
    pub fn next_delay(&self, kind: MessageKind) -> Option<Duration> {
        self.queue
            .iter()
            .filter(|(m, _)| m.kind == kind)
            .map(|(_, d)| *d)
            .min()
    }

    /// Pop the earliest pending message of `kind`, as if it had fired.
    pub fn take_due(&mut self, kind: MessageKind) -> Option<TimerMessage> {
        let index = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, (m, _))| m.kind == kind)
            .min_by_key(|(_, (_, d))| *d)
            .map(|(i, _)| i)?;
        Some(self.queue.remove(index).0)
    }
}

impl Scheduler for ManualScheduler {
    fn send_delayed(&mut self, kind: MessageKind, delay: Duration) {
        self.queue.push((self.generations.message(kind), delay));
    }

    fn remove_messages(&mut self, kind: MessageKind) {
        self.generations.advance(kind);
        self.queue.retain(|(m, _)| m.kind != kind);
    }

    fn has_messages(&self, kind: MessageKind) -> bool {
        self.count(kind) > 0
    }

    fn is_current(&self, message: TimerMessage) -> bool {
        self.generations.is_current(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_delay_aligns_to_half_second() {
        let p = INTERACTIVE_UPDATE_RATE_MS;
        assert_eq!(delay_to_next_boundary(1_000, p), Duration::from_millis(500));
        assert_eq!(delay_to_next_boundary(1_001, p), Duration::from_millis(499));
        assert_eq!(delay_to_next_boundary(1_499, p), Duration::from_millis(1));
        assert_eq!(delay_to_next_boundary(1_500, p), Duration::from_millis(500));
    }

    #[test]
    fn test_delay_aligns_to_day() {
        let noon = DAY_IN_MILLIS * 19_000 + DAY_IN_MILLIS / 2;
        assert_eq!(
            delay_to_next_boundary(noon, DAY_IN_MILLIS),
            Duration::from_millis((DAY_IN_MILLIS / 2) as u64)
        );
    }

    #[test]
    fn test_manual_scheduler_remove_and_take() {
        let mut s = ManualScheduler::new();
        s.send_delayed(MessageKind::UpdateTime, Duration::from_millis(300));
        s.send_now(MessageKind::UpdateTime);
        s.send_now(MessageKind::UpdateWeather);

        assert_eq!(s.count(MessageKind::UpdateTime), 2);
        let fired = s.take_due(MessageKind::UpdateTime).unwrap();
        assert_eq!(fired.kind, MessageKind::UpdateTime);
        assert!(s.is_current(fired));
        assert_eq!(s.next_delay(MessageKind::UpdateTime), Some(Duration::from_millis(300)));

        s.remove_messages(MessageKind::UpdateTime);
        assert!(!s.has_messages(MessageKind::UpdateTime));
        assert!(s.has_messages(MessageKind::UpdateWeather));
        // Taken before the removal, so no longer current
        assert!(!s.is_current(fired));

        s.send_now(MessageKind::UpdateTime);
        let fresh = s.take_due(MessageKind::UpdateTime).unwrap();
        assert!(s.is_current(fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut s = TokioScheduler::new(tx);

        s.send_delayed(MessageKind::UpdateTime, Duration::from_millis(500));
        assert!(s.has_messages(MessageKind::UpdateTime));

        let event = rx.recv().await.unwrap();
        match event {
            EngineEvent::Timer(message) => {
                assert_eq!(message.kind, MessageKind::UpdateTime);
                assert!(s.is_current(message));
            }
            other => panic!("expected a timer event, got {:?}", other),
        }
        tokio::task::yield_now().await;
        assert!(!s.has_messages(MessageKind::UpdateTime));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_delivered_message_goes_stale_on_remove() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut s = TokioScheduler::new(tx);

        s.send_now(MessageKind::UpdateTime);
        let Some(EngineEvent::Timer(delivered)) = rx.recv().await else {
            panic!("expected a timer event");
        };
        // Already in the channel, too late to abort
        s.remove_messages(MessageKind::UpdateTime);
        assert!(!s.is_current(delivered));
        assert!(s.is_current(TimerMessage {
            kind: MessageKind::UpdateWeather,
            generation: 0,
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_scheduler_removed_message_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut s = TokioScheduler::new(tx);

        s.send_delayed(MessageKind::UpdateTime, Duration::from_millis(500));
        s.send_delayed(MessageKind::UpdateWeather, Duration::from_secs(60));
        s.remove_messages(MessageKind::UpdateTime);
        assert!(!s.has_messages(MessageKind::UpdateTime));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());

        drop(s);
        tokio::time::sleep(Duration::from_secs(120)).await;
        // Every sender clone has been dropped with its aborted task
        assert!(rx.recv().await.is_none());
    }
}
