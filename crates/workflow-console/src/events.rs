use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::debug;

use crate::payload::Payload;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message,
    Error,
    Done,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Message => "message",
            EventKind::Error => "error",
            EventKind::Done => "done",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timeline entry. `t` is milliseconds since the Unix epoch.
#[derive(Clone, Debug)]
pub struct EventEntry {
    pub t: f64,
    pub kind: EventKind,
    pub payload: Option<Payload>,
}

impl EventEntry {
    pub fn new(t: f64, kind: EventKind, payload: Option<Payload>) -> Self {
        Self { t, kind, payload }
    }

    pub fn message(t: f64, payload: impl Into<Payload>) -> Self {
        Self::new(t, EventKind::Message, Some(payload.into()))
    }

    pub fn error(t: f64, payload: impl Into<Payload>) -> Self {
        Self::new(t, EventKind::Error, Some(payload.into()))
    }

    pub fn done(t: f64, payload: impl Into<Payload>) -> Self {
        Self::new(t, EventKind::Done, Some(payload.into()))
    }

    /// Reads `field` from an object payload.
    pub fn payload_field(&self, field: &str) -> Option<Payload> {
        self.payload.as_ref()?.field(field)
    }

    /// The payload's `stage` when it is a string.
    pub fn stage(&self) -> Option<String> {
        self.payload_field("stage")
            .and_then(|stage| stage.as_str().map(str::to_owned))
    }
}

pub(crate) fn now_millis() -> f64 {
    Utc::now().timestamp_millis() as f64
}

/// Shared, append-only list of events.
///
/// Each append publishes a fresh snapshot, so readers holding an older one
/// never observe partial updates.
#[derive(Clone)]
pub struct EventTimeline {
    events: Arc<watch::Sender<Arc<Vec<EventEntry>>>>,
}

impl Default for EventTimeline {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTimeline {
    pub fn new() -> Self {
        let (events, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            events: Arc::new(events),
        }
    }

    /// Appends an entry stamped with the current time and returns it.
    pub fn push(&self, kind: EventKind, payload: Option<Payload>) -> EventEntry {
        let entry = EventEntry::new(now_millis(), kind, payload);
        self.push_entry(entry.clone());
        entry
    }

    pub fn push_entry(&self, entry: EventEntry) {
        self.events.send_modify(|events| {
            let mut next = Vec::with_capacity(events.len() + 1);
            next.extend(events.iter().cloned());
            next.push(entry);
            *events = Arc::new(next);
        });
        debug!(count = self.len(), "timeline event appended");
    }

    pub fn snapshot(&self) -> Arc<Vec<EventEntry>> {
        self.events.borrow().clone()
    }

    /// Entries ordered by timestamp; equal timestamps keep insertion order.
    pub fn sorted(&self) -> Vec<EventEntry> {
        let mut events = self.snapshot().as_ref().clone();
        events.sort_by(|a, b| a.t.partial_cmp(&b.t).unwrap_or(Ordering::Equal));
        events
    }

    pub fn clear(&self) {
        self.events.send_replace(Arc::new(Vec::new()));
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<EventEntry>>> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_is_stable_for_equal_timestamps() {
        let timeline = EventTimeline::new();
        timeline.push_entry(EventEntry::message(5.0, "late"));
        timeline.push_entry(EventEntry::message(1.0, "first"));
        timeline.push_entry(EventEntry::message(1.0, "second"));

        let texts: Vec<_> = timeline
            .sorted()
            .iter()
            .map(|e| e.payload.as_ref().and_then(Payload::as_str).unwrap_or_default().to_string())
            .collect();
        assert_eq!(texts, vec!["first", "second", "late"]);
    }

    #[test]
    fn held_snapshot_is_unaffected_by_later_appends() {
        let timeline = EventTimeline::new();
        timeline.push(EventKind::Message, Some("one".into()));
        let held = timeline.snapshot();
        timeline.push(EventKind::Done, None);
        assert_eq!(held.len(), 1);
        assert_eq!(timeline.len(), 2);

        timeline.clear();
        assert!(timeline.is_empty());
        assert_eq!(held.len(), 1);
    }

    #[test]
    fn push_stamps_current_time() {
        let timeline = EventTimeline::new();
        let before = now_millis();
        let entry = timeline.push(EventKind::Error, Some("boom".into()));
        assert!(entry.t >= before);
        assert_eq!(entry.kind.to_string(), "error");
    }

    #[test]
    fn stage_reads_object_payloads_only() {
        let done = EventEntry::done(1.0, Payload::object([("stage", "run")]));
        assert_eq!(done.stage().as_deref(), Some("run"));
        assert_eq!(EventEntry::done(1.0, "run").stage(), None);
        assert_eq!(EventEntry::new(1.0, EventKind::Done, None).stage(), None);
    }
}
