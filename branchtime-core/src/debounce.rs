use crate::timer::Timer;
use std::collections::HashMap;
use std::hash::Hash;

/// Raw activity sources reported by the host editor. Each source is
/// debounced on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalKind {
    DocumentChanged,
    DocumentSaved,
    DocumentOpened,
    ActiveEditorChanged,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::DocumentChanged => "document-changed",
            SignalKind::DocumentSaved => "document-saved",
            SignalKind::DocumentOpened => "document-opened",
            SignalKind::ActiveEditorChanged => "active-editor-changed",
        }
    }
}

#[derive(Debug)]
struct Pending<P> {
    payload: P,
    timer: Timer,
    seq: u64,
}

/// Trailing-edge debouncer keyed by signal source.
///
/// Every push restarts the window for its key and replaces the payload, so
/// a burst yields exactly one delivery carrying the last payload, one window
/// after the last signal.
#[derive(Debug)]
pub struct Debouncer<K, P> {
    window_ms: i64,
    pending: HashMap<K, Pending<P>>,
    next_seq: u64,
}

impl<K: Eq + Hash + Clone, P> Debouncer<K, P> {
    pub fn new(window_ms: i64) -> Self {
        Self {
            window_ms: window_ms.max(0),
            pending: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn push(&mut self, key: K, payload: P, now_ms: i64) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let mut timer = Timer::new();
        timer.arm_after(now_ms, self.window_ms);
        self.pending.insert(key, Pending { payload, timer, seq });
    }

    /// Earliest deadline across all keys.
    pub fn next_deadline(&self) -> Option<i64> {
        self.pending
            .values()
            .filter_map(|pending| pending.timer.deadline())
            .min()
    }

    /// Remove and return every delivery whose window has elapsed, as
    /// `(fire_at, key, payload)` in firing order.
    pub fn take_due(&mut self, now_ms: i64) -> Vec<(i64, K, P)> {
        let mut due: Vec<(i64, u64, K)> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.timer.is_due(now_ms))
            .filter_map(|(key, pending)| {
                pending
                    .timer
                    .deadline()
                    .map(|at| (at, pending.seq, key.clone()))
            })
            .collect();
        due.sort_by_key(|(at, seq, _)| (*at, *seq));

        due.into_iter()
            .filter_map(|(at, _, key)| {
                self.pending
                    .remove(&key)
                    .map(|pending| (at, key, pending.payload))
            })
            .collect()
    }

    /// Drop everything pending without delivering it.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Coalesce a timestamped signal stream into the deliveries a [`Debouncer`]
/// with the given window would make. Input order is preserved for equal
/// timestamps; output is `(fire_at, key, payload)`.
pub fn coalesce<K, P, I>(events: I, window_ms: i64) -> Vec<(i64, K, P)>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = (i64, K, P)>,
{
    let mut events: Vec<(i64, K, P)> = events.into_iter().collect();
    events.sort_by_key(|(at, _, _)| *at);

    let mut debouncer = Debouncer::new(window_ms);
    let mut delivered = Vec::new();

    for (at, key, payload) in events {
        delivered.extend(debouncer.take_due(at));
        debouncer.push(key, payload, at);
    }
    delivered.extend(debouncer.take_due(i64::MAX));

    delivered
}
