//! Device event stream.
//!
//! Every state-changing operation leaves a [`LogEvent`] here, the same
//! thing a `dmesg` reader would see for a real module. Collaborators
//! (dashboards, exporters) consume it in one of three ways:
//!
//! - `recent(n)` for the newest entries,
//! - `since(seq)` as a poll cursor,
//! - `subscribe()` for a push channel.
//!
//! Only the last `capacity` events are retained; older ones are evicted.
//! Sequence numbers keep counting across evictions and `clear()`.
//! Subscriber channels hold at most `capacity` undelivered events too; a
//! subscriber that falls that far behind misses the newer ones and can
//! catch up with `since(seq)`.

use crate::chardev_log;
use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use serde::Serialize;
use std::{
    cell::Cell,
    collections::VecDeque,
    fmt,
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU32, Ordering},
    },
};

/// Severity of a device event. Serialized upper-case, like kernel log
/// prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<EventLevel> for log::Level {
    fn from(level: EventLevel) -> Self {
        match level {
            EventLevel::Debug => log::Level::Debug,
            EventLevel::Info => log::Level::Info,
            EventLevel::Warn => log::Level::Warn,
            EventLevel::Error => log::Level::Error,
        }
    }
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventLevel::Debug => "DEBUG",
            EventLevel::Info => "INFO",
            EventLevel::Warn => "WARN",
            EventLevel::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub seq:       u64,
    pub timestamp: DateTime<Utc>,
    pub level:     EventLevel,
    pub message:   String,
    /// Pseudo process id of the calling thread.
    pub pid:       u32,
}

const FIRST_PSEUDO_PID: u32 = 1000;

static NEXT_PSEUDO_PID: AtomicU32 = AtomicU32::new(FIRST_PSEUDO_PID);

thread_local! {
    static PSEUDO_PID: Cell<u32> = const { Cell::new(0) };
}

/// Stable per-thread pseudo pid, handed out from 1000 upwards on first use.
pub fn pseudo_pid() -> u32 {
    PSEUDO_PID.with(|pid| {
        if pid.get() == 0 {
            pid.set(NEXT_PSEUDO_PID.fetch_add(1, Ordering::Relaxed));
        }
        pid.get()
    })
}

#[derive(Debug)]
struct Inner {
    entries:     VecDeque<LogEvent>,
    next_seq:    u64,
    subscribers: Vec<Sender<LogEvent>>,
}

/// Bounded, thread-safe event ring.
#[derive(Debug)]
pub struct EventLog {
    capacity: usize,
    inner:    Mutex<Inner>,
}

impl EventLog {
    /// `capacity` is clamped to at least one entry.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(Inner {
                entries:     VecDeque::with_capacity(capacity),
                next_seq:    1,
                subscribers: Vec::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an event, evict beyond capacity, mirror it to the `log`
    /// facade and push it to live subscribers.
    pub fn record(
        &self,
        level: EventLevel,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> LogEvent {
        let event = {
            let mut inner = self.lock();
            let event = LogEvent {
                seq: inner.next_seq,
                timestamp,
                level,
                message: message.into(),
                pid: pseudo_pid(),
            };
            inner.next_seq += 1;

            if inner.entries.len() == self.capacity {
                inner.entries.pop_front();
            }
            inner.entries.push_back(event.clone());
            inner.subscribers.retain(|tx| match tx.try_send(event.clone()) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            });
            event
        };

        chardev_log!(
            log::Level::from(level),
            "device",
            "[pid={}] {}",
            event.pid,
            event.message
        );
        event
    }

    /// Up to `n` of the newest events, oldest first.
    pub fn recent(&self, n: usize) -> Vec<LogEvent> {
        let inner = self.lock();
        let skip = inner.entries.len().saturating_sub(n);
        inner.entries.iter().skip(skip).cloned().collect()
    }

    /// Every retained event with `seq > after`, oldest first.
    pub fn since(&self, after: u64) -> Vec<LogEvent> {
        self.lock().entries.iter().filter(|e| e.seq > after).cloned().collect()
    }

    /// Receives events recorded from now on, buffering up to `capacity`
    /// of them. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<LogEvent> {
        let (tx, rx) = channel::bounded(self.capacity);
        self.lock().subscribers.push(tx);
        rx
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Sequence number of the newest event ever recorded (0 if none).
    pub fn last_seq(&self) -> u64 {
        self.lock().next_seq - 1
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
