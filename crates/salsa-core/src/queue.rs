use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};

use crate::alert::AlertEvent;
use crate::error::DomainError;

/// Heap entry ordered by `(fire_time, seq)`; the event payload never takes
/// part in comparisons.
#[derive(Debug)]
struct Entry {
    fire_time: DateTime<Utc>,
    seq: u64,
    event: AlertEvent,
}

impl Entry {
    fn key(&self) -> (DateTime<Utc>, u64) {
        (self.fire_time, self.seq)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Pending notifications, earliest first. Events sharing a fire time come
/// out in insertion order.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only events strictly after `now` are accepted.
    pub fn insert(&mut self, event: AlertEvent, now: DateTime<Utc>) -> Result<(), DomainError> {
        let fire_time = event.fire_time();
        if fire_time <= now {
            return Err(DomainError::EventNotInFuture { fire_time, now });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry {
            fire_time,
            seq,
            event,
        }));
        Ok(())
    }

    pub fn peek(&self) -> Result<&AlertEvent, DomainError> {
        self.heap
            .peek()
            .map(|Reverse(entry)| &entry.event)
            .ok_or(DomainError::EmptyQueue)
    }

    pub fn pop(&mut self) -> Result<AlertEvent, DomainError> {
        self.heap
            .pop()
            .map(|Reverse(entry)| entry.event)
            .ok_or(DomainError::EmptyQueue)
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Snapshot in firing order.
    pub fn events(&self) -> Vec<AlertEvent> {
        let mut entries: Vec<&Entry> = self.heap.iter().map(|Reverse(e)| e).collect();
        entries.sort();
        entries.into_iter().map(|e| e.event).collect()
    }
}
