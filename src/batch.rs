//! Sequential, paced checking of a list of handles.
//!
//! A [`Batch`] owns one [`ResultRecord`] per distinct handle (compared via
//! [`handle_key`]) and drives them through a [`Resolver`] one at a time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::resolve::Resolver;
use crate::transport::Transport;
use crate::{Availability, handle_key};

/// Pause between two handles when nothing else is configured.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

/// Where a handle stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordState {
    /// Queued or being resolved.
    Checking,
    /// Nobody holds the handle.
    Available,
    /// The handle is registered.
    Taken,
    /// No endpoint gave a definitive answer.
    Error {
        /// Diagnostic from the resolver.
        message: String,
    },
}

impl RecordState {
    /// Whether resolution has finished for this record.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Checking)
    }
}

impl From<Availability> for RecordState {
    fn from(availability: Availability) -> Self {
        match availability {
            Availability::Available => Self::Available,
            Availability::Taken => Self::Taken,
        }
    }
}

/// The outcome tracked for one handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultRecord {
    /// Handle with the casing the user typed.
    pub handle: String,
    /// Current state.
    #[serde(flatten)]
    pub state: RecordState,
}

/// Aggregate counts over a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Distinct handles.
    pub total: usize,
    /// Handles found available.
    pub available: usize,
    /// Handles found taken.
    pub taken: usize,
    /// Handles that could not be verified.
    pub errors: usize,
    /// Handles not yet resolved.
    pub checking: usize,
}

/// How a [`Batch::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every handle was resolved.
    Completed,
    /// The stop flag was raised; remaining records are still checking.
    Stopped,
}

/// The record map for one run, keyed by normalized handle.
#[derive(Debug, Default)]
pub struct Batch {
    records: HashMap<String, ResultRecord>,
    // Keys in first-seen order, for stable output.
    order: Vec<String>,
}

impl Batch {
    /// An empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh batch: drop every existing record and create one
    /// `Checking` record per distinct handle.
    ///
    /// Handles that differ only in case share a record; the casing of the
    /// last occurrence is kept.
    pub fn begin<I, S>(&mut self, handles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reset();
        for handle in handles {
            let handle = handle.into();
            let key = handle_key(&handle);
            if !self.records.contains_key(&key) {
                self.order.push(key.clone());
            }
            self.records.insert(key, ResultRecord {
                handle,
                state: RecordState::Checking,
            });
        }
    }

    /// Remove every record.
    pub fn reset(&mut self) {
        self.records.clear();
        self.order.clear();
    }

    /// Look a record up by any casing of its handle.
    #[must_use]
    pub fn get(&self, handle: &str) -> Option<&ResultRecord> {
        self.records.get(&handle_key(handle))
    }

    /// Records in first-seen order.
    pub fn records(&self) -> impl Iterator<Item = &ResultRecord> {
        self.order.iter().filter_map(|key| self.records.get(key))
    }

    /// Number of distinct handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch has no handles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Current counts.
    #[must_use]
    pub fn tally(&self) -> Tally {
        let mut tally = Tally {
            total: self.records.len(),
            ..Tally::default()
        };
        for record in self.records.values() {
            match record.state {
                RecordState::Checking => tally.checking += 1,
                RecordState::Available => tally.available += 1,
                RecordState::Taken => tally.taken += 1,
                RecordState::Error { .. } => tally.errors += 1,
            }
        }
        tally
    }

    /// Available handles in their original casing, sorted alphabetically.
    #[must_use]
    pub fn available_handles(&self) -> Vec<&str> {
        let mut handles: Vec<&str> = self
            .records
            .values()
            .filter(|r| r.state == RecordState::Available)
            .map(|r| r.handle.as_str())
            .collect();
        handles.sort_unstable();
        handles
    }

    /// Resolve every record still checking, one at a time.
    ///
    /// `delay` is slept between handles, not after the last one. `stop` is
    /// read right before each handle is resolved (after any delay), never
    /// during one: raising it leaves finished records intact and the rest
    /// `Checking`. `on_update` sees each record as soon as it reaches a
    /// terminal state.
    pub fn run<T, F>(
        &mut self,
        resolver: &Resolver<T>,
        stop: &AtomicBool,
        delay: Duration,
        mut on_update: F,
    ) -> RunOutcome
    where
        T: Transport,
        F: FnMut(&ResultRecord),
    {
        let pending: Vec<String> = self
            .order
            .iter()
            .filter(|key| self.records.get(*key).is_some_and(|r| !r.state.is_terminal()))
            .cloned()
            .collect();

        for (i, key) in pending.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                thread::sleep(delay);
            }
            if stop.load(Ordering::SeqCst) {
                warn!(remaining = pending.len() - i, "stopped before finishing the batch");
                return RunOutcome::Stopped;
            }

            let Some(record) = self.records.get_mut(key) else {
                continue;
            };
            record.state = match resolver.resolve(&record.handle) {
                Ok(availability) => availability.into(),
                Err(e) => RecordState::Error {
                    message: e.to_string(),
                },
            };
            on_update(record);
        }

        info!(tally = ?self.tally(), "batch finished");
        RunOutcome::Completed
    }
}
