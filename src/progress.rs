//! Progress reporting
//!
//! One snapshot per top-level invocation, shared by every branch. Mutation
//! happens under a mutex; the observer receives a copy after the lock is
//! released so a slow observer never blocks other branches.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// Callback invoked after every progress mutation.
pub type Observer<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Observer of the recursive explorer.
pub type ProgressObserver = Observer<ProgressSnapshot>;

/// Progress of one recursive exploration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub current_depth: usize,
    pub total_depth: usize,
    pub current_breadth: usize,
    pub total_breadth: usize,
    pub current_query: Option<String>,
    pub total_queries: usize,
    pub completed_queries: usize,
}

impl ProgressSnapshot {
    pub fn new(breadth: usize, depth: usize) -> Self {
        Self {
            current_depth: depth,
            total_depth: depth,
            current_breadth: breadth,
            total_breadth: breadth,
            ..Default::default()
        }
    }

    /// Register newly planned queries.
    pub fn plan_queries(&mut self, count: usize, first_query: Option<&str>) {
        self.total_queries += count;
        if let Some(query) = first_query {
            self.current_query = Some(query.to_string());
        }
    }

    /// Mark one branch as finished. Saturates at `total_queries`.
    pub fn complete_query(&mut self, query: &str) {
        if self.completed_queries < self.total_queries {
            self.completed_queries += 1;
        }
        self.current_query = Some(query.to_string());
    }

    pub fn is_complete(&self) -> bool {
        self.completed_queries == self.total_queries
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "depth {}/{} breadth {}/{} queries {}/{}",
            self.total_depth.saturating_sub(self.current_depth),
            self.total_depth,
            self.current_breadth,
            self.total_breadth,
            self.completed_queries,
            self.total_queries
        )?;
        if let Some(query) = &self.current_query {
            write!(f, " ({})", query)?;
        }
        Ok(())
    }
}

/// Shared, mutable progress state with an optional observer.
pub struct ProgressReporter<S> {
    state: Mutex<S>,
    observer: Option<Observer<S>>,
}

impl<S: Clone> ProgressReporter<S> {
    pub fn new(initial: S, observer: Option<Observer<S>>) -> Self {
        Self {
            state: Mutex::new(initial),
            observer,
        }
    }

    /// Apply `update` atomically, then notify the observer with the result.
    pub fn update<F>(&self, update: F)
    where
        F: FnOnce(&mut S),
    {
        let snapshot = {
            let mut state = self.lock();
            update(&mut state);
            state.clone()
        };
        if let Some(observer) = &self.observer {
            observer(&snapshot);
        }
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> S {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, S> {
        // A panicking observer never holds the lock, so poisoning only follows
        // a panic inside an update closure; the state itself stays usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S: fmt::Debug> fmt::Debug for ProgressReporter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("state", &self.state)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}
