//! Live queries with push-based snapshot delivery.
//!
//! # Responsibility
//! - Register each observable read with a [`QueryScope`].
//! - Recompute and push full snapshots for scopes touched by a [`Change`].
//!
//! # Invariants
//! - A subscriber receives its initial snapshot before any refresh.
//! - Emissions of one query are serialized; snapshots are shared read-only.
//! - The registry only holds weak references; a query lives as long as an
//!   [`Observable`] or [`Subscription`] for it exists.
//! - Subscriber callbacks must not write to the store synchronously.

use super::StoreResult;
use crate::model::project::ProjectId;
use log::warn;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Result set an observable read covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryScope {
    AllProjects,
    Project(ProjectId),
    AllTasks,
    ProjectTasks(ProjectId),
}

/// Rows touched by a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Project rows with these ids were written.
    Projects(Vec<ProjectId>),
    /// Task rows owned by these projects (before or after the write) changed.
    Tasks(Vec<ProjectId>),
}

impl QueryScope {
    pub fn is_affected_by(&self, change: &Change) -> bool {
        match (self, change) {
            (Self::AllProjects, Change::Projects(_)) => true,
            (Self::Project(id), Change::Projects(ids)) => ids.contains(id),
            (Self::AllTasks, Change::Tasks(_)) => true,
            (Self::ProjectTasks(id), Change::Tasks(ids)) => ids.contains(id),
            _ => false,
        }
    }
}

trait LiveQuery: Send + Sync {
    fn scope(&self) -> QueryScope;
    fn refresh(&self);
}

/// Registry of live queries for one store.
#[derive(Default)]
pub struct LiveQueryRegistry {
    queries: Mutex<Vec<Weak<dyn LiveQuery>>>,
}

impl LiveQueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a query whose snapshots are produced by `fetch`.
    ///
    /// `fetch` is not run until the first subscription or `current()` call.
    pub fn register<T, F>(&self, scope: QueryScope, fetch: F) -> Observable<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> StoreResult<T> + Send + Sync + 'static,
    {
        let state = Arc::new(QueryState {
            scope,
            fetch: Box::new(fetch),
            subscribers: Mutex::new(Vec::new()),
            emit_lock: Mutex::new(()),
            latest: Mutex::new(None),
            next_subscriber_id: AtomicU64::new(0),
        });
        let erased: Arc<dyn LiveQuery> = state.clone();
        lock(&self.queries).push(Arc::downgrade(&erased));
        Observable { state }
    }

    /// Pushes fresh snapshots to every live query affected by `change`.
    ///
    /// Returns how many queries were refreshed.
    pub fn notify(&self, change: &Change) -> usize {
        let affected: Vec<Arc<dyn LiveQuery>> = {
            let mut queries = lock(&self.queries);
            queries.retain(|query| query.strong_count() > 0);
            queries
                .iter()
                .filter_map(Weak::upgrade)
                .filter(|query| query.scope().is_affected_by(change))
                .collect()
        };

        for query in &affected {
            query.refresh();
        }
        affected.len()
    }

    /// Number of queries still referenced by an observable or subscription.
    pub fn live_count(&self) -> usize {
        let mut queries = lock(&self.queries);
        queries.retain(|query| query.strong_count() > 0);
        queries.len()
    }
}

type Subscriber<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct QueryState<T> {
    scope: QueryScope,
    fetch: Box<dyn Fn() -> StoreResult<T> + Send + Sync>,
    subscribers: Mutex<Vec<(u64, Subscriber<T>)>>,
    emit_lock: Mutex<()>,
    latest: Mutex<Option<Arc<T>>>,
    next_subscriber_id: AtomicU64,
}

impl<T> QueryState<T> {
    fn deliver(&self, snapshot: Arc<T>) {
        *lock(&self.latest) = Some(Arc::clone(&snapshot));
        let subscribers: Vec<Subscriber<T>> = lock(&self.subscribers)
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        for subscriber in subscribers {
            subscriber(&snapshot);
        }
    }

    fn remove_subscriber(&self, id: u64) {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|(subscriber_id, _)| *subscriber_id != id);
        if subscribers.is_empty() {
            *lock(&self.latest) = None;
        }
    }
}

impl<T: Send + Sync> LiveQuery for QueryState<T> {
    fn scope(&self) -> QueryScope {
        self.scope
    }

    fn refresh(&self) {
        let _emit = lock(&self.emit_lock);
        if lock(&self.subscribers).is_empty() {
            return;
        }

        match (self.fetch)() {
            Ok(snapshot) => self.deliver(Arc::new(snapshot)),
            Err(err) => warn!(
                "event=live_query_refresh module=store status=error scope={:?} error={}",
                self.scope, err
            ),
        }
    }
}

/// Reactive handle that delivers an initial snapshot and every later one.
pub struct Observable<T> {
    state: Arc<QueryState<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Debug for Observable<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("scope", &self.state.scope)
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> Observable<T> {
    /// Subscribes `callback`, delivering the current snapshot immediately.
    ///
    /// # Errors
    /// - Returns the store error when the initial snapshot cannot be read;
    ///   nothing is registered in that case.
    pub fn subscribe<F>(&self, callback: F) -> StoreResult<Subscription>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let state = &self.state;
        let _emit = lock(&state.emit_lock);
        let snapshot = Arc::new((state.fetch)()?);

        callback(&snapshot);
        *lock(&state.latest) = Some(snapshot);

        let id = state.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        lock(&state.subscribers).push((id, Arc::new(callback)));

        let owner = Arc::clone(state);
        Ok(Subscription {
            detach: Some(Box::new(move || owner.remove_subscriber(id))),
        })
    }

    /// Reads a fresh snapshot without subscribing.
    pub fn current(&self) -> StoreResult<T> {
        (self.state.fetch)()
    }

    /// Last snapshot delivered to subscribers, if any are attached.
    pub fn latest(&self) -> Option<Arc<T>> {
        lock(&self.state.latest).clone()
    }

    pub fn scope(&self) -> QueryScope {
        self.state.scope
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.state.subscribers).len()
    }
}

/// Detaches its callback when dropped.
#[must_use = "dropping a subscription detaches it immediately"]
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.detach_now();
    }

    fn detach_now(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach_now();
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
