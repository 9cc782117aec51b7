//! Lifecycle coordinator for groups of resources

use crate::config::{AddOptions, ListOptions, PoolConfiguration};
use crate::errors::{PoolError, PoolResult};
use crate::guard::Guard;
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::query::Query;
use crate::resource::{BasicResource, Resource};

#[cfg(feature = "metrics")]
use crate::metrics::MetricsExporter;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

type Factory<R, A> = Arc<dyn Fn(A) -> R + Send + Sync>;

/// Identity of a pooled resource: the address of its shared allocation
fn identity<T: ?Sized>(resource: &Arc<T>) -> usize {
    Arc::as_ptr(resource) as *const () as usize
}

fn settle(joined: Result<PoolResult<()>, JoinError>) -> PoolResult<()> {
    joined.map_err(|_| PoolError::Cancelled)?
}

/// Pool lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Created, `open` not yet requested
    Idle,

    /// Waiting for outstanding resource opens to settle
    Opening,

    /// Every open requested so far has settled
    Opened,

    /// Member resources are being closed
    Closing,

    /// Terminal
    Closed,
}

/// Object-safe view of a pool, used to recurse into nested pools
pub trait QueryablePool: Send + Sync {
    /// Leaf resources matching `query`
    fn query(&self, query: &Query, options: ListOptions) -> PoolResult<Vec<Arc<dyn Resource>>>;

    /// Tracked resources, including those of nested pools
    fn size(&self) -> usize;
}

/// State shared between a pool, its handles and its background tasks
#[derive(Clone)]
struct Membership {
    resources: Arc<DashMap<usize, Arc<dyn Resource>>>,
    metrics: Arc<MetricsTracker>,
    guard: Guard,
    allow_active: bool,
}

impl Membership {
    /// Open a member, dropping it from the pool if the open fails
    async fn open_member(&self, key: usize, resource: Arc<dyn Resource>) -> PoolResult<()> {
        let result = resource.open().await;

        if let Err(ref error) = result
            && self.resources.remove(&key).is_some()
        {
            self.metrics.record_open_failure();
            warn!(resource = key, %error, "resource failed to open, removed from pool");
        }

        result
    }

    /// Close a member and drop it from the pool whatever the outcome
    async fn close_member(
        &self,
        key: usize,
        resource: Arc<dyn Resource>,
        allow_active: bool,
    ) -> PoolResult<()> {
        let result = resource.close(allow_active).await;

        if self.resources.remove(&key).is_some() {
            self.metrics.record_closed();
            debug!(resource = key, "resource closed, removed from pool");
        }

        if let Err(ref error) = result {
            self.metrics.record_close_failure();
            debug!(resource = key, %error, "resource close reported an error");
        }

        result
    }
}

/// A resource registered with a pool.
///
/// Dereferences to the resource itself. Closing through the handle removes
/// the resource from its pool exactly once, however often or concurrently
/// `close` is called.
pub struct Handle<T: Resource> {
    resource: Arc<T>,
    key: usize,
    members: Membership,
    pending_open: AtomicBool,
}

impl<T: Resource> Handle<T> {
    fn new(resource: Arc<T>, key: usize, members: Membership, pending_open: bool) -> Self {
        Self {
            resource,
            key,
            members,
            pending_open: AtomicBool::new(pending_open),
        }
    }

    /// Open the resource. Required for resources added with
    /// [`AddOptions::deferred`]; on failure the resource leaves the pool.
    pub async fn open(&self) -> PoolResult<()> {
        let member: Arc<dyn Resource> = self.resource.clone();
        let result = self.members.open_member(self.key, member).await;

        if self.pending_open.swap(false, Ordering::AcqRel) {
            self.members.guard.release();
        }

        result
    }

    /// Close the resource, using the pool's `allow_active` policy unless overridden
    pub async fn close(&self, allow_active: Option<bool>) -> PoolResult<()> {
        let allow_active = allow_active.unwrap_or(self.members.allow_active);
        let member: Arc<dyn Resource> = self.resource.clone();
        self.members
            .close_member(self.key, member, allow_active)
            .await
    }

    /// Shared pointer to the underlying resource
    pub fn shared(&self) -> Arc<T> {
        Arc::clone(&self.resource)
    }
}

impl<T: Resource> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.resource
    }
}

impl<T: Resource> Drop for Handle<T> {
    fn drop(&mut self) {
        // A deferred open that never happened must not stall readiness.
        if self.pending_open.swap(false, Ordering::AcqRel) {
            self.members.guard.release();
        }
    }
}

impl<T: Resource + fmt::Debug> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("resource", &self.resource)
            .field("pending_open", &self.pending_open.load(Ordering::Relaxed))
            .finish()
    }
}

/// Container coordinating the open/close lifecycle of a set of resources.
///
/// Resources are produced by the pool's factory through
/// [`resource`](Pool::resource) or registered directly with
/// [`add`](Pool::add). Pools are resources themselves and can be nested;
/// queries, sizes and active counts recurse into child pools.
///
/// Constructing or adding to a pool schedules work on the ambient Tokio
/// runtime.
pub struct Pool<R: Resource = BasicResource, A = ()> {
    members: Membership,
    state: Arc<Mutex<PoolState>>,
    factory: Factory<R, A>,
}

impl Pool<BasicResource, ()> {
    /// Create a pool whose factory produces [`BasicResource`]s
    pub fn new(config: PoolConfiguration) -> Self {
        Self::with_factory(|()| BasicResource::new(), config)
    }
}

impl Default for Pool<BasicResource, ()> {
    fn default() -> Self {
        Self::new(PoolConfiguration::default())
    }
}

impl<R: Resource, A: 'static> Pool<R, A> {
    /// Create a pool with a custom factory for [`resource`](Pool::resource)
    pub fn with_factory<F>(factory: F, config: PoolConfiguration) -> Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        let pool = Self {
            members: Membership {
                resources: Arc::new(DashMap::new()),
                metrics: Arc::new(MetricsTracker::new()),
                guard: config.guard.unwrap_or_default(),
                allow_active: config.allow_active,
            },
            state: Arc::new(Mutex::new(PoolState::Idle)),
            factory: Arc::new(factory),
        };

        if config.auto_open {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let state = Arc::clone(&pool.state);
                    let guard = pool.members.guard.clone();
                    runtime.spawn(async move {
                        let _ = open_pass(&state, &guard).await;
                    });
                }
                Err(_) => debug!("no runtime available, pool stays idle until opened"),
            }
        }

        pool
    }

    /// Register a resource and open it in the background
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn add<T: Resource>(&self, resource: T) -> PoolResult<Handle<T>> {
        self.add_arc_with(Arc::new(resource), AddOptions::default())
    }

    /// Register a resource with explicit options
    pub fn add_with<T: Resource>(&self, resource: T, options: AddOptions) -> PoolResult<Handle<T>> {
        self.add_arc_with(Arc::new(resource), options)
    }

    /// Register a shared resource
    pub fn add_arc<T: Resource>(&self, resource: Arc<T>) -> PoolResult<Handle<T>> {
        self.add_arc_with(resource, AddOptions::default())
    }

    /// Register a shared resource with explicit options
    ///
    /// # Panics
    ///
    /// Panics if `options.auto_open` is set and no Tokio runtime is running.
    pub fn add_arc_with<T: Resource>(
        &self,
        resource: Arc<T>,
        options: AddOptions,
    ) -> PoolResult<Handle<T>> {
        self.ensure_usable()?;

        if resource.is_closed() || resource.is_closing() {
            return Err(PoolError::ResourceClosed);
        }

        let key = identity(&resource);
        let member: Arc<dyn Resource> = resource.clone();

        {
            // Held across the insert so `close` never snapshots around it.
            let state = self.state.lock();
            usable(*state)?;

            match self.members.resources.entry(key) {
                Entry::Occupied(_) => {
                    debug!(resource = key, "resource already tracked");
                    return Ok(Handle::new(resource, key, self.members.clone(), false));
                }
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(&member));
                }
            }
        }

        self.members.guard.wait();
        self.members.metrics.record_added();
        debug!(resource = key, auto_open = options.auto_open, "resource added");

        if options.auto_open {
            let members = self.members.clone();
            tokio::spawn(async move {
                let _ = members.open_member(key, member).await;
                members.guard.release();
            });
        }

        Ok(Handle::new(
            resource,
            key,
            self.members.clone(),
            !options.auto_open,
        ))
    }

    /// Acquire a new resource from the pool's factory
    pub fn resource(&self, args: A) -> PoolResult<Handle<R>> {
        self.ensure_usable()?;
        self.add((self.factory)(args))
    }

    /// Tracked resources, skipping closed and closing ones unless asked for
    pub fn list(&self, options: ListOptions) -> PoolResult<Vec<Arc<dyn Resource>>> {
        self.ensure_usable()?;

        Ok(self
            .members
            .resources
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .filter(|resource| {
                options.include_closed || !(resource.is_closed() || resource.is_closing())
            })
            .collect())
    }

    /// Leaf resources matching every clause of `query`.
    ///
    /// Nested pools are replaced by their own results and duplicates are
    /// dropped.
    pub fn query(&self, query: &Query, options: ListOptions) -> PoolResult<Vec<Arc<dyn Resource>>> {
        self.ensure_usable()?;

        let mut seen = HashSet::new();
        let mut results = Vec::new();

        for item in self.list(options)? {
            let candidates = match item.as_pool() {
                Some(nested) => nested.query(query, options)?,
                None => vec![item],
            };

            for candidate in candidates {
                if query.matches(candidate.as_ref()) && seen.insert(identity(&candidate)) {
                    results.push(candidate);
                }
            }
        }

        Ok(results)
    }

    /// Wait for every listed resource and then for all outstanding opens
    pub async fn ready(&self) -> PoolResult<()> {
        let resources = self.list(ListOptions::default())?;

        let mut pending = JoinSet::new();
        for resource in resources {
            pending.spawn(async move { resource.ready().await });
        }

        let mut first_error = None;
        while let Some(joined) = pending.join_next().await {
            if let Err(error) = settle(joined) {
                first_error.get_or_insert(error);
            }
        }

        self.members.guard.ready().await;

        first_error.map_or(Ok(()), Err)
    }

    /// Open the pool, resolving once all outstanding opens have settled
    pub async fn open(&self) -> PoolResult<()> {
        open_pass(&self.state, &self.members.guard).await
    }

    /// Close every tracked resource concurrently and mark the pool closed.
    ///
    /// Every member close is attempted; the first error reported is
    /// returned once all of them have settled. The close keeps running if
    /// the returned future is dropped.
    pub async fn close(&self, allow_active: Option<bool>) -> PoolResult<()> {
        let tracked: Vec<(usize, Arc<dyn Resource>)> = {
            let mut state = self.state.lock();
            usable(*state)?;
            *state = PoolState::Closing;

            self.members
                .resources
                .iter()
                .map(|entry| (*entry.key(), Arc::clone(entry.value())))
                .collect()
        };

        let allow_active = allow_active.unwrap_or(self.members.allow_active);
        let members = self.members.clone();
        let state = Arc::clone(&self.state);
        debug!(allow_active, size = tracked.len(), "pool closing");

        tokio::spawn(async move {
            let mut closing = JoinSet::new();
            for (key, resource) in tracked {
                let members = members.clone();
                closing.spawn(async move {
                    members.close_member(key, resource, allow_active).await
                });
            }

            let mut first_error = None;
            while let Some(joined) = closing.join_next().await {
                if let Err(error) = settle(joined) {
                    first_error.get_or_insert(error);
                }
            }

            *state.lock() = PoolState::Closed;
            debug!(failed = first_error.is_some(), "pool closed");

            first_error.map_or(Ok(()), Err)
        })
        .await
        .map_err(|_| PoolError::Cancelled)?
    }

    /// Tracked resources plus the size of every nested pool
    pub fn size(&self) -> usize {
        let tracked = self.members.resources.len();
        self.members.resources.iter().fold(tracked, |total, entry| {
            total + entry.value().as_pool().map_or(0, |nested| nested.size())
        })
    }

    /// Sum of active marks across tracked resources
    pub fn actives(&self) -> usize {
        self.members
            .resources
            .iter()
            .map(|entry| entry.value().actives())
            .sum()
    }

    pub fn state(&self) -> PoolState {
        *self.state.lock()
    }

    pub fn is_opened(&self) -> bool {
        self.state() == PoolState::Opened
    }

    pub fn is_opening(&self) -> bool {
        self.state() == PoolState::Opening
    }

    pub fn is_closing(&self) -> bool {
        self.state() == PoolState::Closing
    }

    pub fn is_closed(&self) -> bool {
        self.state() == PoolState::Closed
    }

    pub fn guard(&self) -> &Guard {
        &self.members.guard
    }

    pub fn allow_active(&self) -> bool {
        self.members.allow_active
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        self.members.metrics.get_metrics(
            self.size(),
            self.actives(),
            self.members.guard.outstanding(),
        )
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }

    fn ensure_usable(&self) -> PoolResult<()> {
        usable(self.state())
    }
}

fn usable(state: PoolState) -> PoolResult<()> {
    match state {
        PoolState::Closing | PoolState::Closed => Err(PoolError::PoolClosed),
        _ => Ok(()),
    }
}

/// Move the pool towards `Opened`. Only the first caller leaves `Idle`;
/// everyone waits for the same guard to settle.
async fn open_pass(state: &Mutex<PoolState>, guard: &Guard) -> PoolResult<()> {
    {
        let mut current = state.lock();
        match *current {
            PoolState::Closing | PoolState::Closed => return Err(PoolError::PoolClosed),
            PoolState::Opened => return Ok(()),
            PoolState::Opening => {}
            PoolState::Idle => {
                *current = PoolState::Opening;
                debug!("pool opening");
            }
        }
    }

    guard.ready().await;

    let mut current = state.lock();
    if *current == PoolState::Opening {
        *current = PoolState::Opened;
        debug!("pool opened");
    }

    Ok(())
}

impl<R: Resource, A: 'static> QueryablePool for Pool<R, A> {
    fn query(&self, query: &Query, options: ListOptions) -> PoolResult<Vec<Arc<dyn Resource>>> {
        Pool::query(self, query, options)
    }

    fn size(&self) -> usize {
        Pool::size(self)
    }
}

#[async_trait]
impl<R: Resource, A: 'static> Resource for Pool<R, A> {
    async fn open(&self) -> PoolResult<()> {
        Pool::open(self).await
    }

    async fn close(&self, allow_active: bool) -> PoolResult<()> {
        Pool::close(self, Some(allow_active)).await
    }

    async fn ready(&self) -> PoolResult<()> {
        Pool::ready(self).await
    }

    fn actives(&self) -> usize {
        Pool::actives(self)
    }

    fn is_closed(&self) -> bool {
        Pool::is_closed(self)
    }

    fn is_closing(&self) -> bool {
        Pool::is_closing(self)
    }

    fn as_pool(&self) -> Option<&dyn QueryablePool> {
        Some(self)
    }
}

impl<R: Resource, A> fmt::Debug for Pool<R, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("state", &*self.state.lock())
            .field("resources", &self.members.resources.len())
            .field("guard", &self.members.guard)
            .field("allow_active", &self.members.allow_active)
            .finish()
    }
}
