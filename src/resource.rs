//! Resource capability contract and the lifecycle state machine behind it

use crate::errors::{PoolError, PoolResult};
use crate::pool::QueryablePool;
use crate::query::Value;

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::OnceCell;

/// A closable, lazily-opened handle to some external object.
///
/// Only `open` and `close` are required. The remaining methods describe
/// optional capabilities and default to "not supported".
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// Open the underlying object
    async fn open(&self) -> PoolResult<()>;

    /// Close the underlying object. Implementations that have no notion of
    /// activity can ignore `allow_active`.
    async fn close(&self, allow_active: bool) -> PoolResult<()>;

    /// Wait until the resource has settled
    async fn ready(&self) -> PoolResult<()> {
        Ok(())
    }

    /// Number of outstanding `active` marks
    fn actives(&self) -> usize {
        0
    }

    fn is_closed(&self) -> bool {
        false
    }

    fn is_closing(&self) -> bool {
        false
    }

    /// Attribute exposed to [`Query`](crate::Query) matching
    fn attribute(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Marks nested pools; queries and sizes recurse into whatever this returns
    fn as_pool(&self) -> Option<&dyn QueryablePool> {
        None
    }
}

/// Open/close state machine shared by resource implementations.
///
/// Opening happens at most once and concurrent callers observe the same
/// result. Closing waits for an in-flight open, skips the close hook if the
/// resource never opened, and tolerates being called again afterwards.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::Lifecycle;
///
/// let lifecycle = Lifecycle::new();
/// lifecycle.active();
/// lifecycle.active();
/// lifecycle.inactive();
///
/// assert_eq!(lifecycle.actives(), 1);
/// assert!(!lifecycle.is_opened());
/// ```
#[derive(Debug, Default)]
pub struct Lifecycle {
    opened: OnceCell<PoolResult<()>>,
    closed: OnceCell<PoolResult<()>>,
    closing: AtomicBool,
    actives: AtomicUsize,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `open` unless an open pass already ran or is running
    pub async fn open<F, Fut>(&self, open: F) -> PoolResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PoolResult<()>>,
    {
        if self.is_closing() || self.is_closed() {
            return Err(PoolError::ResourceClosed);
        }

        self.opened.get_or_init(open).await.clone()
    }

    /// Run `close` once the resource has settled
    pub async fn close<F, Fut>(&self, allow_active: bool, close: F) -> PoolResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PoolResult<()>>,
    {
        if self.is_closed() {
            return Ok(());
        }

        if !allow_active && self.actives() > 0 {
            return Err(PoolError::ResourceActive);
        }

        self.closed
            .get_or_init(move || async move {
                self.closing.store(true, Ordering::Release);

                // Waits for a pending open, or blocks any later one.
                let opened = self
                    .opened
                    .get_or_init(|| async { Err(PoolError::ResourceClosed) })
                    .await;

                match opened {
                    Ok(()) => close().await,
                    Err(_) => Ok(()),
                }
            })
            .await
            .clone()
    }

    /// Mark the resource as in use
    pub fn active(&self) {
        self.actives.fetch_add(1, Ordering::AcqRel);
    }

    /// Undo one `active` mark
    pub fn inactive(&self) {
        let _ = self
            .actives
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    pub fn actives(&self) -> usize {
        self.actives.load(Ordering::Acquire)
    }

    pub fn is_opened(&self) -> bool {
        matches!(self.opened.get(), Some(Ok(())))
    }

    /// Close started but not yet settled
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire) && !self.is_closed()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.initialized()
    }
}

/// Resource with no external object behind it. Default product of
/// [`Pool::new`](crate::Pool::new).
#[derive(Debug, Default)]
pub struct BasicResource {
    lifecycle: Lifecycle,
}

impl BasicResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) {
        self.lifecycle.active();
    }

    pub fn inactive(&self) {
        self.lifecycle.inactive();
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}

#[async_trait]
impl Resource for BasicResource {
    async fn open(&self) -> PoolResult<()> {
        self.lifecycle.open(|| async { Ok(()) }).await
    }

    async fn close(&self, allow_active: bool) -> PoolResult<()> {
        self.lifecycle.close(allow_active, || async { Ok(()) }).await
    }

    fn actives(&self) -> usize {
        self.lifecycle.actives()
    }

    fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }

    fn is_closing(&self) -> bool {
        self.lifecycle.is_closing()
    }
}
