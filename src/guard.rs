//! Wait-group used to know when outstanding opens have settled

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Counts outstanding operations and wakes waiters once the count drops to zero.
///
/// Clones share the same counter. Handing one guard to several pools through
/// [`PoolConfiguration::with_guard`](crate::PoolConfiguration::with_guard)
/// aggregates all of their pending opens into a single readiness signal.
///
/// # Examples
///
/// ```
/// use esox_resourcepool::Guard;
///
/// let guard = Guard::new();
/// let shared = guard.clone();
///
/// guard.wait();
/// assert_eq!(shared.outstanding(), 1);
///
/// shared.release();
/// assert_eq!(guard.outstanding(), 0);
/// ```
#[derive(Clone)]
pub struct Guard {
    outstanding: Arc<watch::Sender<usize>>,
}

impl Guard {
    /// Create a guard with nothing outstanding
    pub fn new() -> Self {
        let (outstanding, _) = watch::channel(0);
        Self {
            outstanding: Arc::new(outstanding),
        }
    }

    /// Register one more outstanding operation
    pub fn wait(&self) {
        self.outstanding.send_modify(|count| *count += 1);
    }

    /// Mark one outstanding operation as settled
    pub fn release(&self) {
        self.outstanding
            .send_modify(|count| *count = count.saturating_sub(1));
    }

    /// Number of operations still outstanding
    pub fn outstanding(&self) -> usize {
        *self.outstanding.borrow()
    }

    /// Resolve once nothing is outstanding. Can be awaited repeatedly.
    pub async fn ready(&self) {
        let mut settled = self.outstanding.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = settled.wait_for(|count| *count == 0).await;
    }

    /// Whether both guards share the same counter
    pub fn ptr_eq(&self, other: &Guard) -> bool {
        Arc::ptr_eq(&self.outstanding, &other.outstanding)
    }
}

impl Default for Guard {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("outstanding", &self.outstanding())
            .finish()
    }
}
