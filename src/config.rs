//! Pool configuration options

use crate::guard::Guard;

/// Configuration for pool behavior
///
/// # Examples
///
/// ```
/// use esox_resourcepool::{Guard, PoolConfiguration};
///
/// let guard = Guard::new();
/// let config = PoolConfiguration::new()
///     .with_allow_active(true)
///     .with_auto_open(false)
///     .with_guard(guard.clone());
///
/// assert!(config.allow_active);
/// assert!(!config.auto_open);
/// assert!(config.guard.unwrap().ptr_eq(&guard));
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfiguration {
    /// Default policy for closing resources that still report themselves active
    pub allow_active: bool,

    /// Whether the pool schedules its own `open` when constructed
    pub auto_open: bool,

    /// Wait-group shared with other pools; a private one is created when unset
    pub guard: Option<Guard>,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            allow_active: false,
            auto_open: true,
            guard: None,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default `allow_active` close policy
    pub fn with_allow_active(mut self, allow_active: bool) -> Self {
        self.allow_active = allow_active;
        self
    }

    /// Enable or disable opening the pool on construction
    pub fn with_auto_open(mut self, auto_open: bool) -> Self {
        self.auto_open = auto_open;
        self
    }

    /// Share a wait-group with other pools
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::{Guard, PoolConfiguration};
    ///
    /// let guard = Guard::new();
    /// let first = PoolConfiguration::new().with_guard(guard.clone());
    /// let second = PoolConfiguration::new().with_guard(guard.clone());
    ///
    /// assert!(first.guard.unwrap().ptr_eq(&second.guard.unwrap()));
    /// ```
    pub fn with_guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }
}

/// Options for [`Pool::add_with`](crate::Pool::add_with)
#[derive(Debug, Clone, Copy)]
pub struct AddOptions {
    /// Open the resource right away. When false the caller must call
    /// [`Handle::open`](crate::Handle::open) later.
    pub auto_open: bool,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self { auto_open: true }
    }
}

impl AddOptions {
    /// Options that leave opening to the caller
    pub fn deferred() -> Self {
        Self { auto_open: false }
    }
}

/// Options for [`Pool::list`](crate::Pool::list) and [`Pool::query`](crate::Pool::query)
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    /// Include resources that are closed or closing
    pub include_closed: bool,
}

impl ListOptions {
    pub fn including_closed() -> Self {
        Self {
            include_closed: true,
        }
    }
}
