//! Metrics collection and export for resource pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use esox_resourcepool::Pool;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let pool = Pool::default();
/// let resource = pool.resource(()).unwrap();
/// pool.ready().await.unwrap();
///
/// resource.active();
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_added, 1);
/// assert_eq!(metrics.tracked_resources, 1);
/// assert_eq!(metrics.active_handles, 1);
/// # });
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolMetrics {
    /// Total resources registered with the pool
    pub total_added: usize,

    /// Total resources removed by a close
    pub total_closed: usize,

    /// Resources dropped because their open failed
    pub open_failures: usize,

    /// Closes that reported an error
    pub close_failures: usize,

    /// Current tracked resources, nested pools included
    pub tracked_resources: usize,

    /// Current active marks across tracked resources
    pub active_handles: usize,

    /// Opens the pool's guard is still waiting on
    pub pending_opens: usize,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_added".to_string(), self.total_added.to_string());
        metrics.insert("total_closed".to_string(), self.total_closed.to_string());
        metrics.insert("open_failures".to_string(), self.open_failures.to_string());
        metrics.insert("close_failures".to_string(), self.close_failures.to_string());
        metrics.insert("tracked_resources".to_string(), self.tracked_resources.to_string());
        metrics.insert("active_handles".to_string(), self.active_handles.to_string());
        metrics.insert("pending_opens".to_string(), self.pending_opens.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_resourcepool::Pool;
    /// use std::collections::HashMap;
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let pool = Pool::default();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("files", Some(&tags));
    /// assert!(output.contains("resourcepool_resources_tracked"));
    /// assert!(output.contains("service=\"api\""));
    /// # });
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        // Gauge metrics
        output.push_str("# HELP resourcepool_resources_tracked Current tracked resources\n");
        output.push_str("# TYPE resourcepool_resources_tracked gauge\n");
        output.push_str(&format!("resourcepool_resources_tracked{{{}}} {}\n", labels, metrics.tracked_resources));

        output.push_str("# HELP resourcepool_resources_active Current active marks\n");
        output.push_str("# TYPE resourcepool_resources_active gauge\n");
        output.push_str(&format!("resourcepool_resources_active{{{}}} {}\n", labels, metrics.active_handles));

        output.push_str("# HELP resourcepool_opens_pending Opens not yet settled\n");
        output.push_str("# TYPE resourcepool_opens_pending gauge\n");
        output.push_str(&format!("resourcepool_opens_pending{{{}}} {}\n", labels, metrics.pending_opens));

        // Counter metrics
        output.push_str("# HELP resourcepool_resources_added_total Total resources added\n");
        output.push_str("# TYPE resourcepool_resources_added_total counter\n");
        output.push_str(&format!("resourcepool_resources_added_total{{{}}} {}\n", labels, metrics.total_added));

        output.push_str("# HELP resourcepool_resources_closed_total Total resources closed\n");
        output.push_str("# TYPE resourcepool_resources_closed_total counter\n");
        output.push_str(&format!("resourcepool_resources_closed_total{{{}}} {}\n", labels, metrics.total_closed));

        output.push_str("# HELP resourcepool_open_failures_total Failed resource opens\n");
        output.push_str("# TYPE resourcepool_open_failures_total counter\n");
        output.push_str(&format!("resourcepool_open_failures_total{{{}}} {}\n", labels, metrics.open_failures));

        output.push_str("# HELP resourcepool_close_failures_total Failed resource closes\n");
        output.push_str("# TYPE resourcepool_close_failures_total counter\n");
        output.push_str(&format!("resourcepool_close_failures_total{{{}}} {}\n", labels, metrics.close_failures));

        output
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut tags: Vec<_> = tags.iter().collect();
            tags.sort();
            for (key, value) in tags {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
pub(crate) struct MetricsTracker {
    total_added: AtomicUsize,
    total_closed: AtomicUsize,
    open_failures: AtomicUsize,
    close_failures: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            total_added: AtomicUsize::new(0),
            total_closed: AtomicUsize::new(0),
            open_failures: AtomicUsize::new(0),
            close_failures: AtomicUsize::new(0),
        }
    }

    pub fn record_added(&self) {
        self.total_added.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_closed(&self) {
        self.total_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_open_failure(&self) {
        self.open_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_close_failure(&self) {
        self.close_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, tracked: usize, actives: usize, pending_opens: usize) -> PoolMetrics {
        PoolMetrics {
            total_added: self.total_added.load(Ordering::Relaxed),
            total_closed: self.total_closed.load(Ordering::Relaxed),
            open_failures: self.open_failures.load(Ordering::Relaxed),
            close_failures: self.close_failures.load(Ordering::Relaxed),
            tracked_resources: tracked,
            active_handles: actives,
            pending_opens,
        }
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts() {
        let tracker = MetricsTracker::new();
        tracker.record_added();
        tracker.record_added();
        tracker.record_closed();
        tracker.record_open_failure();

        let metrics = tracker.get_metrics(1, 0, 0);
        assert_eq!(metrics.total_added, 2);
        assert_eq!(metrics.total_closed, 1);
        assert_eq!(metrics.open_failures, 1);
        assert_eq!(metrics.close_failures, 0);
        assert_eq!(metrics.export().get("tracked_resources").unwrap(), "1");
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_prometheus_labels_are_sorted() {
        let metrics = MetricsTracker::new().get_metrics(0, 0, 0);
        let mut tags = HashMap::new();
        tags.insert("zone".to_string(), "b".to_string());
        tags.insert("app".to_string(), "a".to_string());

        let output = MetricsExporter::export_prometheus(&metrics, "files", Some(&tags));
        assert!(output.contains("resourcepool_resources_tracked{pool=\"files\",app=\"a\",zone=\"b\"} 0"));
    }
}
