use std::time::Duration;

/// String-valued TTL cache for derived, recomputable results.
pub trait ReportCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str, ttl: Duration);
    /// Drop every entry whose key starts with `prefix`. Returns the count.
    fn invalidate_prefix(&self, prefix: &str) -> usize;
}
