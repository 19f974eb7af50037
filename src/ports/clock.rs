use chrono::{DateTime, NaiveDate, Utc};

/// Source of the current time, injected so quote expiry and rolling windows
/// are deterministic in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Collision-resistant identifiers for reservations, quotes, guests and
/// event log rows.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}
