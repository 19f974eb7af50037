use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StayError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("Dates not available: {}", format_dates(blocked_dates))]
    NotAvailable { blocked_dates: Vec<NaiveDate> },

    #[error("Guest limit exceeded: {requested} guests requested, property allows {max}")]
    GuestLimitExceeded { requested: u32, max: u32 },

    #[error("Minimum stay not met: {requested} nights requested, {required} required")]
    MinimumNightsNotMet { requested: u32, required: u32 },

    #[error("Maximum stay exceeded: {requested} nights requested, at most {max} allowed")]
    MaximumNightsExceeded { requested: u32, max: u32 },

    #[error("Quote {quote_id} expired at {expired_at}, request a new quote")]
    QuoteExpired {
        quote_id: String,
        expired_at: DateTime<Utc>,
    },

    #[error("Someone else just booked these dates ({}), please choose your dates again", format_dates(dates))]
    Conflict {
        property_id: String,
        dates: Vec<NaiveDate>,
    },

    #[error("Pricing unavailable: {reason}")]
    PricingUnavailable { reason: String },

    #[error("Rate source unavailable: {reason}")]
    RateSourceUnavailable { reason: String },

    #[error("Rate calendar returned {actual} nightly rates, expected {expected}")]
    RateCountMismatch { expected: u32, actual: u32 },

    #[error("Upstream temporarily unavailable: {reason}")]
    UpstreamTransient { reason: String },

    #[error("PMS rejected the request (HTTP {status}): {reason}")]
    UpstreamRejected { status: u16, reason: String },

    #[error("No property is linked to external listing {listing_id}")]
    Unmapped { listing_id: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Invalid reservation transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl StayError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Self::UpstreamTransient {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same operation unchanged can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::UpstreamTransient { .. } => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// SQLite lock contention is transient; everything else is a plain database
/// error. Constraint violations are mapped by the store, which knows which
/// constraint means what.
impl From<sqlx::Error> for StayError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if is_busy(db.code().as_deref(), db.message()) => {
                Self::transient(format!("database busy: {}", db.message()))
            }
            sqlx::Error::PoolTimedOut => Self::transient("database pool timed out"),
            _ => Self::Database(err.to_string()),
        }
    }
}

// SQLITE_BUSY (5), SQLITE_LOCKED (6) and their extended codes.
fn is_busy(code: Option<&str>, message: &str) -> bool {
    let primary = code
        .and_then(|c| c.parse::<i32>().ok())
        .map(|c| c & 0xff);
    matches!(primary, Some(5 | 6)) || message.contains("database is locked")
}

fn format_dates(dates: &[NaiveDate]) -> String {
    if dates.is_empty() {
        return "none listed".to_string();
    }
    dates
        .iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, StayError>;
