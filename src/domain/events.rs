use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::dates::{NightRange, parse_date};
use super::money::Money;
use super::property::GuestProfile;
use super::reservation::{PartySize, ReservationStatus};
use crate::error::{Result, StayError};

/// Lifecycle event kinds this core acts on. Anything else is acknowledged
/// and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Updated,
    Cancelled,
    Other(String),
}

impl EventKind {
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "reservation.created" | "reservation.new" => Self::Created,
            "reservation.updated" => Self::Updated,
            "reservation.cancelled" | "reservation.canceled" => Self::Cancelled,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "reservation.created",
            Self::Updated => "reservation.updated",
            Self::Cancelled => "reservation.cancelled",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Wire shape of a PMS webhook. Dates may be plain dates or full timestamps.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    event: String,
    #[serde(default, alias = "eventId")]
    id: Option<String>,
    #[serde(default)]
    reservation: Option<RawReservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReservation {
    #[serde(alias = "_id")]
    id: String,
    listing_id: String,
    #[serde(alias = "checkInDateLocalized")]
    check_in: String,
    #[serde(alias = "checkOutDateLocalized")]
    check_out: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    guest: Option<RawGuest>,
    #[serde(default)]
    guests_count: Option<RawGuestsCount>,
    #[serde(default)]
    money: Option<RawMoney>,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGuest {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGuestsCount {
    #[serde(default)]
    adults: Option<u32>,
    #[serde(default)]
    children: Option<u32>,
    #[serde(default)]
    infants: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMoney {
    #[serde(default, alias = "hostPayout")]
    total_paid: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
}

/// A reservation as described by the external PMS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalBooking {
    /// External reservation id; the correlation key.
    pub external_id: String,
    pub listing_id: String,
    pub range: NightRange,
    pub status: Option<ReservationStatus>,
    pub guest: GuestProfile,
    pub party: PartySize,
    pub total: Option<Money>,
    pub currency: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalEvent {
    pub event_id: Option<String>,
    pub kind: EventKind,
    pub booking: Option<ExternalBooking>,
}

impl ExternalEvent {
    /// Parse a webhook body whose signature has already been verified.
    pub fn parse(body: &str) -> Result<Self> {
        let raw: RawEvent = serde_json::from_str(body)?;
        Self::from_raw(raw)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let raw: RawEvent = serde_json::from_value(value)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawEvent) -> Result<Self> {
        let kind = EventKind::parse(&raw.event);
        let booking = match (&kind, raw.reservation) {
            (EventKind::Other(_), _) => None,
            (_, Some(r)) => Some(convert_reservation(r)?),
            (_, None) => {
                return Err(StayError::invalid(format!(
                    "{kind} event without a reservation payload"
                )));
            }
        };
        Ok(Self {
            event_id: raw.id.filter(|id| !id.trim().is_empty()),
            kind,
            booking,
        })
    }

    /// An `updated` whose status is cancelled is handled as a cancellation.
    pub fn effective_kind(&self) -> EventKind {
        match (&self.kind, self.booking.as_ref().and_then(|b| b.status)) {
            (EventKind::Updated, Some(ReservationStatus::Cancelled)) => EventKind::Cancelled,
            (kind, _) => kind.clone(),
        }
    }

    pub fn external_id(&self) -> Option<&str> {
        self.booking.as_ref().map(|b| b.external_id.as_str())
    }
}

fn convert_reservation(r: RawReservation) -> Result<ExternalBooking> {
    let external_id = r.id.trim().to_string();
    if external_id.is_empty() {
        return Err(StayError::invalid("reservation id is empty"));
    }
    let range = NightRange::new(event_date(&r.check_in)?, event_date(&r.check_out)?)?;
    let source = r
        .source
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "pms".to_string());

    let guest = r.guest.unwrap_or_default();
    let email = guest
        .email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| e.contains('@'))
        .unwrap_or_else(|| placeholder_email(&external_id, &source));
    let name = guest
        .full_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "External guest".to_string());

    let counts = r.guests_count.unwrap_or_default();
    let party = PartySize {
        adults: counts.adults.unwrap_or(1).max(1),
        children: counts.children.unwrap_or(0),
        infants: counts.infants.unwrap_or(0),
    };

    let money = r.money.unwrap_or_default();
    let total = match money.total_paid {
        Some(v) => Some(
            Money::from_major(v)
                .ok_or_else(|| StayError::invalid(format!("invalid reservation total {v}")))?,
        ),
        None => None,
    };

    Ok(ExternalBooking {
        listing_id: r.listing_id.trim().to_string(),
        range,
        status: r.status.as_deref().and_then(|s| s.parse().ok()),
        guest: GuestProfile {
            name,
            email,
            phone: guest.phone.filter(|p| !p.trim().is_empty()),
        },
        party,
        total,
        currency: money.currency.filter(|c| !c.trim().is_empty()),
        source,
        external_id,
    })
}

fn event_date(s: &str) -> Result<NaiveDate> {
    parse_date(s.get(..10).unwrap_or(s))
}

/// Channel bookings often arrive without a guest email; the guest directory
/// still needs a stable key per reservation.
fn placeholder_email(external_id: &str, source: &str) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.'))
            .collect::<String>()
            .to_lowercase()
    };
    format!("external-{}@{}.invalid", clean(external_id), clean(source))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingOutcome {
    /// New reservation materialized and its nights reserved.
    Created,
    /// Existing reservation moved to new dates.
    Transferred,
    /// Existing reservation fields changed, dates untouched.
    Updated,
    /// Reservation cancelled and its nights released.
    Released,
    /// Already reconciled; nothing to do.
    Duplicate,
    /// Not a reservation event, or nothing to act on.
    Ignored,
    /// No property is linked to the event's listing.
    Unmapped,
    /// The nights are held by another booking.
    Conflict,
}

impl ProcessingOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Transferred => "transferred",
            Self::Updated => "updated",
            Self::Released => "released",
            Self::Duplicate => "duplicate",
            Self::Ignored => "ignored",
            Self::Unmapped => "unmapped",
            Self::Conflict => "conflict",
        }
    }
}

/// Acknowledgement returned for every delivered event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub event_id: Option<String>,
    pub kind: EventKind,
    pub external_id: Option<String>,
    pub outcome: ProcessingOutcome,
    pub reservation_id: Option<String>,
    pub detail: String,
    /// Always true: receipt is acknowledged even when nothing was applied.
    pub acknowledged: bool,
}

impl fmt::Display for ProcessingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.kind, self.outcome.as_str())?;
        if let Some(ref ext) = self.external_id {
            write!(f, " (external {ext})")?;
        }
        if let Some(ref id) = self.reservation_id {
            write!(f, " reservation {id}")?;
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

/// Audit record of one processed delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: String,
    pub event_id: Option<String>,
    pub kind: String,
    pub organization_id: Option<String>,
    pub external_id: Option<String>,
    pub aggregate_id: Option<String>,
    pub outcome: String,
    pub detail: String,
    pub latency_ms: i64,
    pub received_at: DateTime<Utc>,
}
