use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;

use super::{SqliteStore, to_u32};
use crate::domain::dates::NightRange;
use crate::domain::events::EventLogEntry;
use crate::domain::money::Money;
use crate::domain::property::{Guest, GuestProfile, Property};
use crate::domain::quote::{QuoteBreakdown, QuoteRecord};
use crate::domain::reservation::PartySize;
use crate::error::{Result, StayError};
use crate::ports::store::{EventLog, GuestDirectory, PropertyDirectory, QuoteStore};

#[derive(sqlx::FromRow)]
struct PropertyRow {
    id: String,
    organization_id: String,
    slug: String,
    name: String,
    base_price: i64,
    currency: String,
    cleaning_fee: i64,
    min_nights: i64,
    max_nights: Option<i64>,
    max_guests: i64,
    external_listing_id: Option<String>,
}

impl TryFrom<PropertyRow> for Property {
    type Error = StayError;

    fn try_from(row: PropertyRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            organization_id: row.organization_id,
            slug: row.slug,
            name: row.name,
            base_price: Money::from_minor(row.base_price),
            currency: row.currency,
            cleaning_fee: Money::from_minor(row.cleaning_fee),
            min_nights: to_u32(row.min_nights, "min_nights")?,
            max_nights: row
                .max_nights
                .map(|n| to_u32(n, "max_nights"))
                .transpose()?,
            max_guests: to_u32(row.max_guests, "max_guests")?,
            external_listing_id: row.external_listing_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GuestRow {
    id: String,
    organization_id: String,
    email: String,
    name: String,
    phone: Option<String>,
}

impl From<GuestRow> for Guest {
    fn from(row: GuestRow) -> Self {
        Self {
            id: row.id,
            organization_id: row.organization_id,
            email: row.email,
            name: row.name,
            phone: row.phone,
        }
    }
}

#[derive(sqlx::FromRow)]
struct QuoteRow {
    id: String,
    property_id: String,
    check_in: NaiveDate,
    check_out: NaiveDate,
    adults: i64,
    children: i64,
    infants: i64,
    promo_code: Option<String>,
    breakdown: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<QuoteRow> for QuoteRecord {
    type Error = StayError;

    fn try_from(row: QuoteRow) -> Result<Self> {
        let breakdown: QuoteBreakdown = serde_json::from_str(&row.breakdown)?;
        Ok(Self {
            id: row.id,
            property_id: row.property_id,
            range: NightRange::new(row.check_in, row.check_out)?,
            party: PartySize {
                adults: to_u32(row.adults, "adults")?,
                children: to_u32(row.children, "children")?,
                infants: to_u32(row.infants, "infants")?,
            },
            promo_code: row.promo_code,
            breakdown,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: String,
    event_id: Option<String>,
    kind: String,
    organization_id: Option<String>,
    external_id: Option<String>,
    aggregate_id: Option<String>,
    outcome: String,
    detail: String,
    latency_ms: i64,
    received_at: DateTime<Utc>,
}

impl From<EventRow> for EventLogEntry {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            event_id: row.event_id,
            kind: row.kind,
            organization_id: row.organization_id,
            external_id: row.external_id,
            aggregate_id: row.aggregate_id,
            outcome: row.outcome,
            detail: row.detail,
            latency_ms: row.latency_ms,
            received_at: row.received_at,
        }
    }
}

const PROPERTY_COLUMNS: &str = "id, organization_id, slug, name, base_price, currency, \
     cleaning_fee, min_nights, max_nights, max_guests, external_listing_id";

impl SqliteStore {
    /// Insert or replace a property. Properties are owned by property
    /// management; this is the seeding path.
    pub async fn upsert_property(&self, property: &Property) -> Result<()> {
        sqlx::query(
            "INSERT INTO properties (id, organization_id, slug, name, base_price, currency,
                                     cleaning_fee, min_nights, max_nights, max_guests,
                                     external_listing_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                 organization_id = excluded.organization_id,
                 slug = excluded.slug,
                 name = excluded.name,
                 base_price = excluded.base_price,
                 currency = excluded.currency,
                 cleaning_fee = excluded.cleaning_fee,
                 min_nights = excluded.min_nights,
                 max_nights = excluded.max_nights,
                 max_guests = excluded.max_guests,
                 external_listing_id = excluded.external_listing_id",
        )
        .bind(&property.id)
        .bind(&property.organization_id)
        .bind(&property.slug)
        .bind(&property.name)
        .bind(property.base_price.minor())
        .bind(&property.currency)
        .bind(property.cleaning_fee.minor())
        .bind(i64::from(property.min_nights))
        .bind(property.max_nights.map(i64::from))
        .bind(i64::from(property.max_guests))
        .bind(property.external_listing_id.as_deref().filter(|id| !id.trim().is_empty()))
        .execute(&self.pool)
        .await?;
        debug!(property_id = %property.id, "Property upserted");
        Ok(())
    }
}

#[async_trait]
impl PropertyDirectory for SqliteStore {
    async fn get_property(&self, id: &str) -> Result<Property> {
        let row: Option<PropertyRow> =
            sqlx::query_as(&format!("SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.ok_or_else(|| StayError::not_found("Property", id))?
            .try_into()
    }

    async fn find_by_listing(&self, external_listing_id: &str) -> Result<Option<Property>> {
        let row: Option<PropertyRow> = sqlx::query_as(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE external_listing_id = ?"
        ))
        .bind(external_listing_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Property::try_from).transpose()
    }
}

#[async_trait]
impl GuestDirectory for SqliteStore {
    async fn find_or_create_guest(
        &self,
        organization_id: &str,
        profile: &GuestProfile,
        new_id: &str,
    ) -> Result<Guest> {
        let email = profile.normalized_email();
        if email.is_empty() {
            return Err(StayError::invalid("guest email is required"));
        }
        // Existing guests keep their id; blank names never overwrite.
        sqlx::query(
            "INSERT INTO guests (id, organization_id, email, name, phone)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(organization_id, email) DO UPDATE SET
                 name = CASE WHEN excluded.name <> '' THEN excluded.name ELSE guests.name END,
                 phone = COALESCE(excluded.phone, guests.phone)",
        )
        .bind(new_id)
        .bind(organization_id)
        .bind(&email)
        .bind(profile.name.trim())
        .bind(profile.phone.as_deref())
        .execute(&self.pool)
        .await?;

        let row: GuestRow = sqlx::query_as(
            "SELECT id, organization_id, email, name, phone
             FROM guests WHERE organization_id = ? AND email = ?",
        )
        .bind(organization_id)
        .bind(&email)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }
}

#[async_trait]
impl QuoteStore for SqliteStore {
    async fn save_quote(&self, quote: &QuoteRecord) -> Result<()> {
        let breakdown = serde_json::to_string(&quote.breakdown)?;
        sqlx::query(
            "INSERT INTO quotes (id, property_id, check_in, check_out, adults, children, infants,
                                 promo_code, currency, total, breakdown, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .bind(&quote.id)
        .bind(&quote.property_id)
        .bind(quote.range.check_in())
        .bind(quote.range.check_out())
        .bind(i64::from(quote.party.adults))
        .bind(i64::from(quote.party.children))
        .bind(i64::from(quote.party.infants))
        .bind(quote.promo_code.as_deref())
        .bind(&quote.breakdown.currency)
        .bind(quote.breakdown.total.minor())
        .bind(breakdown)
        .bind(quote.created_at)
        .bind(quote.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_quote(&self, id: &str) -> Result<QuoteRecord> {
        let row: Option<QuoteRow> = sqlx::query_as(
            "SELECT id, property_id, check_in, check_out, adults, children, infants,
                    promo_code, breakdown, created_at, expires_at
             FROM quotes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| StayError::not_found("Quote", id))?
            .try_into()
    }
}

#[async_trait]
impl EventLog for SqliteStore {
    async fn record_event(&self, entry: &EventLogEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO event_log (id, event_id, kind, organization_id, external_id,
                                    aggregate_id, outcome, detail, latency_ms, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&entry.id)
        .bind(entry.event_id.as_deref())
        .bind(&entry.kind)
        .bind(entry.organization_id.as_deref())
        .bind(entry.external_id.as_deref())
        .bind(entry.aggregate_id.as_deref())
        .bind(&entry.outcome)
        .bind(&entry.detail)
        .bind(entry.latency_ms)
        .bind(entry.received_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_events(&self, limit: u32) -> Result<Vec<EventLogEntry>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT id, event_id, kind, organization_id, external_id, aggregate_id,
                    outcome, detail, latency_ms, received_at
             FROM event_log ORDER BY received_at DESC, rowid DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(EventLogEntry::from).collect())
    }
}
