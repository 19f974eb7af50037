use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use super::{SqliteStore, to_u32, unique_violation};
use crate::domain::calendar::{CalendarDay, DayStatus};
use crate::domain::dates::NightRange;
use crate::domain::money::Money;
use crate::domain::reservation::{PartySize, Reservation, ReservationAmounts, ReservationStatus};
use crate::error::{Result, StayError};
use crate::ports::store::{LedgerStore, ReleaseOutcome};

// A night is written only when it is free or already ours; zero rows
// affected means someone else holds it.
const RESERVE_NIGHT: &str = "INSERT INTO calendar_days (property_id, date, status, reservation_id)
     VALUES (?1, ?2, 'booked', ?3)
     ON CONFLICT(property_id, date) DO UPDATE SET
         status = 'booked',
         reservation_id = excluded.reservation_id,
         block_reason = NULL
     WHERE calendar_days.status = 'available'
        OR calendar_days.reservation_id = excluded.reservation_id";

const BLOCK_NIGHT: &str = "INSERT INTO calendar_days (property_id, date, status, block_reason)
     VALUES (?1, ?2, 'blocked', ?3)
     ON CONFLICT(property_id, date) DO UPDATE SET
         status = 'blocked',
         block_reason = excluded.block_reason
     WHERE calendar_days.status <> 'booked'";

// Rows that carry neither a hold nor an override are implicit.
const PRUNE_BARE_DAYS: &str = "DELETE FROM calendar_days
     WHERE property_id = ?1 AND status = 'available' AND reservation_id IS NULL
       AND price IS NULL AND min_nights IS NULL";

const RESERVATION_COLUMNS: &str = "id, organization_id, property_id, guest_id, status, \
     check_in, check_out, adults, children, infants, accommodation, cleaning, service, taxes, \
     total, currency, payment_status, source, external_id, notes, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: String,
    organization_id: String,
    property_id: String,
    guest_id: String,
    status: String,
    check_in: NaiveDate,
    check_out: NaiveDate,
    adults: i64,
    children: i64,
    infants: i64,
    accommodation: i64,
    cleaning: i64,
    service: i64,
    taxes: i64,
    total: i64,
    currency: String,
    payment_status: String,
    source: String,
    external_id: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = StayError;

    fn try_from(row: ReservationRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            organization_id: row.organization_id,
            property_id: row.property_id,
            guest_id: row.guest_id,
            status: row.status.parse()?,
            range: NightRange::new(row.check_in, row.check_out)?,
            party: PartySize {
                adults: to_u32(row.adults, "adults")?,
                children: to_u32(row.children, "children")?,
                infants: to_u32(row.infants, "infants")?,
            },
            amounts: ReservationAmounts {
                accommodation: Money::from_minor(row.accommodation),
                cleaning: Money::from_minor(row.cleaning),
                service: Money::from_minor(row.service),
                taxes: Money::from_minor(row.taxes),
                total: Money::from_minor(row.total),
                currency: row.currency,
            },
            payment_status: row.payment_status.parse()?,
            source: row.source,
            external_id: row.external_id,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CalendarRow {
    property_id: String,
    date: NaiveDate,
    status: String,
    reservation_id: Option<String>,
    price: Option<i64>,
    min_nights: Option<i64>,
    block_reason: Option<String>,
}

impl TryFrom<CalendarRow> for CalendarDay {
    type Error = StayError;

    fn try_from(row: CalendarRow) -> Result<Self> {
        Ok(Self {
            property_id: row.property_id,
            date: row.date,
            status: row.status.parse()?,
            reservation_id: row.reservation_id,
            price: row.price.map(Money::from_minor),
            min_nights: row
                .min_nights
                .map(|n| to_u32(n, "min_nights"))
                .transpose()?,
            block_reason: row.block_reason,
        })
    }
}

async fn reserve_range(
    conn: &mut SqliteConnection,
    property_id: &str,
    range: &NightRange,
    reservation_id: &str,
) -> Result<()> {
    let mut taken = Vec::new();
    for night in range.iter_nights() {
        let done = sqlx::query(RESERVE_NIGHT)
            .bind(property_id)
            .bind(night)
            .bind(reservation_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| night_write_error(e, property_id, night))?;
        if done.rows_affected() == 0 {
            taken.push(night);
        }
    }
    if taken.is_empty() {
        Ok(())
    } else {
        warn!(property_id, reservation_id, nights = ?taken, "Nights already held");
        Err(StayError::Conflict {
            property_id: property_id.to_string(),
            dates: taken,
        })
    }
}

fn night_write_error(err: sqlx::Error, property_id: &str, night: NaiveDate) -> StayError {
    if unique_violation(&err).is_some() {
        StayError::Conflict {
            property_id: property_id.to_string(),
            dates: vec![night],
        }
    } else {
        err.into()
    }
}

async fn free_nights(conn: &mut SqliteConnection, reservation_id: &str) -> Result<u32> {
    let done = sqlx::query(
        "UPDATE calendar_days SET status = 'available', reservation_id = NULL
         WHERE reservation_id = ?1",
    )
    .bind(reservation_id)
    .execute(&mut *conn)
    .await?;
    Ok(u32::try_from(done.rows_affected()).unwrap_or(u32::MAX))
}

async fn prune(conn: &mut SqliteConnection, property_id: &str) -> Result<()> {
    sqlx::query(PRUNE_BARE_DAYS)
        .bind(property_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Bumps `updated_at` so the transaction takes the write lock before it
/// reads anything.
async fn touch(conn: &mut SqliteConnection, reservation_id: &str, at: DateTime<Utc>) -> Result<()> {
    let done = sqlx::query("UPDATE reservations SET updated_at = ?2 WHERE id = ?1")
        .bind(reservation_id)
        .bind(at)
        .execute(&mut *conn)
        .await?;
    if done.rows_affected() == 0 {
        return Err(StayError::not_found("Reservation", reservation_id));
    }
    Ok(())
}

async fn load_reservation(conn: &mut SqliteConnection, id: &str) -> Result<Reservation> {
    let row: Option<ReservationRow> = sqlx::query_as(&format!(
        "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    row.ok_or_else(|| StayError::not_found("Reservation", id))?
        .try_into()
}

impl SqliteStore {
    /// Set or clear the price and min-stay override for one date. Any hold
    /// on the date is left alone.
    pub async fn set_day_override(
        &self,
        property_id: &str,
        date: NaiveDate,
        price: Option<Money>,
        min_nights: Option<u32>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO calendar_days (property_id, date, status, price, min_nights)
             VALUES (?1, ?2, 'available', ?3, ?4)
             ON CONFLICT(property_id, date) DO UPDATE SET
                 price = excluded.price,
                 min_nights = excluded.min_nights",
        )
        .bind(property_id)
        .bind(date)
        .bind(price.map(Money::minor))
        .bind(min_nights.map(i64::from))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn occupied_dates(
        &self,
        property_id: &str,
        range: &NightRange,
    ) -> Result<Vec<NaiveDate>> {
        let held: Vec<(NaiveDate,)> = sqlx::query_as(
            "SELECT date FROM calendar_days
             WHERE property_id = ?1 AND date >= ?2 AND date < ?3
               AND status IN ('booked', 'blocked')",
        )
        .bind(property_id)
        .bind(range.check_in())
        .bind(range.check_out())
        .fetch_all(&self.pool)
        .await?;

        // Pending reservations hold their dates without calendar rows.
        let pending: Vec<(NaiveDate, NaiveDate)> = sqlx::query_as(
            "SELECT check_in, check_out FROM reservations
             WHERE property_id = ?1 AND status = 'pending'
               AND check_in < ?3 AND check_out > ?2",
        )
        .bind(property_id)
        .bind(range.check_in())
        .bind(range.check_out())
        .fetch_all(&self.pool)
        .await?;

        let mut dates: Vec<NaiveDate> = held.into_iter().map(|(d,)| d).collect();
        for (check_in, check_out) in pending {
            let stay = NightRange::new(check_in, check_out)?;
            dates.extend(stay.iter_nights().filter(|d| range.contains(*d)));
        }
        dates.sort_unstable();
        dates.dedup();
        Ok(dates)
    }

    async fn calendar_days(
        &self,
        property_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CalendarDay>> {
        let rows: Vec<CalendarRow> = sqlx::query_as(
            "SELECT property_id, date, status, reservation_id, price, min_nights, block_reason
             FROM calendar_days
             WHERE property_id = ?1 AND date >= ?2 AND date < ?3
             ORDER BY date",
        )
        .bind(property_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(CalendarDay::try_from).collect()
    }

    async fn insert_reservation(&self, reservation: &Reservation) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(&format!(
            "INSERT INTO reservations ({RESERVATION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                     ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)"
        ))
        .bind(&reservation.id)
        .bind(&reservation.organization_id)
        .bind(&reservation.property_id)
        .bind(&reservation.guest_id)
        .bind(reservation.status.as_str())
        .bind(reservation.range.check_in())
        .bind(reservation.range.check_out())
        .bind(i64::from(reservation.party.adults))
        .bind(i64::from(reservation.party.children))
        .bind(i64::from(reservation.party.infants))
        .bind(reservation.amounts.accommodation.minor())
        .bind(reservation.amounts.cleaning.minor())
        .bind(reservation.amounts.service.minor())
        .bind(reservation.amounts.taxes.minor())
        .bind(reservation.amounts.total.minor())
        .bind(&reservation.amounts.currency)
        .bind(reservation.payment_status.as_str())
        .bind(&reservation.source)
        .bind(reservation.external_id.as_deref())
        .bind(reservation.notes.as_deref())
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            return Err(match unique_violation(&e) {
                Some(constraint) if constraint.contains("external_id") => {
                    StayError::AlreadyExists {
                        entity: "Reservation",
                        id: reservation.external_id.clone().unwrap_or_default(),
                    }
                }
                Some(_) => StayError::AlreadyExists {
                    entity: "Reservation",
                    id: reservation.id.clone(),
                },
                None => e.into(),
            });
        }

        if reservation.status == ReservationStatus::Confirmed {
            reserve_range(
                &mut *tx,
                &reservation.property_id,
                &reservation.range,
                &reservation.id,
            )
            .await?;
        }
        tx.commit().await?;
        debug!(
            reservation_id = %reservation.id,
            property_id = %reservation.property_id,
            status = %reservation.status,
            "Reservation stored"
        );
        Ok(())
    }

    async fn get_reservation(&self, id: &str) -> Result<Reservation> {
        let mut conn = self.pool.acquire().await?;
        load_reservation(&mut *conn, id).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Reservation>> {
        let row: Option<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE external_id = ?"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Reservation::try_from).transpose()
    }

    async fn release(&self, reservation_id: &str, at: DateTime<Utc>) -> Result<ReleaseOutcome> {
        let mut tx = self.pool.begin().await?;
        let cancelled = sqlx::query(
            "UPDATE reservations SET status = 'cancelled', updated_at = ?2, cancelled_at = ?2
             WHERE id = ?1 AND status <> 'cancelled'",
        )
        .bind(reservation_id)
        .bind(at)
        .execute(&mut *tx)
        .await?;
        let already_cancelled = cancelled.rows_affected() == 0;

        let property_id: Option<(String,)> =
            sqlx::query_as("SELECT property_id FROM reservations WHERE id = ?")
                .bind(reservation_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some((property_id,)) = property_id else {
            return Err(StayError::not_found("Reservation", reservation_id));
        };

        let nights_released = free_nights(&mut *tx, reservation_id).await?;
        prune(&mut *tx, &property_id).await?;
        tx.commit().await?;

        debug!(reservation_id, nights_released, already_cancelled, "Reservation released");
        Ok(ReleaseOutcome {
            nights_released,
            already_cancelled,
        })
    }

    async fn transfer(
        &self,
        reservation_id: &str,
        new_range: &NightRange,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        touch(&mut *tx, reservation_id, at).await?;
        let reservation = load_reservation(&mut *tx, reservation_id).await?;
        if !reservation.status.holds_dates() {
            return Err(StayError::invalid(format!(
                "reservation {reservation_id} is {} and cannot change dates",
                reservation.status
            )));
        }

        if reservation.status == ReservationStatus::Confirmed {
            free_nights(&mut *tx, reservation_id).await?;
            reserve_range(&mut *tx, &reservation.property_id, new_range, reservation_id).await?;
            prune(&mut *tx, &reservation.property_id).await?;
        }
        sqlx::query("UPDATE reservations SET check_in = ?2, check_out = ?3 WHERE id = ?1")
            .bind(reservation_id)
            .bind(new_range.check_in())
            .bind(new_range.check_out())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(reservation_id, from = %reservation.range, to = %new_range, "Reservation moved");
        Ok(())
    }

    async fn confirm(&self, reservation_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        touch(&mut *tx, reservation_id, at).await?;
        let reservation = load_reservation(&mut *tx, reservation_id).await?;
        let next = reservation
            .status
            .transition_to(ReservationStatus::Confirmed)?;

        reserve_range(
            &mut *tx,
            &reservation.property_id,
            &reservation.range,
            reservation_id,
        )
        .await?;
        sqlx::query("UPDATE reservations SET status = ?2 WHERE id = ?1")
            .bind(reservation_id)
            .bind(next.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_details(
        &self,
        reservation_id: &str,
        party: &PartySize,
        amounts: &ReservationAmounts,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let done = sqlx::query(
            "UPDATE reservations SET
                 adults = ?2, children = ?3, infants = ?4,
                 accommodation = ?5, cleaning = ?6, service = ?7, taxes = ?8, total = ?9,
                 currency = ?10, updated_at = ?11
             WHERE id = ?1",
        )
        .bind(reservation_id)
        .bind(i64::from(party.adults))
        .bind(i64::from(party.children))
        .bind(i64::from(party.infants))
        .bind(amounts.accommodation.minor())
        .bind(amounts.cleaning.minor())
        .bind(amounts.service.minor())
        .bind(amounts.taxes.minor())
        .bind(amounts.total.minor())
        .bind(&amounts.currency)
        .bind(at)
        .execute(&self.pool)
        .await?;
        if done.rows_affected() == 0 {
            return Err(StayError::not_found("Reservation", reservation_id));
        }
        Ok(())
    }

    async fn set_external_id(&self, reservation_id: &str, external_id: &str) -> Result<()> {
        let done = sqlx::query("UPDATE reservations SET external_id = ?2 WHERE id = ?1")
            .bind(reservation_id)
            .bind(external_id)
            .execute(&self.pool)
            .await
            .map_err(|e| match unique_violation(&e) {
                Some(_) => StayError::AlreadyExists {
                    entity: "Reservation",
                    id: external_id.to_string(),
                },
                None => e.into(),
            })?;
        if done.rows_affected() == 0 {
            return Err(StayError::not_found("Reservation", reservation_id));
        }
        Ok(())
    }

    async fn block(
        &self,
        property_id: &str,
        range: &NightRange,
        reason: Option<&str>,
    ) -> Result<u32> {
        let mut tx = self.pool.begin().await?;
        let mut booked = Vec::new();
        for night in range.iter_nights() {
            let done = sqlx::query(BLOCK_NIGHT)
                .bind(property_id)
                .bind(night)
                .bind(reason)
                .execute(&mut *tx)
                .await?;
            if done.rows_affected() == 0 {
                booked.push(night);
            }
        }
        if !booked.is_empty() {
            return Err(StayError::Conflict {
                property_id: property_id.to_string(),
                dates: booked,
            });
        }
        tx.commit().await?;
        Ok(range.nights())
    }

    async fn unblock(&self, property_id: &str, range: &NightRange) -> Result<u32> {
        let mut tx = self.pool.begin().await?;
        let done = sqlx::query(
            "UPDATE calendar_days SET status = 'available', block_reason = NULL
             WHERE property_id = ?1 AND date >= ?2 AND date < ?3 AND status = ?4",
        )
        .bind(property_id)
        .bind(range.check_in())
        .bind(range.check_out())
        .bind(DayStatus::Blocked.as_str())
        .execute(&mut *tx)
        .await?;
        prune(&mut *tx, property_id).await?;
        tx.commit().await?;
        Ok(u32::try_from(done.rows_affected()).unwrap_or(u32::MAX))
    }

    async fn reservation_nights(&self, reservation_id: &str) -> Result<Vec<NaiveDate>> {
        let rows: Vec<(NaiveDate,)> = sqlx::query_as(
            "SELECT date FROM calendar_days WHERE reservation_id = ? ORDER BY date",
        )
        .bind(reservation_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(d,)| d).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dates::parse_date;
    use crate::test_helpers::{make_reservation, seeded_store};
    use pretty_assertions::assert_eq;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn range(a: &str, b: &str) -> NightRange {
        NightRange::parse(a, b).unwrap()
    }

    fn confirmed(id: &str, check_in: &str, check_out: &str) -> Reservation {
        make_reservation(id, check_in, check_out, ReservationStatus::Confirmed)
    }

    fn pending(id: &str, check_in: &str, check_out: &str) -> Reservation {
        make_reservation(id, check_in, check_out, ReservationStatus::Pending)
    }

    #[tokio::test]
    async fn confirmed_insert_books_every_night() {
        let store = seeded_store().await;
        let reservation = confirmed("r1", "2026-05-04", "2026-05-07");
        store.insert_reservation(&reservation).await.unwrap();

        assert_eq!(
            store.reservation_nights("r1").await.unwrap(),
            vec![d("2026-05-04"), d("2026-05-05"), d("2026-05-06")]
        );
        assert_eq!(
            store
                .occupied_dates("p1", &range("2026-05-01", "2026-05-10"))
                .await
                .unwrap()
                .len(),
            3
        );
        assert_eq!(store.get_reservation("r1").await.unwrap(), reservation);
    }

    #[tokio::test]
    async fn overlapping_insert_conflicts_and_rolls_back() {
        let store = seeded_store().await;
        store
            .insert_reservation(&confirmed("r1", "2026-05-04", "2026-05-07"))
            .await
            .unwrap();

        let err = store
            .insert_reservation(&confirmed("r2", "2026-05-06", "2026-05-09"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, StayError::Conflict { ref dates, .. } if dates == &vec![d("2026-05-06")])
        );
        assert!(matches!(
            store.get_reservation("r2").await,
            Err(StayError::NotFound { .. })
        ));
        assert!(store.reservation_nights("r2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn checkout_day_is_free_for_next_checkin() {
        let store = seeded_store().await;
        store
            .insert_reservation(&confirmed("r1", "2026-05-04", "2026-05-07"))
            .await
            .unwrap();
        store
            .insert_reservation(&confirmed("r2", "2026-05-07", "2026-05-09"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn duplicate_external_id_is_already_exists() {
        let store = seeded_store().await;
        let mut first = confirmed("r1", "2026-05-04", "2026-05-06");
        first.external_id = Some("R-100".into());
        store.insert_reservation(&first).await.unwrap();

        let mut second = confirmed("r2", "2026-06-04", "2026-06-06");
        second.external_id = Some("R-100".into());
        let err = store.insert_reservation(&second).await.unwrap_err();
        assert!(matches!(err, StayError::AlreadyExists { ref id, .. } if id == "R-100"));
        assert_eq!(
            store.find_by_external_id("R-100").await.unwrap().unwrap().id,
            "r1"
        );
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let store = seeded_store().await;
        store
            .insert_reservation(&confirmed("r1", "2026-05-04", "2026-05-07"))
            .await
            .unwrap();

        let first = store.release("r1", Utc::now()).await.unwrap();
        assert_eq!(
            first,
            ReleaseOutcome {
                nights_released: 3,
                already_cancelled: false
            }
        );
        let second = store.release("r1", Utc::now()).await.unwrap();
        assert_eq!(
            second,
            ReleaseOutcome {
                nights_released: 0,
                already_cancelled: true
            }
        );

        assert_eq!(
            store.get_reservation("r1").await.unwrap().status,
            ReservationStatus::Cancelled
        );
        // Bare rows are gone, not left behind as explicit "available"
        assert!(
            store
                .calendar_days("p1", d("2026-05-01"), d("2026-05-10"))
                .await
                .unwrap()
                .is_empty()
        );
        assert!(matches!(
            store.release("missing", Utc::now()).await,
            Err(StayError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn release_keeps_price_overrides() {
        let store = seeded_store().await;
        store
            .set_day_override("p1", d("2026-05-05"), Some(Money::from_minor(99_000)), None)
            .await
            .unwrap();
        store
            .insert_reservation(&confirmed("r1", "2026-05-04", "2026-05-07"))
            .await
            .unwrap();
        store.release("r1", Utc::now()).await.unwrap();

        let days = store
            .calendar_days("p1", d("2026-05-01"), d("2026-05-10"))
            .await
            .unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].status, DayStatus::Available);
        assert_eq!(days[0].price, Some(Money::from_minor(99_000)));
    }

    #[tokio::test]
    async fn transfer_moves_nights_atomically() {
        let store = seeded_store().await;
        store
            .insert_reservation(&confirmed("r1", "2026-05-04", "2026-05-07"))
            .await
            .unwrap();
        store
            .block("p1", &range("2026-05-20", "2026-05-21"), Some("repairs"))
            .await
            .unwrap();

        // Overlapping its own nights is fine
        store
            .transfer("r1", &range("2026-05-05", "2026-05-08"), Utc::now())
            .await
            .unwrap();
        assert_eq!(
            store.reservation_nights("r1").await.unwrap(),
            vec![d("2026-05-05"), d("2026-05-06"), d("2026-05-07")]
        );

        // Onto a blocked night: nothing changes
        let err = store
            .transfer("r1", &range("2026-05-19", "2026-05-22"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StayError::Conflict { .. }));
        let reservation = store.get_reservation("r1").await.unwrap();
        assert_eq!(reservation.range, range("2026-05-05", "2026-05-08"));
        assert_eq!(store.reservation_nights("r1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn cancelled_reservation_cannot_move() {
        let store = seeded_store().await;
        store
            .insert_reservation(&confirmed("r1", "2026-05-04", "2026-05-07"))
            .await
            .unwrap();
        store.release("r1", Utc::now()).await.unwrap();
        let err = store
            .transfer("r1", &range("2026-06-01", "2026-06-03"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StayError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn pending_holds_dates_until_confirmed() {
        let store = seeded_store().await;
        store
            .insert_reservation(&pending("r1", "2026-05-04", "2026-05-06"))
            .await
            .unwrap();
        assert!(store.reservation_nights("r1").await.unwrap().is_empty());
        assert_eq!(
            store
                .occupied_dates("p1", &range("2026-05-05", "2026-05-08"))
                .await
                .unwrap(),
            vec![d("2026-05-05")]
        );

        store.confirm("r1", Utc::now()).await.unwrap();
        assert_eq!(store.reservation_nights("r1").await.unwrap().len(), 2);
        let err = store.confirm("r1", Utc::now()).await.unwrap_err();
        assert!(matches!(err, StayError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn block_refuses_booked_nights_and_unblock_restores() {
        let store = seeded_store().await;
        store
            .insert_reservation(&confirmed("r1", "2026-05-04", "2026-05-06"))
            .await
            .unwrap();

        let err = store
            .block("p1", &range("2026-05-05", "2026-05-08"), None)
            .await
            .unwrap_err();
        assert!(
            matches!(err, StayError::Conflict { ref dates, .. } if dates == &vec![d("2026-05-05")])
        );
        assert!(
            store
                .occupied_dates("p1", &range("2026-05-06", "2026-05-08"))
                .await
                .unwrap()
                .is_empty()
        );

        let blocked = store
            .block("p1", &range("2026-05-10", "2026-05-13"), Some("owner stay"))
            .await
            .unwrap();
        assert_eq!(blocked, 3);
        let days = store
            .calendar_days("p1", d("2026-05-10"), d("2026-05-13"))
            .await
            .unwrap();
        assert_eq!(days[0].block_reason.as_deref(), Some("owner stay"));

        // Only blocked nights are lifted; r1's booked nights stay
        let lifted = store
            .unblock("p1", &range("2026-05-01", "2026-05-12"))
            .await
            .unwrap();
        assert_eq!(lifted, 2);
        assert_eq!(store.reservation_nights("r1").await.unwrap().len(), 2);
        assert_eq!(
            store
                .occupied_dates("p1", &range("2026-05-10", "2026-05-13"))
                .await
                .unwrap(),
            vec![d("2026-05-12")]
        );
    }

    #[tokio::test]
    async fn details_and_external_id_updates() {
        let store = seeded_store().await;
        store
            .insert_reservation(&confirmed("r1", "2026-05-04", "2026-05-06"))
            .await
            .unwrap();
        store
            .update_details(
                "r1",
                &PartySize::new(3, 1),
                &ReservationAmounts::total_only(Money::from_minor(200_000), "ILS"),
                Utc::now(),
            )
            .await
            .unwrap();
        store.set_external_id("r1", "R-9").await.unwrap();

        let reservation = store.find_by_external_id("R-9").await.unwrap().unwrap();
        assert_eq!(reservation.party.occupancy(), 4);
        assert_eq!(reservation.amounts.total, Money::from_minor(200_000));
        assert!(matches!(
            store.set_external_id("nope", "R-10").await,
            Err(StayError::NotFound { .. })
        ));
    }
}
