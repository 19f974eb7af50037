use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::calendar::RateDay;
use super::dates::{DATE_FORMAT, NightRange};
use super::money::Money;
use super::reservation::PartySize;
use crate::error::{Result, StayError};

/// Fee, discount and tax rates applied to every quote. Percentages are basis
/// points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub weekend_markup_bps: u32,
    pub weekly_min_nights: u32,
    pub weekly_discount_bps: u32,
    pub monthly_min_nights: u32,
    pub monthly_discount_bps: u32,
    pub promo_discount_bps: u32,
    pub service_fee_bps: u32,
    pub tax_bps: u32,
    pub quote_ttl_hours: i64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            weekend_markup_bps: 2000,
            weekly_min_nights: 7,
            weekly_discount_bps: 1000,
            monthly_min_nights: 28,
            monthly_discount_bps: 2000,
            promo_discount_bps: 500,
            service_fee_bps: 1200,
            tax_bps: 1700,
            quote_ttl_hours: 24,
        }
    }
}

impl PricingPolicy {
    /// Monthly and weekly tiers are mutually exclusive; monthly wins.
    pub fn stay_discount_for(&self, nights: u32) -> Option<(StayDiscountKind, u32)> {
        if nights >= self.monthly_min_nights && self.monthly_discount_bps > 0 {
            Some((StayDiscountKind::Monthly, self.monthly_discount_bps))
        } else if nights >= self.weekly_min_nights && self.weekly_discount_bps > 0 {
            Some((StayDiscountKind::Weekly, self.weekly_discount_bps))
        } else {
            None
        }
    }

    pub fn quote_ttl(&self) -> Duration {
        Duration::hours(self.quote_ttl_hours)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StayDiscountKind {
    Weekly,
    Monthly,
}

impl fmt::Display for StayDiscountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weekly => write!(f, "Weekly stay discount"),
            Self::Monthly => write!(f, "Monthly stay discount"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightlyRate {
    pub date: NaiveDate,
    pub price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StayDiscount {
    pub kind: StayDiscountKind,
    pub bps: u32,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoDiscount {
    pub code: String,
    pub bps: u32,
    pub amount: Money,
}

/// Full itemization of a stay price. Every amount is in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteBreakdown {
    pub nightly_rates: Vec<NightlyRate>,
    pub nights: u32,
    pub accommodation_subtotal: Money,
    pub stay_discount: Option<StayDiscount>,
    pub promo_discount: Option<PromoDiscount>,
    pub discounted_accommodation: Money,
    pub cleaning_fee: Money,
    pub service_fee: Money,
    pub subtotal_before_tax: Money,
    pub taxes: Money,
    pub total: Money,
    pub currency: String,
}

impl QuoteBreakdown {
    pub fn total_discount(&self) -> Money {
        self.stay_discount.as_ref().map_or(Money::ZERO, |d| d.amount)
            + self.promo_discount.as_ref().map_or(Money::ZERO, |d| d.amount)
    }
}

/// Price a stay from exactly one rate per night of `range`.
///
/// Stay-length and promo discounts are both taken from the undiscounted
/// accommodation subtotal and added together before rounding, so they never
/// compound. Service fee is charged on the discounted accommodation; tax on
/// accommodation plus cleaning plus service.
pub fn price_stay(
    policy: &PricingPolicy,
    range: &NightRange,
    rates: &[RateDay],
    cleaning_fee: Money,
    currency: &str,
    promo_code: Option<&str>,
) -> Result<QuoteBreakdown> {
    let nights = range.nights();
    let actual = u32::try_from(rates.len()).unwrap_or(u32::MAX);
    if actual != nights {
        return Err(StayError::RateCountMismatch {
            expected: nights,
            actual,
        });
    }

    let mut nightly_rates = Vec::with_capacity(rates.len());
    for (night, rate) in range.iter_nights().zip(rates) {
        if rate.date != night {
            return Err(StayError::PricingUnavailable {
                reason: format!(
                    "rate calendar has {} where {} was expected",
                    rate.date.format(DATE_FORMAT),
                    night.format(DATE_FORMAT)
                ),
            });
        }
        if rate.price.is_negative() {
            return Err(StayError::PricingUnavailable {
                reason: format!("negative nightly price on {}", night.format(DATE_FORMAT)),
            });
        }
        nightly_rates.push(NightlyRate {
            date: rate.date,
            price: rate.price,
        });
    }

    let accommodation_subtotal = Money::checked_sum(nightly_rates.iter().map(|r| r.price))
        .ok_or_else(|| too_large("accommodation subtotal"))?;

    let stay = policy.stay_discount_for(nights);
    let promo_code = promo_code
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty());
    let promo_bps = if promo_code.is_some() {
        policy.promo_discount_bps
    } else {
        0
    };
    let stay_bps = stay.map_or(0, |(_, bps)| bps);

    // Discounts never take more than the whole subtotal
    let discount_bps = stay_bps.saturating_add(promo_bps).min(10_000);
    let combined = accommodation_subtotal.percent_bps(discount_bps);
    let stay_amount = accommodation_subtotal.percent_bps(stay_bps);
    let promo_amount = combined - stay_amount;
    let discounted_accommodation = accommodation_subtotal - combined;

    let service_fee = discounted_accommodation.percent_bps(policy.service_fee_bps);
    let subtotal_before_tax =
        Money::checked_sum([discounted_accommodation, cleaning_fee, service_fee])
            .ok_or_else(|| too_large("subtotal before tax"))?;
    let taxes = subtotal_before_tax.percent_bps(policy.tax_bps);
    let total = subtotal_before_tax
        .checked_add(taxes)
        .ok_or_else(|| too_large("total"))?;

    Ok(QuoteBreakdown {
        nightly_rates,
        nights,
        accommodation_subtotal,
        stay_discount: stay.map(|(kind, bps)| StayDiscount {
            kind,
            bps,
            amount: stay_amount,
        }),
        promo_discount: promo_code.map(|code| PromoDiscount {
            code,
            bps: promo_bps,
            amount: promo_amount,
        }),
        discounted_accommodation,
        cleaning_fee,
        service_fee,
        subtotal_before_tax,
        taxes,
        total,
        currency: currency.to_string(),
    })
}

fn too_large(what: &str) -> StayError {
    StayError::PricingUnavailable {
        reason: format!("{what} is too large to represent"),
    }
}

/// A persisted, immutable price quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub id: String,
    pub property_id: String,
    pub range: NightRange,
    pub party: PartySize,
    pub promo_code: Option<String>,
    pub breakdown: QuoteBreakdown,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl QuoteRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn ensure_valid(&self, now: DateTime<Utc>) -> Result<()> {
        if self.is_expired(now) {
            return Err(StayError::QuoteExpired {
                quote_id: self.id.clone(),
                expired_at: self.expires_at,
            });
        }
        Ok(())
    }
}

impl fmt::Display for QuoteRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.breakdown;
        let cur = &b.currency;
        writeln!(f, "# Quote {}", self.id)?;
        writeln!(f, "Property: {}", self.property_id)?;
        writeln!(f, "Stay: {}", self.range)?;
        writeln!(
            f,
            "Guests: {} adults, {} children",
            self.party.adults, self.party.children
        )?;
        writeln!(f)?;
        writeln!(f, "## Nightly rates")?;
        for rate in &b.nightly_rates {
            writeln!(f, "- {}: {cur} {}", rate.date.format(DATE_FORMAT), rate.price)?;
        }
        writeln!(f)?;
        writeln!(f, "Accommodation ({} nights): {cur} {}", b.nights, b.accommodation_subtotal)?;
        if let Some(ref d) = b.stay_discount {
            writeln!(f, "{} ({}%): -{cur} {}", d.kind, d.bps / 100, d.amount)?;
        }
        if let Some(ref p) = b.promo_discount {
            writeln!(f, "Promo {} ({}%): -{cur} {}", p.code, p.bps / 100, p.amount)?;
        }
        writeln!(f, "Cleaning fee: {cur} {}", b.cleaning_fee)?;
        writeln!(f, "Service fee: {cur} {}", b.service_fee)?;
        writeln!(f, "Subtotal before tax: {cur} {}", b.subtotal_before_tax)?;
        writeln!(f, "Taxes: {cur} {}", b.taxes)?;
        writeln!(f, "**Total: {cur} {}**", b.total)?;
        writeln!(f)?;
        write!(f, "Valid until {}", self.expires_at.format("%Y-%m-%d %H:%M UTC"))
    }
}
